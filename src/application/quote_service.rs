//! Latest-quote cache with edge-triggered "new data" signalling.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::domain::{Quote, QuotePair, VenueAndPair};

/// Holds the latest quote per venue and pair.
///
/// Arrivals bump a counter. The master loop compares it with a checkpoint so
/// it only re-evaluates when something changed.
#[derive(Debug)]
pub struct QuoteService {
    quotes: DashMap<VenueAndPair, Quote>,
    counter: AtomicI64,
    observed: AtomicI64,
    last_processed: AtomicI64,
    max_skew: Duration,
}

impl QuoteService {
    #[must_use]
    pub fn new(max_skew: Duration) -> Self {
        Self {
            quotes: DashMap::new(),
            counter: AtomicI64::new(0),
            observed: AtomicI64::new(0),
            last_processed: AtomicI64::new(0),
            max_skew,
        }
    }

    /// Store `quote` as the latest for its source.
    pub fn update_quote(&self, quote: Quote) {
        self.quotes.insert(quote.source().clone(), quote);
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Latest quote for `source`.
    #[must_use]
    pub fn quote(&self, source: &VenueAndPair) -> Option<Quote> {
        self.quotes.get(source).map(|q| q.value().clone())
    }

    /// Whether quotes arrived since the last processed checkpoint.
    ///
    /// Records the arrival count it saw so that
    /// [`all_quotes_processed`](Self::all_quotes_processed) only acknowledges
    /// what this call reported.
    pub fn has_new_quote(&self) -> bool {
        let observed = self.counter.load(Ordering::SeqCst);
        self.observed.store(observed, Ordering::SeqCst);
        observed > self.last_processed.load(Ordering::SeqCst)
    }

    /// Advance the checkpoint to the last observed arrival count.
    pub fn all_quotes_processed(&self) {
        self.last_processed
            .store(self.observed.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    /// Force the next [`has_new_quote`](Self::has_new_quote) to report true.
    pub fn market_pairs_updated(&self) {
        self.last_processed
            .store(self.counter.load(Ordering::SeqCst) - 1, Ordering::SeqCst);
    }

    /// Whether two quotes were created close enough together to compare.
    #[must_use]
    pub fn quotes_comparable(&self, a: &Quote, b: &Quote) -> bool {
        let skew = (a.created_at() - b.created_at()).num_milliseconds().unsigned_abs();
        u128::from(skew) <= self.max_skew.as_millis()
    }

    /// Latest comparable quotes for a long and a short leg.
    #[must_use]
    pub fn comparable_pair(&self, long: &VenueAndPair, short: &VenueAndPair) -> Option<QuotePair> {
        let long = self.quote(long)?;
        let short = self.quote(short)?;
        self.quotes_comparable(&long, &short)
            .then(|| QuotePair::new(long, short))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}
