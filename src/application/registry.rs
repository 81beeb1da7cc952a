//! Thread-safe, versioned registry of open positions.

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::Mutex;

use crate::domain::{
    CurrencyPair, ObservedPairKey, Position, PositionId, Price, VenueAndPair, VenueId,
};

/// Weight of one structural change in [`PositionRegistry::version`].
const STRUCTURAL_WEIGHT: u64 = 1_000_000_000;

/// Iteration order: currency codes first, then venue names, then id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    long_pair: CurrencyPair,
    long_venue: VenueId,
    short_pair: CurrencyPair,
    short_venue: VenueId,
    id: PositionId,
}

impl SortKey {
    fn of(position: &Position) -> Self {
        Self {
            long_pair: position.long().pair().clone(),
            long_venue: position.long().venue().clone(),
            short_pair: position.short().pair().clone(),
            short_venue: position.short().venue().clone(),
            id: position.id(),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct Inner {
    positions: BTreeMap<SortKey, Position>,
    index: HashMap<PositionId, SortKey>,
    structural: u64,
}

impl Inner {
    fn get(&self, id: PositionId) -> Option<&Position> {
        self.index.get(&id).and_then(|key| self.positions.get(key))
    }

    fn filtered(&self, pred: impl Fn(&Position) -> bool) -> Vec<Position> {
        self.positions.values().filter(|&p| pred(p)).cloned().collect()
    }
}

/// Open positions behind a single coarse lock.
///
/// Records are stored by value; readers get clones, writers go through
/// [`update`](Self::update). A copy is therefore always independent of the
/// registry it came from.
#[derive(Debug, Default)]
pub struct PositionRegistry {
    inner: Mutex<Inner>,
}

impl PositionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `positions`, e.g. from a snapshot.
    #[must_use]
    pub fn from_positions(positions: impl IntoIterator<Item = Position>) -> Self {
        let registry = Self::new();
        for position in positions {
            registry.insert(position);
        }
        registry
    }

    /// Add a position. Returns `false` if its id is already registered.
    pub fn insert(&self, position: Position) -> bool {
        let mut inner = self.inner.lock();
        if inner.index.contains_key(&position.id()) {
            return false;
        }
        let key = SortKey::of(&position);
        inner.index.insert(position.id(), key.clone());
        inner.positions.insert(key, position);
        inner.structural += 1;
        true
    }

    /// Remove and return a position.
    pub fn remove(&self, id: PositionId) -> Option<Position> {
        let mut inner = self.inner.lock();
        let key = inner.index.remove(&id)?;
        let removed = inner.positions.remove(&key);
        inner.structural += 1;
        removed
    }

    #[must_use]
    pub fn get(&self, id: PositionId) -> Option<Position> {
        self.inner.lock().get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: PositionId) -> bool {
        self.inner.lock().index.contains_key(&id)
    }

    /// Mutate a position in place under the lock.
    ///
    /// Returns `None` if the position is not registered.
    pub fn update<R>(&self, id: PositionId, f: impl FnOnce(&mut Position) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        let key = inner.index.get(&id)?.clone();
        inner.positions.get_mut(&key).map(f)
    }

    /// Clones of every position in iteration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Position> {
        self.inner.lock().positions.values().cloned().collect()
    }

    /// Independent registry with the same contents and version.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            inner: Mutex::new(self.inner.lock().clone()),
        }
    }

    /// Combined version: structural changes dominate, record edits add up.
    ///
    /// Non-decreasing under any mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        let inner = self.inner.lock();
        let records: u64 = inner.positions.values().map(Position::version).sum();
        inner.structural * STRUCTURAL_WEIGHT + records
    }

    /// Set the version to zero.
    pub fn reset_versions(&self) {
        let mut inner = self.inner.lock();
        inner.structural = 0;
        for position in inner.positions.values_mut() {
            position.reset_version();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().positions.is_empty()
    }

    /// Highest registered id, or 0 when empty.
    #[must_use]
    pub fn max_id(&self) -> u64 {
        self.inner
            .lock()
            .index
            .keys()
            .map(PositionId::value)
            .max()
            .unwrap_or(0)
    }

    /// Keys of all positions currently in the market.
    #[must_use]
    pub fn in_market_keys(&self) -> HashSet<ObservedPairKey> {
        self.inner
            .lock()
            .positions
            .values()
            .map(|p| p.key().clone())
            .collect()
    }

    /// Whether any position trades `leg` on either side.
    #[must_use]
    pub fn is_in_market(&self, leg: &VenueAndPair) -> bool {
        self.inner.lock().positions.values().any(|p| p.touches(leg))
    }

    #[must_use]
    pub fn positions_for_venue_as_long(&self, venue: &VenueId) -> Vec<Position> {
        self.inner.lock().filtered(|p| p.long().venue() == venue)
    }

    #[must_use]
    pub fn positions_for_venue_as_short(&self, venue: &VenueId) -> Vec<Position> {
        self.inner.lock().filtered(|p| p.short().venue() == venue)
    }

    /// First position trading `leg` on either side.
    #[must_use]
    pub fn position_for_venue_and_pair(&self, leg: &VenueAndPair) -> Option<Position> {
        self.inner
            .lock()
            .positions
            .values()
            .find(|p| p.touches(leg))
            .cloned()
    }

    /// Positions with `pair` on either leg.
    #[must_use]
    pub fn positions_for_currency_pair(&self, pair: &CurrencyPair) -> Vec<Position> {
        self.inner
            .lock()
            .filtered(|p| p.long().pair() == pair || p.short().pair() == pair)
    }

    /// Both entry orders placed, not both filled.
    #[must_use]
    pub fn positions_with_unfilled_entry_orders(&self) -> Vec<Position> {
        self.inner
            .lock()
            .filtered(|p| p.is_both_entry_orders_placed() && !p.is_both_entry_orders_filled())
    }

    /// Both exit orders placed, not both filled.
    #[must_use]
    pub fn positions_with_unfilled_exit_orders(&self) -> Vec<Position> {
        self.inner
            .lock()
            .filtered(|p| p.is_both_exit_orders_placed() && !p.is_both_exit_orders_filled())
    }

    /// Exposure of all positions with `pair` on either leg.
    #[must_use]
    pub fn total_exposure(&self, pair: &CurrencyPair) -> Price {
        self.inner
            .lock()
            .positions
            .values()
            .filter(|p| p.long().pair() == pair || p.short().pair() == pair)
            .map(Position::exposure)
            .sum()
    }
}
