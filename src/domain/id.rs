//! Domain identifier types with proper encapsulation.
//!
//! Keys are plain values built from venue names and currency codes, so they
//! compare equal across a snapshot reload or a venue reconnect.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Trading venue identifier - newtype for type safety.
///
/// The inner String is private to ensure all construction goes through
/// the defined constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(String);

impl VenueId {
    /// Create a new VenueId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the venue name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VenueId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Create a currency from a code such as `btc` or `USD`.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Get the currency code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

/// A base/counter currency pair such as `BTC/USD`.
///
/// Serialized as the `BASE/COUNTER` string so it can key TOML tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    base: Currency,
    counter: Currency,
}

impl CurrencyPair {
    /// Create a pair from its two currencies.
    pub fn new(base: impl Into<Currency>, counter: impl Into<Currency>) -> Self {
        Self {
            base: base.into(),
            counter: counter.into(),
        }
    }

    /// The traded asset.
    #[must_use]
    pub fn base(&self) -> &Currency {
        &self.base
    }

    /// The currency prices are quoted in.
    #[must_use]
    pub fn counter(&self) -> &Currency {
        &self.counter
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.counter)
    }
}

impl FromStr for CurrencyPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, counter) = s
            .split_once('/')
            .ok_or_else(|| format!("currency pair '{s}' must look like BASE/COUNTER"))?;
        if base.trim().is_empty() || counter.trim().is_empty() {
            return Err(format!("currency pair '{s}' has an empty currency"));
        }
        Ok(Self::new(base, counter))
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(p: CurrencyPair) -> Self {
        p.to_string()
    }
}

/// A currency pair as traded on one venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VenueAndPair {
    venue: VenueId,
    pair: CurrencyPair,
}

impl VenueAndPair {
    pub fn new(venue: VenueId, pair: CurrencyPair) -> Self {
        Self { venue, pair }
    }

    #[must_use]
    pub fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[must_use]
    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }
}

impl fmt::Display for VenueAndPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pair, self.venue)
    }
}

/// Directional key for a long leg and a short leg.
///
/// `(long=A, short=B)` and `(long=B, short=A)` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservedPairKey {
    long: VenueAndPair,
    short: VenueAndPair,
}

impl ObservedPairKey {
    pub fn new(long: VenueAndPair, short: VenueAndPair) -> Self {
        Self { long, short }
    }

    #[must_use]
    pub fn long(&self) -> &VenueAndPair {
        &self.long
    }

    #[must_use]
    pub fn short(&self) -> &VenueAndPair {
        &self.short
    }
}

impl fmt::Display for ObservedPairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "long {} / short {}", self.long, self.short)
    }
}

/// Order identifier assigned by a venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Create a new OrderId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the order ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Unique position identifier.
///
/// The inner u64 is private to ensure all construction goes through
/// the defined constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(u64);

impl PositionId {
    /// Create a new `PositionId` from a u64 value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn leg(venue: &str) -> VenueAndPair {
        VenueAndPair::new(VenueId::new(venue), CurrencyPair::new("BTC", "USD"))
    }

    #[test]
    fn currency_is_normalized_to_upper_case() {
        assert_eq!(Currency::new(" btc "), Currency::new("BTC"));
        assert_eq!(Currency::new("usd").as_str(), "USD");
    }

    #[test]
    fn currency_pair_parses_and_displays() {
        let pair: CurrencyPair = "eth/usdt".parse().unwrap();
        assert_eq!(pair.base().as_str(), "ETH");
        assert_eq!(pair.counter().as_str(), "USDT");
        assert_eq!(pair.to_string(), "ETH/USDT");
    }

    #[test]
    fn currency_pair_rejects_malformed_input() {
        assert!("BTCUSD".parse::<CurrencyPair>().is_err());
        assert!("/USD".parse::<CurrencyPair>().is_err());
    }

    #[test]
    fn currency_pair_serializes_as_string() {
        let pair = CurrencyPair::new("BTC", "USD");
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "\"BTC/USD\"");
        let back: CurrencyPair = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair);
    }

    #[test]
    fn observed_pair_key_is_directional() {
        let ab = ObservedPairKey::new(leg("a"), leg("b"));
        let ba = ObservedPairKey::new(leg("b"), leg("a"));
        assert_ne!(ab, ba);

        let mut set = HashSet::new();
        set.insert(ab.clone());
        set.insert(ba);
        set.insert(ObservedPairKey::new(leg("a"), leg("b")));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&ab));
    }

    #[test]
    fn position_id_display() {
        assert_eq!(PositionId::new(7).to_string(), "pos-7");
    }
}
