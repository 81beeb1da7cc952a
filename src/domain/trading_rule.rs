//! Venue order rules: minimums, step sizes and supported leverage.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::Deserialize;

use super::id::{Currency, CurrencyPair, ObservedPairKey};
use super::money::{round_to_step, Price, Volume};
use super::order::LegPair;
use crate::error::TradingRuleViolation;

/// Order constraints for one currency pair on one venue.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TradingRule {
    pub min_quantity: Volume,
    pub min_price: Option<Price>,
    pub min_total: Option<Price>,
    pub quantity_step: Option<Volume>,
    pub price_step: Option<Price>,
    pub leverages: BTreeSet<u32>,
}

impl TradingRule {
    /// Round a quantity onto this rule's step grid.
    #[must_use]
    pub fn round_quantity(&self, quantity: Volume, round_down: bool) -> Volume {
        match self.quantity_step {
            Some(step) => round_to_step(quantity, self.min_quantity, step, round_down),
            None => quantity,
        }
    }

    /// Round a price onto this rule's step grid.
    #[must_use]
    pub fn round_price(&self, price: Price, round_down: bool) -> Price {
        match self.price_step {
            Some(step) => {
                round_to_step(price, self.min_price.unwrap_or_default(), step, round_down)
            }
            None => price,
        }
    }

    /// Highest supported leverage, if the venue offers any.
    #[must_use]
    pub fn max_leverage(&self) -> Option<u32> {
        self.leverages.iter().next_back().copied()
    }
}

/// Rules keyed by pair with a per-base-currency fallback.
#[derive(Debug, Clone, Default)]
pub struct TradingRules {
    by_pair: HashMap<CurrencyPair, TradingRule>,
    by_base: HashMap<Currency, TradingRule>,
}

impl TradingRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pair(&mut self, pair: CurrencyPair, rule: TradingRule) {
        self.by_pair.insert(pair, rule);
    }

    pub fn insert_base(&mut self, base: Currency, rule: TradingRule) {
        self.by_base.insert(base, rule);
    }

    /// Rule for `pair`, falling back to its base currency.
    #[must_use]
    pub fn get(&self, pair: &CurrencyPair) -> Option<&TradingRule> {
        self.by_pair
            .get(pair)
            .or_else(|| self.by_base.get(pair.base()))
    }

    /// Like [`get`](Self::get), with no constraints when nothing matches.
    #[must_use]
    pub fn lookup(&self, pair: &CurrencyPair) -> TradingRule {
        self.get(pair).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_pair.is_empty() && self.by_base.is_empty()
    }
}

/// Check both legs of a candidate entry against their venues' rules.
///
/// Minimum quantity is checked first, then minimum price, then minimum total,
/// long leg before short leg in each group.
pub fn evaluate_trading_rules(
    key: &ObservedPairKey,
    prices: LegPair<Price>,
    quantities: LegPair<Volume>,
    rules: &LegPair<TradingRule>,
) -> Result<(), TradingRuleViolation> {
    let legs = [
        (key.long(), prices.long, quantities.long, &rules.long),
        (key.short(), prices.short, quantities.short, &rules.short),
    ];

    for (leg, _, quantity, rule) in &legs {
        if rule.min_quantity > *quantity {
            return Err(TradingRuleViolation::BelowMinQuantity {
                venue: leg.venue().clone(),
                pair: leg.pair().clone(),
                quantity: *quantity,
                min: rule.min_quantity,
            });
        }
    }

    for (leg, price, _, rule) in &legs {
        if let Some(min) = rule.min_price {
            if min > *price {
                return Err(TradingRuleViolation::BelowMinPrice {
                    venue: leg.venue().clone(),
                    pair: leg.pair().clone(),
                    price: *price,
                    min,
                });
            }
        }
    }

    for (leg, price, quantity, rule) in &legs {
        if let Some(min) = rule.min_total {
            let total: Decimal = *price * *quantity;
            if min > total {
                return Err(TradingRuleViolation::BelowMinTotal {
                    venue: leg.venue().clone(),
                    pair: leg.pair().clone(),
                    total,
                    min,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::{VenueAndPair, VenueId};
    use rust_decimal_macros::dec;

    fn key() -> ObservedPairKey {
        let pair = CurrencyPair::new("BTC", "USD");
        ObservedPairKey::new(
            VenueAndPair::new(VenueId::new("long"), pair.clone()),
            VenueAndPair::new(VenueId::new("short"), pair),
        )
    }

    #[test]
    fn lookup_falls_back_to_base_currency() {
        let mut rules = TradingRules::new();
        rules.insert_base(
            Currency::new("BTC"),
            TradingRule {
                min_quantity: dec!(0.001),
                ..TradingRule::default()
            },
        );
        rules.insert_pair(
            CurrencyPair::new("BTC", "EUR"),
            TradingRule {
                min_quantity: dec!(0.01),
                ..TradingRule::default()
            },
        );

        assert_eq!(rules.lookup(&CurrencyPair::new("BTC", "USD")).min_quantity, dec!(0.001));
        assert_eq!(rules.lookup(&CurrencyPair::new("BTC", "EUR")).min_quantity, dec!(0.01));
        assert_eq!(rules.lookup(&CurrencyPair::new("ETH", "USD")), TradingRule::default());
    }

    #[test]
    fn rounding_uses_rule_steps() {
        let rule = TradingRule {
            quantity_step: Some(dec!(0.01)),
            price_step: Some(dec!(0.5)),
            ..TradingRule::default()
        };
        assert_eq!(rule.round_quantity(dec!(1.239), true), dec!(1.23));
        assert_eq!(rule.round_price(dec!(100.3), true), dec!(100));
        assert_eq!(rule.round_price(dec!(100.3), false), dec!(100.5));
    }

    #[test]
    fn max_leverage_is_highest_supported() {
        let rule = TradingRule {
            leverages: [2, 5, 3].into_iter().collect(),
            ..TradingRule::default()
        };
        assert_eq!(rule.max_leverage(), Some(5));
        assert_eq!(TradingRule::default().max_leverage(), None);
    }

    #[test]
    fn quantity_violation_reported_before_total() {
        let rules = LegPair::new(
            TradingRule {
                min_total: Some(dec!(1000)),
                ..TradingRule::default()
            },
            TradingRule {
                min_quantity: dec!(1),
                ..TradingRule::default()
            },
        );
        let err = evaluate_trading_rules(
            &key(),
            LegPair::new(dec!(100), dec!(100)),
            LegPair::new(dec!(0.5), dec!(0.5)),
            &rules,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TradingRuleViolation::BelowMinQuantity { ref venue, .. } if venue.as_str() == "short"
        ));
    }

    #[test]
    fn min_price_and_total_are_enforced() {
        let price_rules = LegPair::new(
            TradingRule {
                min_price: Some(dec!(200)),
                ..TradingRule::default()
            },
            TradingRule::default(),
        );
        let err = evaluate_trading_rules(
            &key(),
            LegPair::new(dec!(100), dec!(100)),
            LegPair::new(dec!(1), dec!(1)),
            &price_rules,
        )
        .unwrap_err();
        assert!(matches!(err, TradingRuleViolation::BelowMinPrice { .. }));

        let total_rules = LegPair::new(
            TradingRule::default(),
            TradingRule {
                min_total: Some(dec!(150)),
                ..TradingRule::default()
            },
        );
        let err = evaluate_trading_rules(
            &key(),
            LegPair::new(dec!(100), dec!(100)),
            LegPair::new(dec!(1), dec!(1)),
            &total_rules,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TradingRuleViolation::BelowMinTotal { total, .. } if total == dec!(100)
        ));
    }

    #[test]
    fn passes_when_all_rules_met() {
        let rules = LegPair::new(TradingRule::default(), TradingRule::default());
        assert!(evaluate_trading_rules(
            &key(),
            LegPair::new(dec!(100), dec!(100)),
            LegPair::new(dec!(1), dec!(1)),
            &rules,
        )
        .is_ok());
    }
}
