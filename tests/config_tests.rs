use rust_decimal_macros::dec;
use trailspread::application::{EngineSettings, TradingParams};
use trailspread::domain::{Currency, CurrencyPair};
use trailspread::error::{ConfigError, Error};
use trailspread::infrastructure::config::settings::Config;
use trailspread::infrastructure::config::venue::VenueKind;

const EXAMPLE: &str = include_str!("../config.toml.example");

#[test]
fn example_config_is_valid() {
    let config = Config::parse_toml(EXAMPLE).unwrap();

    assert_eq!(config.venues.len(), 2);
    assert_eq!(config.venues[0].kind, VenueKind::Simulated);
    assert!(config.trading.demo_mode);
    assert_eq!(
        config.trading.max_exposure.get(&Currency::new("USD")),
        Some(&dec!(1000))
    );
}

#[test]
fn example_config_converts_to_params() {
    let config = Config::parse_toml(EXAMPLE).unwrap();
    let params = TradingParams::from(config.trading);

    assert_eq!(params.target_profit, dec!(0.01));
    assert_eq!(params.spread_window.as_secs(), 10_800);
    assert!(params.pairs_equivalent(
        &CurrencyPair::new("BTC", "USD"),
        &CurrencyPair::new("BTC", "USDT")
    ));
    assert_eq!(
        params.max_transaction_amount(&CurrencyPair::new("BTC", "USD")),
        Some(dec!(250))
    );

    let settings = EngineSettings::from(config.engine);
    assert_eq!(settings.loop_interval.as_millis(), 100);
    assert!(settings.max_runtime.is_none());
}

#[test]
fn venue_rules_resolve_by_pair_then_base() {
    let config = Config::parse_toml(EXAMPLE).unwrap();

    let alpha = config.venues[0].rules().unwrap();
    let rule = alpha.lookup(&CurrencyPair::new("BTC", "USD"));
    assert_eq!(rule.price_step, Some(dec!(0.01)));
    assert_eq!(rule.leverages.iter().copied().collect::<Vec<_>>(), vec![1, 2]);

    let beta = config.venues[1].rules().unwrap();
    let rule = beta.lookup(&CurrencyPair::new("BTC", "USDT"));
    assert_eq!(rule.quantity_step, Some(dec!(0.001)));
}

#[test]
fn config_without_venues_is_rejected() {
    let err = Config::parse_toml("[trading]\ntarget_profit = 0.01\n").unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::MissingField { field: "venues" })
    ));
}

#[test]
fn duplicate_venue_names_are_rejected() {
    let toml = r#"
[[venues]]
name = "alpha"
long_pairs = ["BTC/USD"]

[[venues]]
name = "alpha"
long_pairs = ["ETH/USD"]
"#;
    let err = Config::parse_toml(toml).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidValue { field: "venues.name", .. })
    ));
}

#[test]
fn malformed_equivalent_currencies_are_rejected() {
    let toml = r#"
[trading]
equivalent_currencies = ["USD-USDT"]

[[venues]]
name = "alpha"
long_pairs = ["BTC/USD"]
"#;
    let err = Config::parse_toml(toml).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidValue {
            field: "equivalent_currencies",
            ..
        })
    ));
}

#[test]
fn window_shorter_than_warmup_is_rejected() {
    let toml = r#"
[trading]
spread_window_secs = 60
spread_valid_after_secs = 120

[[venues]]
name = "alpha"
long_pairs = ["BTC/USD"]
"#;
    assert!(Config::parse_toml(toml).is_err());
}

#[test]
fn missing_file_is_a_read_error() {
    let err = Config::load("/nonexistent/trailspread.toml").unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
}

#[test]
fn invalid_toml_is_a_parse_error() {
    let err = Config::parse_toml("[[venues]\nname = ").unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
}
