//! Configuration validation command.

use std::path::Path;

use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Validate configuration file without starting the engine.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    println!("Checking configuration: {}", path.display());
    println!();

    let config = Config::load(path)?;
    println!("✓ Configuration file is valid");
    println!();
    println!("Summary:");
    println!("  Target profit: {}", config.trading.target_profit);
    println!(
        "  Trailing: offset {} with {} confirmation(s)",
        config.trading.trailing_offset, config.trading.trailing_confirmations
    );
    println!("  Demo mode: {}", config.trading.demo_mode);
    println!("  Venues:");
    for venue in &config.venues {
        let long: Vec<String> = venue.long_pairs.iter().map(ToString::to_string).collect();
        let short: Vec<String> = venue.short_pairs.iter().map(ToString::to_string).collect();
        println!(
            "    {} ({:?}) long [{}] short [{}]",
            venue.name,
            venue.kind,
            long.join(", "),
            short.join(", ")
        );
    }

    if config.trading.max_exposure.is_empty() {
        println!();
        println!("⚠ No max_exposure configured; no entries will be taken");
    }
    if !config.persistence.enabled {
        println!();
        println!("⚠ Persistence disabled; open positions will not survive a restart");
    }
    Ok(())
}
