//! Command-line interface definitions.

pub mod check;
pub mod positions;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Trailspread - Cross-venue spread arbitrage with trailing-stop confirmation.
#[derive(Parser, Debug)]
#[command(name = "trailspread")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the arbitrage engine until interrupted
    Run(RunArgs),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),

    /// List positions stored in a snapshot file
    Positions(PositionsArgs),
}

/// Subcommands for `trailspread check`
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate configuration file
    Config(ConfigPathArg),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,

    /// Simulate order placement instead of sending orders
    #[arg(long)]
    pub demo: bool,

    /// Stop after this many seconds
    #[arg(long)]
    pub max_runtime: Option<u64>,
}

/// Arguments for the `positions` subcommand.
#[derive(Parser, Debug)]
pub struct PositionsArgs {
    /// Path to the position snapshot
    #[arg(short, long, default_value = "positions.json")]
    pub snapshot: PathBuf,

    /// Print the raw JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}
