use clap::Parser;
use trailspread::cli::{check, positions, run, CheckCommand, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run::execute(&args).await?,
        Commands::Check(CheckCommand::Config(args)) => check::execute_config(&args.config)?,
        Commands::Positions(args) => positions::execute(&args.snapshot, args.json)?,
    }
    Ok(())
}
