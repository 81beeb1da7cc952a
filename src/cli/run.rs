//! Handler for the `run` command.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::error::Result;
use crate::infrastructure::bootstrap::Runtime;
use crate::infrastructure::config::settings::Config;

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;

    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    if args.demo {
        config.trading.demo_mode = true;
    }
    if let Some(secs) = args.max_runtime {
        config.engine.max_runtime_secs = Some(secs);
    }

    config.init_logging();
    info!(
        config = %args.config.display(),
        venues = config.venues.len(),
        demo = config.trading.demo_mode,
        "trailspread starting"
    );

    let token = CancellationToken::new();
    let runtime = Runtime::build(&config, token.clone())?;

    let shutdown = token.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for interrupt"),
        }
        shutdown.cancel();
    });

    runtime.run().await?;
    info!("trailspread stopped");
    Ok(())
}
