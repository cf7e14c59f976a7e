//! Market-maker bot entry point.

use anyhow::Result;
use chaser_bot::{BotConfig, MarketMakerBot};
use clap::Parser;
use tracing::{error, info};

/// Quote-maintenance market-making bot.
#[derive(Parser, Debug)]
#[command(name = "chaser", version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file.
    #[arg(default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS provider must be installed before any WebSocket connections.
    chaser_ws::init_crypto();

    let args = Args::parse();

    let mut config = match BotConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.apply_env_overrides() {
        eprintln!("{e}");
        std::process::exit(1);
    }
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let _log_guard = chaser_telemetry::init_logging(config.log_file.as_deref(), config.verbose)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config,
        symbol = %config.symbol,
        spread = %config.spread_percentage,
        order_size = %config.order_size,
        "Starting chaser"
    );

    let bot = match MarketMakerBot::initialize(config).await {
        Ok(bot) => bot,
        Err(e) => {
            error!(%e, "Initialization failed");
            std::process::exit(1);
        }
    };

    bot.start();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
        () = bot.wait_stopped() => error!("Supervisor stopped on its own"),
    }

    bot.stop().await;

    let metrics = bot.final_metrics();
    info!(
        rotations = metrics.rotations,
        successful_orders = metrics.successful_orders,
        failed_orders = metrics.failed_orders,
        avg_execution_ms = metrics.avg_execution_ms,
        avg_reaction_ms = metrics.avg_reaction_ms,
        reconnects = metrics.reconnect_count,
        uptime_pct = metrics.uptime_pct,
        "Final statistics"
    );

    Ok(())
}
