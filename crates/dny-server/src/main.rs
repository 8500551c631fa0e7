//! DNY gateway server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: listen on 0.0.0.0:7054, 15 minute idle eviction
//! dny-server
//!
//! # Short timeouts for a bench rig
//! dny-server --bind 127.0.0.1:7054 --idle-timeout-secs 60 --sweep-interval-secs 5
//! ```

use clap::Parser;
use dny_server::{Gateway, RuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// DNY charging-pile gateway server
#[derive(Parser, Debug)]
#[command(name = "dny-server")]
#[command(about = "TCP gateway for DNY charging-pile fleets")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:7054")]
    bind: String,

    /// Evict connections silent for this many seconds
    #[arg(long, default_value = "900")]
    idle_timeout_secs: u64,

    /// How often the idle sweep runs, seconds
    #[arg(long, default_value = "30")]
    sweep_interval_secs: u64,

    /// Per-read deadline in seconds; 0 disables it
    #[arg(long, default_value = "0")]
    read_deadline_secs: u64,

    /// Per-write deadline in seconds; 0 disables it
    #[arg(long, default_value = "30")]
    write_deadline_secs: u64,

    /// Largest frame payload accepted, bytes
    #[arg(long, default_value = "2048")]
    max_payload: usize,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("DNY gateway starting");

    let config = RuntimeConfig {
        bind_address: args.bind,
        read_deadline: (args.read_deadline_secs > 0)
            .then(|| std::time::Duration::from_secs(args.read_deadline_secs)),
        write_deadline: (args.write_deadline_secs > 0)
            .then(|| std::time::Duration::from_secs(args.write_deadline_secs)),
        sweep_interval: std::time::Duration::from_secs(args.sweep_interval_secs),
        driver: dny_core::GatewayConfig {
            idle_timeout: std::time::Duration::from_secs(args.idle_timeout_secs),
            max_payload: args.max_payload,
            max_connections: args.max_connections,
            ..dny_core::GatewayConfig::default()
        },
        ..RuntimeConfig::default()
    };

    let mut gateway = Gateway::bind(config).await?;

    // Without a business service attached, decoded device traffic is
    // drained into the log.
    if let Some(mut notices) = gateway.take_notices() {
        tokio::spawn(async move {
            while let Some(notice) = notices.recv().await {
                tracing::debug!(
                    device = %notice.physical_id,
                    command = format_args!("{:#04x}", notice.command),
                    "device event: {:?}",
                    notice.payload
                );
            }
        });
    }

    gateway.run().await?;

    Ok(())
}
