//! # UART Telemetry
//!
//! Unattended field service: logs every hot-plugged UART sensor to per-day CSV files
//! and sends an aggregated status line over the serial downlink every cycle.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use uart_telemetry::clock::{sync_host_clock, Ds1307, SystemHostClock};
use uart_telemetry::collector::{CollectorContext, CollectorTiming};
use uart_telemetry::config::Config;
use uart_telemetry::device::DescriptionMatcher;
use uart_telemetry::downlink::{DownlinkAggregator, DownlinkTransport};
use uart_telemetry::logging;
use uart_telemetry::serial::port_trait::PortOpener;
use uart_telemetry::serial::TokioSerialOpener;
use uart_telemetry::supervisor::Supervisor;
use uart_telemetry::telemetry::{AggregationStore, DailyCsvLog};

/// Environment variable overriding the configuration path
const CONFIG_ENV_VAR: &str = "UART_TELEMETRY_CONFIG";

/// Configuration path used when the environment variable is unset
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for UART Telemetry
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (defaults when no file exists)
///    - Set up console and file logging
///    - Set the host clock from the RTC, or to the fallback
///
/// 2. **Supervision**
///    - Start the downlink aggregator
///    - Poll for sensor ports and start/stop one collector per port
///
/// 3. **Graceful Shutdown**
///    - On Ctrl+C, stop every collector and the downlink, then exit
#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    let _log_guard = logging::init(&config.logging).context("initializing logging")?;
    info!("UART Telemetry v{} starting...", env!("CARGO_PKG_VERSION"));

    if config.clock.enabled {
        let mut rtc = Ds1307::new(config.clock.i2c_bus, config.clock.address);
        let fallback = config.clock.fallback_datetime()?;
        if let Err(e) = sync_host_clock(&mut rtc, &SystemHostClock, fallback) {
            error!("Failed to set host clock: {}", e);
        }
    }

    let opener: Arc<dyn PortOpener> =
        Arc::new(TokioSerialOpener::new(config.sensors.read_timeout()));
    let store = Arc::new(AggregationStore::new());

    let ctx = CollectorContext {
        opener: Arc::clone(&opener),
        store: Arc::clone(&store),
        csv_log: DailyCsvLog::new(&config.sensors.log_dir),
        baud_rate: config.sensors.baud_rate,
        timing: CollectorTiming::from(&config.sensors),
    };

    let transport =
        DownlinkTransport::new(opener, &config.downlink.port, config.downlink.baud_rate);
    let downlink = DownlinkAggregator::new(store, transport, &config.downlink);
    let matcher = DescriptionMatcher::new(&config.sensors.description_filter);

    info!(
        "Watching for ports described as '{}', logging to {}",
        config.sensors.description_filter, config.sensors.log_dir
    );

    let supervisor = Supervisor::start(matcher, ctx, downlink, config.supervisor.poll_interval());
    let shutdown = CancellationToken::new();
    let supervisor_task = tokio::spawn(supervisor.run(shutdown.clone()));

    tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down...");
    shutdown.cancel();
    supervisor_task.await.context("supervisor task failed")?;

    Ok(())
}
