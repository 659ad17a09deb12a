//! # Collector
//!
//! One collector owns one sensor port for as long as the device is attached.
//!
//! Every received line is:
//! 1. stamped with its local arrival time,
//! 2. appended to the device's file for the day,
//! 3. parsed, and merged into the aggregation store when it carries telemetry.
//!
//! Faults never end a collector. Open and read failures are logged, followed by the
//! error backoff and a fresh open; only the cancellation token stops it.

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SensorConfig;
use crate::error::Result;
use crate::serial::port_trait::{LineSource, PortOpener};
use crate::telemetry::{parse_record, AggregationStore, DailyCsvLog, RecordLine};
use crate::worker::pause;

/// Timing policy of a collector loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorTiming {
    /// Sleep when no line is available
    pub idle_interval: Duration,
    /// Sleep after an open, read or write failure
    pub error_backoff: Duration,
}

impl From<&SensorConfig> for CollectorTiming {
    fn from(config: &SensorConfig) -> Self {
        Self {
            idle_interval: config.idle_interval(),
            error_backoff: config.error_backoff(),
        }
    }
}

/// Everything a collector needs besides its device
#[derive(Clone)]
pub struct CollectorContext {
    pub opener: Arc<dyn PortOpener>,
    pub store: Arc<AggregationStore>,
    pub csv_log: DailyCsvLog,
    pub baud_rate: u32,
    pub timing: CollectorTiming,
}

/// Reader of one sensor device
pub struct Collector {
    device: String,
    ctx: CollectorContext,
}

impl Collector {
    pub fn new(device: impl Into<String>, ctx: CollectorContext) -> Self {
        Self { device: device.into(), ctx }
    }

    /// Run until `cancel` is raised
    pub async fn run(self, cancel: CancellationToken) {
        let mut source: Option<Box<dyn LineSource>> = None;

        while !cancel.is_cancelled() {
            if source.is_none() {
                match self.ctx.opener.open_reader(&self.device, self.ctx.baud_rate) {
                    Ok(reader) => {
                        info!("Opened UART port {} at {} baud", self.device, self.ctx.baud_rate);
                        source = Some(reader);
                    }
                    Err(e) => {
                        error!("{} - {}", self.device, e);
                        pause(&cancel, self.ctx.timing.error_backoff).await;
                        continue;
                    }
                }
            }
            let Some(reader) = source.as_mut() else { continue };

            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = reader.next_line() => next,
            };

            match next {
                Ok(Some(line)) => {
                    if let Err(e) = self.ingest(&line).await {
                        error!("{} - {}", self.device, e);
                        pause(&cancel, self.ctx.timing.error_backoff).await;
                    }
                }
                Ok(None) => {
                    pause(&cancel, self.ctx.timing.idle_interval).await;
                }
                Err(e) => {
                    error!("{} - {}", self.device, e);
                    // Reopen after the backoff
                    source = None;
                    pause(&cancel, self.ctx.timing.error_backoff).await;
                }
            }
        }

        drop(source);
        info!("Collector for UART port {} stopped.", self.device);
    }

    /// Log one line and contribute its telemetry.
    ///
    /// The telemetry is merged even when the file append fails.
    pub async fn ingest(&self, line: &str) -> Result<()> {
        let now = Local::now().naive_local();
        let record = RecordLine::new(&self.device, now, line);
        let csv = record.to_csv();

        if let Some(telemetry) = parse_record(&csv) {
            debug!(
                "{} contributed field {} ({} attributes)",
                self.device,
                telemetry.key,
                telemetry.attributes.len()
            );
            self.ctx.store.merge(telemetry.key, telemetry.attributes);
        }

        self.ctx.csv_log.append(&record).await?;
        Ok(())
    }
}
