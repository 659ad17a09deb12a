//! # Downlink Module
//!
//! Periodically drains the aggregation store into one status line and sends it over
//! the downlink UART.
//!
//! This module handles:
//! - Building the message from a sorted snapshot of the store
//! - Opening, writing and closing the downlink port once per cycle
//! - Putting undelivered telemetry back so the next cycle carries it

pub mod encoder;

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::DownlinkConfig;
use crate::error::{HubError, Result};
use crate::serial::port_trait::PortOpener;
use crate::telemetry::AggregationStore;
use crate::worker::pause;
use encoder::{encode_downlink_message, link_capacity_bytes};

/// The downlink UART, opened fresh for every message
#[derive(Clone)]
pub struct DownlinkTransport {
    opener: Arc<dyn PortOpener>,
    port: String,
    baud_rate: u32,
}

impl std::fmt::Debug for DownlinkTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownlinkTransport")
            .field("port", &self.port)
            .field("baud_rate", &self.baud_rate)
            .finish_non_exhaustive()
    }
}

impl DownlinkTransport {
    pub fn new(opener: Arc<dyn PortOpener>, port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            opener,
            port: port.into(),
            baud_rate,
        }
    }

    /// Device name of the downlink port
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Write `message` in one write and close the port
    pub async fn transmit(&self, message: &[u8]) -> Result<()> {
        let mut port = self.opener.open_writer(&self.port, self.baud_rate)?;

        port.write_all(message)
            .await
            .map_err(|e| HubError::Serial(format!("Failed to write downlink message: {}", e)))?;

        port.flush()
            .await
            .map_err(|e| HubError::Serial(format!("Failed to flush downlink port: {}", e)))?;

        Ok(())
    }
}

/// Single owner of the downlink transport
pub struct DownlinkAggregator {
    store: Arc<AggregationStore>,
    transport: DownlinkTransport,
    tag: String,
    interval: Duration,
    error_backoff: Duration,
}

impl DownlinkAggregator {
    pub fn new(
        store: Arc<AggregationStore>,
        transport: DownlinkTransport,
        config: &DownlinkConfig,
    ) -> Self {
        Self {
            store,
            transport,
            tag: config.tag.clone(),
            interval: config.interval(),
            error_backoff: config.error_backoff(),
        }
    }

    pub fn transport(&self) -> &DownlinkTransport {
        &self.transport
    }

    /// Drain, encode and send one message
    ///
    /// # Returns
    ///
    /// * `Result<String>` - The message that was sent
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be opened or written. The drained telemetry is
    /// put back into the store first, without overwriting newer contributions.
    pub async fn cycle(&self) -> Result<String> {
        let time = Local::now().time();
        let snapshot = self.store.drain();
        let message = encode_downlink_message(&self.tag, time, &snapshot);

        let capacity = link_capacity_bytes(self.transport.baud_rate, self.interval);
        if message.len() > capacity {
            warn!(
                "Downlink message of {} bytes exceeds the {} bytes {} baud carries per cycle",
                message.len(),
                capacity,
                self.transport.baud_rate
            );
        }

        if let Err(e) = self.transport.transmit(message.as_bytes()).await {
            self.store.restore(snapshot);
            return Err(e);
        }

        info!("Downlink send: {}", message.trim_end());
        Ok(message)
    }

    /// Send one message per interval until `cancel` is raised
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Downlink on {} at {} baud every {:?}",
            self.transport.port, self.transport.baud_rate, self.interval
        );

        while !cancel.is_cancelled() {
            let wait = match self.cycle().await {
                Ok(_) => self.interval,
                Err(e) => {
                    error!("Downlink - {}", e);
                    self.error_backoff
                }
            };

            if pause(&cancel, wait).await {
                break;
            }
        }

        info!("Downlink aggregator stopped.");
    }
}
