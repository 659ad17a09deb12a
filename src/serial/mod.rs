//! # Serial Communication Module
//!
//! Opens UART sensor ports and the downlink transport.
//!
//! This module handles:
//! - Opening ports 8N1 without flow control at a configured baud rate
//! - Wrapping sensor ports in time-bounded, cancel-safe line readers
//! - Wrapping the downlink port for one-shot writes

pub mod port_trait;

use std::time::Duration;

use crate::error::{HubError, Result};
use port_trait::{LineSource, PortOpener, SerialLineReader, SerialPortIO, TokioSerialPort};
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;

/// Opens real devices through `tokio-serial`
#[derive(Debug, Clone)]
pub struct TokioSerialOpener {
    read_timeout: Duration,
}

impl TokioSerialOpener {
    /// Create an opener whose readers wait at most `read_timeout` per line read
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl PortOpener for TokioSerialOpener {
    fn open_reader(&self, path: &str, baud_rate: u32) -> Result<Box<dyn LineSource>> {
        let port = open_port(path, baud_rate)?;
        debug!("Opened sensor port {} at {} baud", path, baud_rate);
        Ok(Box::new(SerialLineReader::new(port, self.read_timeout)))
    }

    fn open_writer(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialPortIO>> {
        let port = open_port(path, baud_rate)?;
        debug!("Opened downlink port {} at {} baud", path, baud_rate);
        Ok(Box::new(TokioSerialPort::new(port)))
    }
}

/// Open a specific serial port with 8N1 settings
///
/// # Arguments
///
/// * `path` - Device path (e.g., "/dev/ttyUSB0")
/// * `baud_rate` - Line speed
///
/// # Returns
///
/// * `Result<SerialStream>` - Opened serial port
pub fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| HubError::Serial(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}
