//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::Result;

/// Trait for line-oriented reads from a sensor port
#[async_trait]
pub trait LineSource: Send {
    /// Read the next complete line, without its trailing whitespace.
    ///
    /// Returns `Ok(None)` when no complete line is available yet. Must be
    /// cancel-safe: dropping the future never loses bytes already received.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Opens serial devices on behalf of workers.
///
/// Every handle returned is exclusively owned by the caller and closed on drop.
pub trait PortOpener: Send + Sync {
    /// Open a sensor port for line reads
    fn open_reader(&self, path: &str, baud_rate: u32) -> Result<Box<dyn LineSource>>;

    /// Open a port for writing (the downlink transport)
    fn open_writer(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialPortIO>>;
}

/// Wrapper around tokio_serial::SerialStream that implements SerialPortIO
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SerialPortIO for TokioSerialPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }
}

/// Time-bounded line reader over any async byte stream
///
/// Bytes of an incomplete line stay in `pending` across calls, so a read
/// that times out (or is raced against cancellation) resumes where it left off.
pub struct SerialLineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    read_timeout: Duration,
}

impl<R: AsyncRead + Unpin + Send> SerialLineReader<R> {
    pub fn new(inner: R, read_timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
            read_timeout,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineSource for SerialLineReader<R> {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let read = tokio::time::timeout(
            self.read_timeout,
            self.reader.read_until(b'\n', &mut self.pending),
        )
        .await;

        match read {
            Err(_elapsed) => Ok(None),
            Ok(Err(e)) => Err(e),
            Ok(Ok(0)) if self.pending.is_empty() => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial device closed",
            )),
            Ok(Ok(_)) => {
                let raw = std::mem::take(&mut self.pending);
                let line = String::from_utf8(raw)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(line.trim_end().to_string()))
            }
        }
    }
}
