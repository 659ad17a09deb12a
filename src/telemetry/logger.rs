//! # Daily CSV Logger
//!
//! Appends records to `<base-dir>/<YYYYMMDD>_<sanitized-device>.csv`, one file per
//! device per day. Files are opened for each append, so a new day (or a removed
//! file) simply starts a new file.

use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::record::RecordLine;
use crate::error::Result;

/// Per-device, per-day record log
#[derive(Debug, Clone)]
pub struct DailyCsvLog {
    base_dir: PathBuf,
}

impl DailyCsvLog {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// File a record belongs to
    pub fn path_for(&self, record: &RecordLine<'_>) -> PathBuf {
        self.base_dir.join(format!(
            "{}_{}.csv",
            record.day_stamp(),
            sanitize_device_id(record.device())
        ))
    }

    /// Append one record followed by a newline
    ///
    /// # Returns
    ///
    /// * `Result<PathBuf>` - File the record was written to
    pub async fn append(&self, record: &RecordLine<'_>) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).await?;

        let path = self.path_for(record);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut line = record.to_csv();
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(path)
    }
}

/// Device id as used in file names: the path with every `/` removed
pub fn sanitize_device_id(device: &str) -> String {
    device.replace('/', "")
}
