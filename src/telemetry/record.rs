//! # Record Lines
//!
//! One timestamped sensor line in its CSV-shaped log form:
//!
//! ```text
//! #<device>,<MM/DD/YYYY>,<HH:MM:SS.ffffff>,<raw payload>
//! ```

use chrono::NaiveDateTime;
use std::fmt;

/// Arrival timestamp format (date and time are separate CSV columns)
pub const RECORD_TIMESTAMP_FORMAT: &str = "%m/%d/%Y,%H:%M:%S%.6f";

/// Calendar day format used in log file names
pub const DAY_STAMP_FORMAT: &str = "%Y%m%d";

/// Marker that opens every record
pub const RECORD_PREFIX: char = '#';

/// One ingested line from a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLine<'a> {
    device: &'a str,
    timestamp: NaiveDateTime,
    payload: &'a str,
}

impl<'a> RecordLine<'a> {
    pub fn new(device: &'a str, timestamp: NaiveDateTime, payload: &'a str) -> Self {
        Self { device, timestamp, payload }
    }

    pub fn device(&self) -> &str {
        self.device
    }

    /// `YYYYMMDD` of the arrival day
    pub fn day_stamp(&self) -> String {
        self.timestamp.format(DAY_STAMP_FORMAT).to_string()
    }

    /// CSV form without the line terminator
    pub fn to_csv(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RecordLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{},{},{}",
            RECORD_PREFIX,
            self.device,
            self.timestamp.format(RECORD_TIMESTAMP_FORMAT),
            self.payload
        )
    }
}
