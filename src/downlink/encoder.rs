//! # Downlink Message Encoder
//!
//! Encodes a store snapshot into one downlink line:
//!
//! ```text
//! <tag><HH:MM:SS>(<key>[<TempC value>])*\n
//! ```
//!
//! Keys appear in ascending order with no separators. A key whose attributes
//! declare a temperature is immediately followed by that value.

use chrono::NaiveTime;
use std::time::Duration;

use crate::telemetry::{KnownMetric, Snapshot};

/// Time-of-day format of the message header
pub const HEADER_TIME_FORMAT: &str = "%H:%M:%S";

/// Terminator of every downlink message
pub const MESSAGE_TERMINATOR: char = '\n';

/// Wire bits per byte at 8N1 (start + 8 data + stop)
pub const WIRE_BITS_PER_BYTE: u64 = 10;

/// Metric reported next to each field key
pub const REPORTED_METRIC: KnownMetric = KnownMetric::TemperatureC;

/// Encode a downlink message
///
/// # Arguments
///
/// * `tag` - Two-letter message prefix
/// * `time` - Time of day for the header
/// * `snapshot` - Drained store content (already ordered by key)
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use uart_telemetry::downlink::encoder::encode_downlink_message;
/// use uart_telemetry::telemetry::{FieldAttributes, Snapshot};
///
/// let mut snapshot = Snapshot::new();
/// snapshot.insert("STATIONA".to_string(), [("TempC", "21.5")].into_iter().collect());
/// snapshot.insert("STATIONB".to_string(), FieldAttributes::new());
///
/// let time = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
/// assert_eq!(
///     encode_downlink_message("CU", time, &snapshot),
///     "CU08:30:00STATIONA21.5STATIONB\n"
/// );
/// ```
pub fn encode_downlink_message(tag: &str, time: NaiveTime, snapshot: &Snapshot) -> String {
    let mut message = String::with_capacity(tag.len() + 8 + snapshot.len() * 16 + 1);
    message.push_str(tag);
    message.push_str(&time.format(HEADER_TIME_FORMAT).to_string());

    for (key, attributes) in snapshot {
        message.push_str(key);
        if let Some(value) = attributes.metric(REPORTED_METRIC) {
            message.push_str(value);
        }
    }

    message.push(MESSAGE_TERMINATOR);
    message
}

/// Bytes the link can carry within one cycle interval
pub fn link_capacity_bytes(baud_rate: u32, interval: Duration) -> usize {
    let bits = u128::from(baud_rate) * interval.as_millis() / 1000;
    (bits / u128::from(WIRE_BITS_PER_BYTE)) as usize
}
