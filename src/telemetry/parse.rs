//! # Record Parser
//!
//! Extracts telemetry from a CSV-shaped record.
//!
//! Only long records carry telemetry. Field 4 is the field key and fields 3
//! through the second-to-last pair up as `name,value`:
//!
//! ```text
//! index:  0        1          2                3   4         5     6     ...
//!         #<dev>,  <date>,    <time>,          ID, STATION1, TempC, 21.5, ...
//!                                              └name┘└value┘ └name┘└value┘
//! ```
//!
//! Because the key sits in a value slot, it is also reported as the value of the
//! first attribute. The downlink message depends on these indices.

use super::types::FieldAttributes;

/// Records with this many comma-separated fields or fewer carry no telemetry
pub const TELEMETRY_FIELD_THRESHOLD: usize = 20;

/// Index of the field key within a record
pub const FIELD_KEY_INDEX: usize = 4;

/// Index of the first attribute name within a record
pub const FIRST_ATTRIBUTE_INDEX: usize = 3;

/// Field key and attributes extracted from one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telemetry {
    pub key: String,
    pub attributes: FieldAttributes,
}

/// Parse a record (without its line terminator)
///
/// Returns `None` for short records; that is a filter, not an error.
/// A trailing unpaired field is ignored and repeated attribute names keep the
/// last value.
///
/// # Examples
///
/// ```
/// use uart_telemetry::telemetry::parse_record;
///
/// assert!(parse_record("#/dev/ttyUSB0,01/01/2024,00:00:00.000000,hello").is_none());
/// ```
pub fn parse_record(record: &str) -> Option<Telemetry> {
    let fields: Vec<&str> = record.split(',').collect();
    if fields.len() <= TELEMETRY_FIELD_THRESHOLD {
        return None;
    }

    let key = fields[FIELD_KEY_INDEX].to_string();
    let attributes = fields[FIRST_ATTRIBUTE_INDEX..]
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect();

    Some(Telemetry { key, attributes })
}
