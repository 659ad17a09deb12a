//! # Telemetry Module
//!
//! Handles sensor records, their per-day CSV logs, and the shared aggregation store.
//!
//! This module handles:
//! - Stamping raw sensor lines into CSV-shaped records
//! - Appending records to one file per device per day
//! - Extracting field key / attribute pairs from long records
//! - Accumulating the latest attributes per field key between downlink cycles

pub mod logger;
pub mod parse;
pub mod record;
pub mod store;
pub mod types;

pub use logger::DailyCsvLog;
pub use parse::{parse_record, Telemetry};
pub use record::RecordLine;
pub use store::AggregationStore;
pub use types::{FieldAttributes, KnownMetric, Snapshot};
