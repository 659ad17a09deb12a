//! # UART Telemetry Library
//!
//! Supervise hot-plugged UART sensors, keep per-day logs of everything they send,
//! and report an aggregated status line over a low-bandwidth serial downlink.
//!
//! This library provides the core pieces: the device matcher, per-device
//! collectors, the shared aggregation store, the downlink aggregator and the
//! supervisor that ties their lifecycles together.

pub mod clock;
pub mod collector;
pub mod config;
pub mod device;
pub mod downlink;
pub mod error;
pub mod logging;
pub mod serial;
pub mod supervisor;
pub mod telemetry;
pub mod worker;
