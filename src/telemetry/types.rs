//! # Telemetry Types
//!
//! Attribute maps contributed by collectors and the snapshot shape drained by the downlink.

use std::collections::BTreeMap;

/// Scalar metrics the downlink message knows how to report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownMetric {
    /// Temperature in degrees Celsius
    TemperatureC,
}

impl KnownMetric {
    /// Attribute name under which sensors report this metric
    pub const fn attribute_name(self) -> &'static str {
        match self {
            KnownMetric::TemperatureC => "TempC",
        }
    }
}

/// Attribute name -> value map for one field key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldAttributes(BTreeMap<String, String>);

/// Drained store content, ordered by field key
pub type Snapshot = BTreeMap<String, FieldAttributes>;

impl FieldAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Value of a known metric, if this field declares it
    pub fn metric(&self, metric: KnownMetric) -> Option<&str> {
        self.get(metric.attribute_name())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
