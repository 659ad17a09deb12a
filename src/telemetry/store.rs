//! # Aggregation Store
//!
//! Latest sub-mapping per field key, shared by every collector and drained once per
//! downlink cycle. A single lock guards every merge and every drain, so a drained
//! key always holds one record's complete attribute map.

use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::types::{FieldAttributes, Snapshot};

/// Shared field key -> attributes map
#[derive(Debug, Default)]
pub struct AggregationStore {
    fields: Mutex<BTreeMap<String, FieldAttributes>>,
}

impl AggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert `key`; the new attributes replace the key's previous sub-mapping
    pub fn merge(&self, key: impl Into<String>, attributes: FieldAttributes) {
        self.fields.lock().insert(key.into(), attributes);
    }

    /// Take everything accumulated so far and leave the store empty
    pub fn drain(&self) -> Snapshot {
        std::mem::take(&mut *self.fields.lock())
    }

    /// Put back a snapshot that could not be delivered.
    ///
    /// Keys merged since the drain keep their newer sub-mapping.
    pub fn restore(&self, snapshot: Snapshot) {
        let mut fields = self.fields.lock();
        for (key, older) in snapshot {
            fields.entry(key).or_insert(older);
        }
    }

    pub fn len(&self) -> usize {
        self.fields.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn attrs(pairs: &[(&str, &str)]) -> FieldAttributes {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_merge_replaces_whole_sub_mapping() {
        let store = AggregationStore::new();
        store.merge("STATION1", attrs(&[("TempC", "20.0"), ("RH", "41")]));
        store.merge("STATION1", attrs(&[("TempC", "22.5")]));

        let snapshot = store.drain();
        let station = &snapshot["STATION1"];
        assert_eq!(station.get("TempC"), Some("22.5"));
        assert_eq!(station.get("RH"), None);
        assert_eq!(station.len(), 1);
    }

    #[test]
    fn test_drain_empties_store() {
        let store = AggregationStore::new();
        store.merge("A", attrs(&[("TempC", "1")]));
        assert_eq!(store.drain().len(), 1);
        assert!(store.is_empty());
        assert!(store.drain().is_empty());
    }

    #[test]
    fn test_drain_is_sorted_by_key() {
        let store = AggregationStore::new();
        for key in ["B", "A", "C"] {
            store.merge(key, FieldAttributes::new());
        }
        let keys: Vec<_> = store.drain().into_keys().collect();
        assert_eq!(keys, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_concurrent_writers_then_drain() {
        let store = Arc::new(AggregationStore::new());

        let writers: Vec<_> = (0..8)
            .map(|w| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        let value = i.to_string();
                        store.merge(format!("W{}K{}", w, i), attrs(&[("TempC", value.as_str())]));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let snapshot = store.drain();
        assert_eq!(snapshot.len(), 8 * 50);
        assert_eq!(snapshot["W3K49"].get("TempC"), Some("49"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_drain_races_writers_without_loss_or_duplication() {
        let store = Arc::new(AggregationStore::new());
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..2000 {
                    store.merge(format!("K{:05}", i), FieldAttributes::new());
                }
            })
        };

        let mut seen = Vec::new();
        while !writer.is_finished() {
            seen.extend(store.drain().into_keys());
        }
        writer.join().unwrap();
        seen.extend(store.drain().into_keys());

        seen.sort();
        let before = seen.len();
        seen.dedup();
        assert_eq!(before, seen.len(), "a key appeared in two drains");
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn test_restore_does_not_clobber_newer_values() {
        let store = AggregationStore::new();
        store.merge("A", attrs(&[("TempC", "1.0"), ("RH", "50")]));
        let snapshot = store.drain();

        store.merge("A", attrs(&[("TempC", "2.0")]));
        store.restore(snapshot);

        let restored = store.drain();
        assert_eq!(restored["A"].get("TempC"), Some("2.0"));
        assert_eq!(restored["A"].get("RH"), None);
    }

    #[test]
    fn test_restore_puts_back_untouched_keys() {
        let store = AggregationStore::new();
        store.merge("A", attrs(&[("TempC", "1.0")]));
        store.merge("B", attrs(&[("RH", "50")]));
        let snapshot = store.drain();

        store.merge("A", attrs(&[("TempC", "2.0")]));
        store.restore(snapshot);

        let restored = store.drain();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored["A"].get("TempC"), Some("2.0"));
        assert_eq!(restored["B"].get("RH"), Some("50"));
    }
}
