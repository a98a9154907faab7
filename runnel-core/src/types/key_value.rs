use serde::{Deserialize, Serialize};

/// A record as it is stored in a topic: an optional key and a value.
///
/// Streams reading from or writing to topics carry `KeyValue` as their data. The record key is
/// independent of the stream key, which identifies the source partition a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValue<K, V> {
    /// Record key, `None` for records produced without a key
    pub key: Option<K>,
    /// Record value
    pub value: V,
}

impl<K, V> KeyValue<K, V> {
    /// Create a new record with the given key and value
    pub fn new(key: Option<K>, value: V) -> Self {
        Self { key, value }
    }

    /// Create a new record without a key
    pub fn unkeyed(value: V) -> Self {
        Self { key: None, value }
    }
}
