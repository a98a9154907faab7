//! Records stored in and exchanged with the embedded broker
use bon::Builder;

/// A single entry of a partition log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Topic this record belongs to
    pub topic: String,
    /// Partition of the topic holding this record
    pub partition: i32,
    /// Position of this record in its partition log
    pub offset: i64,
    /// Milliseconds since the unix epoch
    pub timestamp: i64,
    /// Serialized record key
    pub key: Option<Vec<u8>>,
    /// Serialized record value, `None` for tombstones
    pub value: Option<Vec<u8>>,
}

/// A record to be sent by a [Producer](super::Producer)
///
/// # Example
/// ```rust
/// use runnel::embedded::ProducerRecord;
///
/// let record = ProducerRecord::<String, _>::builder()
///     .topic("inputTopic")
///     .value("hello".to_string())
///     .build();
/// assert_eq!(record.partition, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct ProducerRecord<K, V> {
    /// Topic to send the record to
    #[builder(into)]
    pub topic: String,
    /// Send to this partition. If `None` the partition is chosen by the record key
    pub partition: Option<i32>,
    /// Record key
    pub key: Option<K>,
    /// Record value
    pub value: V,
    /// Record timestamp in milliseconds since the unix epoch. If `None` the time of sending
    /// is used
    pub timestamp: Option<i64>,
}

impl<K, V> ProducerRecord<K, V> {
    /// Create a new record for the given topic, leaving partition and timestamp to the producer
    pub fn new(topic: impl Into<String>, key: Option<K>, value: V) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            key,
            value,
            timestamp: None,
        }
    }
}

/// A record received by a [Consumer](super::Consumer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord<K, V> {
    /// Topic the record was read from
    pub topic: String,
    /// Partition the record was read from
    pub partition: i32,
    /// Offset of the record in its partition
    pub offset: i64,
    /// Milliseconds since the unix epoch
    pub timestamp: i64,
    /// Deserialized record key
    pub key: Option<K>,
    /// Deserialized record value, `None` for tombstones
    pub value: Option<V>,
}

/// Where a record was written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Topic the record was written to
    pub topic: String,
    /// Partition the record was written to
    pub partition: i32,
    /// Offset assigned to the record
    pub offset: i64,
}
