use bon::Builder;
use rdkafka::{message::BorrowedMessage, producer::BaseRecord, Message};

/// A single record as received by or sent to Kafka
///
/// ```
/// use runnel_kafka::KafkaRecord;
///
/// let record = KafkaRecord::builder()
///     .topic("outputTopic")
///     .payload(b"HELLO".to_vec())
///     .key(b"hello".to_vec())
///     .build();
/// assert_eq!(record.partition, None);
/// ```
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct KafkaRecord {
    /// Topic the record was read from or should be written to
    #[builder(into)]
    pub topic: String,
    /// Partition of the record. When producing `None` lets the producer pick one.
    pub partition: Option<i32>,
    /// Record value
    pub payload: Vec<u8>,
    /// Record key, if any
    pub key: Option<Vec<u8>>,
    /// Milliseconds since the unix epoch
    pub timestamp: Option<i64>,
}

impl KafkaRecord {
    /// Convert a received message. Messages without payload (tombstones) yield `None`.
    pub(crate) fn from_message(msg: &BorrowedMessage<'_>) -> Option<Self> {
        let payload = msg.payload().map(|x| x.to_vec())?;
        Some(Self {
            topic: msg.topic().to_owned(),
            partition: Some(msg.partition()),
            payload,
            key: msg.key().map(|x| x.to_vec()),
            timestamp: msg.timestamp().to_millis(),
        })
    }

    pub(crate) fn base_record(&self) -> BaseRecord<'_, Vec<u8>, Vec<u8>> {
        let mut base_record = BaseRecord::<Vec<u8>, Vec<u8>, ()>::to(&self.topic);
        base_record.partition = self.partition;
        base_record.payload = Some(&self.payload);
        base_record.key = self.key.as_ref();
        base_record.timestamp = self.timestamp;
        base_record
    }
}

#[cfg(test)]
mod tests {
    use super::KafkaRecord;

    #[test]
    fn base_record_carries_all_fields() {
        let record = KafkaRecord::builder()
            .topic("originalAndUppercased")
            .partition(2)
            .payload(b"HELLO".to_vec())
            .key(b"hello".to_vec())
            .timestamp(1337)
            .build();
        let base = record.base_record();
        assert_eq!(base.topic, "originalAndUppercased");
        assert_eq!(base.partition, Some(2));
        assert_eq!(base.payload, Some(&b"HELLO".to_vec()));
        assert_eq!(base.key, Some(&b"hello".to_vec()));
        assert_eq!(base.timestamp, Some(1337));
    }
}
