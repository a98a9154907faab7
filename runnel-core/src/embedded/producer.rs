//! A client writing records to the embedded broker
use std::hash::{Hash, Hasher};

use thiserror::Error;
use tracing::{debug, warn};

use super::{
    cluster::{BrokerError, EmbeddedCluster},
    config::ProducerConfig,
    record::{ProducerRecord, RecordMetadata},
    serialization::{SerdeError, Serializer},
};

/// Sends records to topics of an [EmbeddedCluster].
///
/// Every send is synchronous: once [Producer::send] returns, the record is in the log and
/// visible to consumers.
///
/// # Example
/// ```rust
/// use runnel::embedded::*;
///
/// let cluster = EmbeddedCluster::start();
/// cluster.create_topic("inputTopic").unwrap();
/// let config = ProducerConfig::builder()
///     .bootstrap_servers(cluster.bootstrap_servers())
///     .build();
/// let mut producer = Producer::new(config, BytesSerde, StringSerde).unwrap();
/// let meta = producer
///     .send(ProducerRecord::new("inputTopic", None, "hello".to_string()))
///     .unwrap();
/// assert_eq!(meta.offset, 0);
/// ```
pub struct Producer<KS, VS> {
    cluster: EmbeddedCluster,
    config: ProducerConfig,
    key_serializer: KS,
    value_serializer: VS,
    // next partition for records without key
    round_robin: usize,
}

impl<KS, VS> Producer<KS, VS>
where
    KS: Serializer,
    VS: Serializer,
{
    /// Connect a new producer to the cluster given in the config
    pub fn new(
        config: ProducerConfig,
        key_serializer: KS,
        value_serializer: VS,
    ) -> Result<Self, ProducerError> {
        let cluster = EmbeddedCluster::resolve(&config.bootstrap_servers)?;
        debug!(client_id = ?config.client_id, acks = ?config.acks, "Created producer");
        Ok(Self {
            cluster,
            config,
            key_serializer,
            value_serializer,
            round_robin: rand::random(),
        })
    }

    /// Send a record, returning where it was written.
    ///
    /// A send to a topic which does not exist is retried as often as configured, waiting
    /// `retry_backoff` in between attempts.
    pub fn send(
        &mut self,
        record: ProducerRecord<KS::Input, VS::Input>,
    ) -> Result<RecordMetadata, ProducerError> {
        let key = record
            .key
            .as_ref()
            .map(|k| self.key_serializer.serialize(&record.topic, k))
            .transpose()?;
        let value = self
            .value_serializer
            .serialize(&record.topic, &record.value)?;

        let mut attempt = 0;
        loop {
            match self.try_send(&record, key.clone(), value.clone()) {
                Ok(meta) => return Ok(meta),
                Err(BrokerError::UnknownTopic(topic)) if attempt < self.config.retries => {
                    attempt += 1;
                    warn!(
                        %topic,
                        attempt,
                        retries = self.config.retries,
                        "Topic does not exist, retrying send"
                    );
                    std::thread::sleep(self.config.retry_backoff);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn try_send(
        &mut self,
        record: &ProducerRecord<KS::Input, VS::Input>,
        key: Option<Vec<u8>>,
        value: Vec<u8>,
    ) -> Result<RecordMetadata, BrokerError> {
        let partitions = self.cluster.partitions_for(&record.topic)?;
        let partition = match (record.partition, &key) {
            (Some(p), _) => p,
            (None, Some(k)) => partition_for_key(k, partitions),
            (None, None) => {
                let p = (self.round_robin % partitions as usize) as i32;
                self.round_robin = self.round_robin.wrapping_add(1);
                p
            }
        };
        let offset =
            self.cluster
                .append(&record.topic, partition, key, Some(value), record.timestamp)?;
        debug!(topic = %record.topic, partition, offset, "Produced record");
        Ok(RecordMetadata {
            topic: record.topic.clone(),
            partition,
            offset,
        })
    }
}

/// Partition for a keyed record. Records with equal keys always land on the same partition.
pub(crate) fn partition_for_key(key: &[u8], partitions: i32) -> i32 {
    let mut hasher = seahash::SeaHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % partitions.max(1) as u64) as i32
}

/// Errors when producing records
#[derive(Debug, Error)]
pub enum ProducerError {
    /// The broker rejected the request
    #[error("Broker error")]
    Broker(#[from] BrokerError),
    /// The record key or value could not be serialized
    #[error("Error serializing record")]
    Serialization(#[from] SerdeError),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use crate::embedded::{BytesSerde, StringSerde};

    fn producer(cluster: &EmbeddedCluster, retries: u32) -> Producer<StringSerde, StringSerde> {
        let config = ProducerConfig::builder()
            .bootstrap_servers(cluster.bootstrap_servers())
            .retries(retries)
            .retry_backoff(Duration::from_millis(5))
            .build();
        Producer::new(config, StringSerde, StringSerde).unwrap()
    }

    #[test]
    fn fails_for_unreachable_cluster() {
        let config = ProducerConfig::builder()
            .bootstrap_servers("embedded://nowhere")
            .build();
        let err = Producer::new(config, BytesSerde, BytesSerde).err().unwrap();
        assert!(matches!(
            err,
            ProducerError::Broker(BrokerError::Unreachable(_))
        ));
    }

    #[test]
    fn fails_for_unknown_topic() {
        let cluster = EmbeddedCluster::start();
        let err = producer(&cluster, 2)
            .send(ProducerRecord::new("nope", None, "v".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ProducerError::Broker(BrokerError::UnknownTopic(_))
        ));
    }

    #[test]
    fn retries_until_topic_exists() {
        let cluster = EmbeddedCluster::start();
        let admin = cluster.clone();
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            admin.create_topic("late").unwrap();
        });
        let meta = producer(&cluster, 1000)
            .send(ProducerRecord::new("late", None, "v".to_string()))
            .unwrap();
        thread.join().unwrap();
        assert_eq!(meta.offset, 0);
    }

    #[test]
    fn explicit_partition_wins() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic_with_partitions("topic", 4).unwrap();
        let record = ProducerRecord::builder()
            .topic("topic")
            .partition(3)
            .key("k".to_string())
            .value("v".to_string())
            .build();
        let meta = producer(&cluster, 0).send(record).unwrap();
        assert_eq!(meta.partition, 3);
        assert_eq!(cluster.log_end_offset("topic", 3).unwrap(), 1);
    }

    #[test]
    fn unkeyed_records_spread() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic_with_partitions("topic", 3).unwrap();
        let mut producer = producer(&cluster, 0);
        for _ in 0..6 {
            producer
                .send(ProducerRecord::new("topic", None, "v".to_string()))
                .unwrap();
        }
        for p in 0..3 {
            assert_eq!(cluster.log_end_offset("topic", p).unwrap(), 2);
        }
    }

    proptest! {
        /// equal keys always map to the same partition, within bounds
        #[test]
        fn key_partitioning_is_stable(key in proptest::collection::vec(any::<u8>(), 0..16), partitions in 1i32..64) {
            let first = partition_for_key(&key, partitions);
            prop_assert_eq!(first, partition_for_key(&key, partitions));
            prop_assert!((0..partitions).contains(&first));
        }
    }
}
