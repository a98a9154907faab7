//! A client reading records from the embedded broker
use std::time::Duration;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info};

use super::{
    cluster::{BrokerError, EmbeddedCluster},
    config::{ConsumerConfig, OffsetReset},
    record::ConsumerRecord,
    serialization::{Deserializer, SerdeError},
};

/// Reads records from topics of an [EmbeddedCluster].
///
/// Consumers in the same group share committed offsets but there is no coordination between
/// them: every consumer reads all partitions it subscribes to.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use runnel::embedded::*;
///
/// let cluster = EmbeddedCluster::start();
/// cluster.create_topic("outputTopic").unwrap();
///
/// let producer_config = ProducerConfig::builder()
///     .bootstrap_servers(cluster.bootstrap_servers())
///     .build();
/// let mut producer = Producer::new(producer_config, BytesSerde, StringSerde).unwrap();
/// producer.send(ProducerRecord::new("outputTopic", None, "HELLO".to_string())).unwrap();
///
/// let consumer_config = ConsumerConfig::builder()
///     .bootstrap_servers(cluster.bootstrap_servers())
///     .group_id("readers")
///     .auto_offset_reset(OffsetReset::Earliest)
///     .build();
/// let mut consumer = Consumer::new(consumer_config, BytesSerde, StringSerde).unwrap();
/// consumer.subscribe(["outputTopic"]).unwrap();
/// let records = consumer.poll(Duration::from_secs(1)).unwrap();
/// assert_eq!(records[0].value.as_deref(), Some("HELLO"));
/// ```
pub struct Consumer<KD, VD> {
    cluster: EmbeddedCluster,
    config: ConsumerConfig,
    key_deserializer: KD,
    value_deserializer: VD,
    // next offset to read for every assigned (topic, partition)
    positions: IndexMap<(String, i32), i64>,
    // rotates the partition fetched first, so no partition starves
    fetch_start: usize,
}

impl<KD, VD> Consumer<KD, VD>
where
    KD: Deserializer,
    VD: Deserializer,
{
    /// Connect a new consumer to the cluster given in the config
    pub fn new(
        config: ConsumerConfig,
        key_deserializer: KD,
        value_deserializer: VD,
    ) -> Result<Self, ConsumerError> {
        let cluster = EmbeddedCluster::resolve(&config.bootstrap_servers)?;
        debug!(group_id = %config.group_id, client_id = ?config.client_id, "Created consumer");
        Ok(Self {
            cluster,
            config,
            key_deserializer,
            value_deserializer,
            positions: IndexMap::new(),
            fetch_start: 0,
        })
    }

    /// Read from all partitions of the given topics
    pub fn subscribe<S: AsRef<str>>(
        &mut self,
        topics: impl IntoIterator<Item = S>,
    ) -> Result<(), ConsumerError> {
        for topic in topics {
            let topic = topic.as_ref();
            let partitions = self.cluster.partitions(topic)?;
            for partition in 0..partitions {
                self.assign(topic, partition)?;
            }
            info!(
                group_id = %self.config.group_id,
                topic, partitions, "Subscribed to topic"
            );
        }
        Ok(())
    }

    /// Read from a single partition. The consumer starts at the offset committed by its group
    /// or, if there is none, where the configured reset policy says.
    ///
    /// Assigning an already assigned partition does nothing.
    pub fn assign(&mut self, topic: &str, partition: i32) -> Result<(), ConsumerError> {
        if self.positions.contains_key(&(topic.to_string(), partition)) {
            return Ok(());
        }
        let committed = self
            .cluster
            .committed(&self.config.group_id, topic, partition)?;
        let start = match (committed, self.config.auto_offset_reset) {
            (Some(offset), _) => offset,
            (None, OffsetReset::Earliest) => 0,
            (None, OffsetReset::Latest) => self.cluster.log_end_offset(topic, partition)?,
            (None, OffsetReset::None) => {
                return Err(ConsumerError::NoOffsetForPartition {
                    topic: topic.to_string(),
                    partition,
                })
            }
        };
        debug!(topic, partition, start, "Assigned partition");
        self.positions.insert((topic.to_string(), partition), start);
        Ok(())
    }

    /// All partitions this consumer reads from
    pub fn assignment(&self) -> Vec<(String, i32)> {
        self.positions.keys().cloned().collect()
    }

    /// Offset of the next record this consumer will read from the partition
    pub fn position(&self, topic: &str, partition: i32) -> Option<i64> {
        self.positions.get(&(topic.to_string(), partition)).copied()
    }

    /// Move the position of an assigned partition
    pub fn seek(&mut self, topic: &str, partition: i32, offset: i64) -> Result<(), ConsumerError> {
        let position = self
            .positions
            .get_mut(&(topic.to_string(), partition))
            .ok_or_else(|| ConsumerError::NotAssigned {
                topic: topic.to_string(),
                partition,
            })?;
        *position = offset;
        Ok(())
    }

    /// Fetch the next records, waiting up to `timeout` if none are available.
    ///
    /// Records of one partition are returned in offset order. With auto commit enabled the new
    /// positions are committed before returning.
    pub fn poll(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<ConsumerRecord<KD::Output, VD::Output>>, ConsumerError> {
        if self.positions.is_empty() {
            return Err(ConsumerError::NoAssignment);
        }
        let mut positions: Vec<_> = self
            .positions
            .iter()
            .map(|((topic, partition), offset)| (topic.clone(), *partition, *offset))
            .collect();
        let len = positions.len();
        positions.rotate_left(self.fetch_start % len);
        self.fetch_start = self.fetch_start.wrapping_add(1);

        let fetched = self
            .cluster
            .fetch(&positions, self.config.max_poll_records, timeout)?;
        let records = fetched
            .into_iter()
            .map(|record| {
                let key = record
                    .key
                    .as_deref()
                    .map(|k| self.key_deserializer.deserialize(&record.topic, k))
                    .transpose()?;
                let value = record
                    .value
                    .as_deref()
                    .map(|v| self.value_deserializer.deserialize(&record.topic, v))
                    .transpose()?;
                Ok(ConsumerRecord {
                    topic: record.topic,
                    partition: record.partition,
                    offset: record.offset,
                    timestamp: record.timestamp,
                    key,
                    value,
                })
            })
            .collect::<Result<Vec<_>, SerdeError>>()?;

        for record in records.iter() {
            if let Some(position) = self
                .positions
                .get_mut(&(record.topic.clone(), record.partition))
            {
                *position = (*position).max(record.offset + 1);
            }
        }
        debug!(count = records.len(), "Polled records");
        if self.config.enable_auto_commit && !records.is_empty() {
            self.commit_sync()?;
        }
        Ok(records)
    }

    /// Commit the current position of every assigned partition for this consumer's group
    pub fn commit_sync(&mut self) -> Result<(), ConsumerError> {
        let offsets = self
            .positions
            .iter()
            .map(|((topic, partition), offset)| (topic.clone(), *partition, *offset));
        self.cluster.commit(&self.config.group_id, offsets)?;
        Ok(())
    }
}

/// Errors when consuming records
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The broker rejected the request
    #[error("Broker error")]
    Broker(#[from] BrokerError),
    /// A record key or value could not be deserialized
    #[error("Error deserializing record")]
    Deserialization(#[from] SerdeError),
    /// The group has no committed offset and the reset policy is `none`
    #[error("No committed offset for partition {partition} of topic '{topic}'")]
    NoOffsetForPartition {
        /// Topic of the partition
        topic: String,
        /// Partition without offset
        partition: i32,
    },
    /// The partition is not assigned to this consumer
    #[error("Partition {partition} of topic '{topic}' is not assigned")]
    NotAssigned {
        /// Topic of the partition
        topic: String,
        /// Partition which is not assigned
        partition: i32,
    },
    /// Poll was called before subscribing or assigning partitions
    #[error("Consumer is not subscribed to any topic")]
    NoAssignment,
}
