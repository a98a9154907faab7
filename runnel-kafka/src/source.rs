use std::collections::HashMap;
use std::time::Duration;

use kafka_source_builder::SetAtLeastOneBroker;
use runnel::errorhandling::RunnelFatal;
use runnel::sources::{StatelessSourceImpl, StatelessSourcePartition};

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, DefaultConsumerContext};

use bon::Builder;
use rdkafka::Message as _;
use rdkafka::{Offset, TopicPartitionList};
use thiserror::Error;
use tracing::{debug, warn};

use crate::KafkaRecord;

type OffsetIndex = i64;
type KafkaPartition = i32;

/// Create a new KafkaSource for a given topic.
/// This is a partitioned source with each Kafka partition mapping to one
/// [StatelessSourcePartition]. Records are timestamped with their offset.
/// NOTE: Records with an empty payload are not emitted to the stream.
///
/// # Usage
///
/// The source can be instantiated using the builder.
/// Custom [rdkafka configuration](https://github.com/confluentinc/librdkafka/blob/master/CONFIGURATION.md)
/// can be provided by calling `.conf(key, value)`.
///
/// ```
/// use runnel_kafka::KafkaSource;
///
/// let kafka_source = KafkaSource::builder()
///     .broker("mybroker.com") // at least one broker must be provided
///     .broker("myotherbroker.com")
///     .topic("inputTopic")
///     .group_id("map-function-lambda-example")
///     .auto_offset_reset("earliest")
///     .conf("log_level", "3") // additional custom config
///     .conf("security.protocol", "ssl");
/// ```
#[derive(Builder, Debug)]
#[builder(on(String, into))]
pub struct KafkaSource {
    #[builder(field)]
    kafka_config: HashMap<String, String>,
    #[builder(field)]
    brokers: Vec<String>,
    /// this is a workaround to check if at least one broker was provided
    #[builder(overwritable, setters(vis = "", name = "at_least_one_broker"))]
    _at_least_one_broker: (),
    topic: String,
    group_id: String,
    auto_offset_reset: String,
    /// Timeout for fetching Kafka Broker metadata
    #[builder(default=Duration::from_secs(10))]
    metadata_fetch_timeout: Duration,
}

impl<S: kafka_source_builder::State> KafkaSourceBuilder<S> {
    /// Provide an additional config for the Kafka consumer.
    /// Note that `bootstrap.servers`, `group.id`, `auto.offset.reset` and `enable.auto.commit`
    /// configs are ignored. Use the respective builder methods to supply the first three,
    /// offsets are committed by the source itself.
    pub fn conf(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kafka_config.insert(key.into(), value.into());
        self
    }
    /// Add a broker URL to consume from
    pub fn broker(mut self, url: impl Into<String>) -> KafkaSourceBuilder<SetAtLeastOneBroker<S>> {
        self.brokers.push(url.into());
        self.at_least_one_broker(())
    }
}

impl KafkaSource {
    fn create_consumer(&self) -> Result<BaseConsumer, KafkaConsumerError> {
        let mut kafka_conf = ClientConfig::new();
        for (k, v) in self.kafka_config.iter() {
            kafka_conf.set(k, v);
        }
        kafka_conf
            .set("group.id", &self.group_id)
            .set("bootstrap.servers", self.brokers.join(","))
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.auto.commit", "false");
        kafka_conf
            .create()
            .map_err(KafkaConsumerError::CreateConsumer)
    }

    fn fetch_partitions(&self) -> Result<Vec<KafkaPartition>, KafkaConsumerError> {
        let consumer = self.create_consumer()?;
        let metadata = consumer
            .fetch_metadata(Some(&self.topic), self.metadata_fetch_timeout)
            .map_err(KafkaConsumerError::FetchMetadata)?;
        // we selected a single topic, so there is at most one entry
        let topic = metadata
            .topics()
            .first()
            .filter(|t| t.error().is_none() && !t.partitions().is_empty())
            .ok_or_else(|| KafkaConsumerError::UnknownTopic(self.topic.clone()))?;
        Ok(topic.partitions().iter().map(|x| x.id()).collect())
    }
}

impl StatelessSourceImpl<KafkaRecord, OffsetIndex> for KafkaSource {
    type Part = KafkaPartition;
    type SourcePartition = KafkaSourcePartition;

    fn list_parts(&self) -> Vec<Self::Part> {
        let partitions = self.fetch_partitions().runnel_fatal();
        debug!(topic = %self.topic, ?partitions, "Listed Kafka partitions");
        partitions
    }

    fn build_part(&mut self, part: &Self::Part) -> Self::SourcePartition {
        let consumer = self.create_consumer().runnel_fatal();
        let mut topic_partitions = TopicPartitionList::with_capacity(1);
        topic_partitions.add_partition(&self.topic, *part);
        consumer
            .assign(&topic_partitions)
            .map_err(KafkaConsumerError::TopicPartition)
            .runnel_fatal();
        KafkaSourcePartition::new(consumer, &self.topic, *part)
    }
}

/// A single partition of [KafkaSource].
/// This type can not be constructed directly, use [KafkaSource] instead.
pub struct KafkaSourcePartition {
    consumer: BaseConsumer<DefaultConsumerContext>,
    // offset of the last received record
    last_recvd_offset: Option<OffsetIndex>,
    topic: String,
    partition: KafkaPartition,
}

impl KafkaSourcePartition {
    fn new(
        consumer: BaseConsumer<DefaultConsumerContext>,
        topic: &str,
        partition: KafkaPartition,
    ) -> Self {
        Self {
            consumer,
            last_recvd_offset: None,
            topic: topic.to_owned(),
            partition,
        }
    }

    /// Commit the offset following the last received record, so a restarted job continues
    /// right after it
    fn commit(&self) -> Result<(), KafkaConsumerError> {
        let Some(offset) = self.last_recvd_offset else {
            return Ok(());
        };
        let mut tpl = TopicPartitionList::with_capacity(1);
        tpl.add_partition_offset(&self.topic, self.partition, Offset::Offset(offset + 1))
            .map_err(KafkaConsumerError::Commit)?;
        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(KafkaConsumerError::Commit)
    }
}

impl StatelessSourcePartition<KafkaRecord, OffsetIndex> for KafkaSourcePartition {
    fn poll(&mut self) -> Option<(KafkaRecord, OffsetIndex)> {
        let msg = self
            .consumer
            .poll(Duration::default())?
            .map_err(KafkaConsumerError::Poll)
            .runnel_fatal();
        let offset = msg.offset();
        self.last_recvd_offset = Some(offset);
        KafkaRecord::from_message(&msg).map(|x| (x, offset))
    }

    fn suspend(&mut self) {
        // a failed commit only means records get read again after a restart
        if let Err(e) = self.commit() {
            warn!(topic = %self.topic, partition = self.partition, "{e}");
        }
    }

    #[inline(always)]
    fn is_finished(&mut self) -> bool {
        false // kafka is unbounded
    }
}

/// Possible errors which can occur in the KafkaConsumer
#[derive(Debug, Error)]
pub enum KafkaConsumerError {
    /// Polling the consumer returned an error
    #[error("Error polling Kafka consumer")]
    Poll(#[source] rdkafka::error::KafkaError),
    /// The consumer could not be created, usually due to invalid config
    #[error("Failed to create Kafka consumer")]
    CreateConsumer(#[source] rdkafka::error::KafkaError),
    /// Assigning the partition to a consumer failed
    #[error("Could not assign topic-partition to consumer")]
    TopicPartition(#[source] rdkafka::error::KafkaError),
    /// Broker metadata could not be fetched
    #[error("Failed to fetch metadata from Kafka broker")]
    FetchMetadata(#[source] rdkafka::error::KafkaError),
    /// The broker does not know the topic
    #[error("Topic '{0}' does not exist on the Kafka cluster")]
    UnknownTopic(String),
    /// Committing the consumed offset failed
    #[error("Failed to commit offset to Kafka")]
    Commit(#[source] rdkafka::error::KafkaError),
}

/// Doctests to assert some bad builders do not compile
/// see: https://stackoverflow.com/a/55327334
/// this should not compile because the broker is missing
/// ```compile_fail
/// use runnel_kafka::KafkaSource;
/// KafkaSource::builder()
/// .topic("inputTopic")
/// .group_id("groupid")
/// .auto_offset_reset("earliest")
/// .build();
/// ```
/// missing topic
/// ```compile_fail
/// use runnel_kafka::KafkaSource;
/// KafkaSource::builder()
/// .group_id("groupid")
/// .auto_offset_reset("earliest")
/// .broker("broker.com")
/// .build();
/// ```
/// missing group id
/// ```compile_fail
/// use runnel_kafka::KafkaSource;
/// KafkaSource::builder()
/// .topic("inputTopic")
/// .auto_offset_reset("earliest")
/// .broker("broker.com")
/// .build();
/// ```
/// missing offset reset
/// ```compile_fail
/// use runnel_kafka::KafkaSource;
/// KafkaSource::builder()
/// .topic("inputTopic")
/// .group_id("groupid")
/// .broker("broker.com")
/// .build();
/// ```
struct _CompileTests;
