//! Sources and sinks connecting Runnel streams to topics of the embedded broker
use std::{collections::VecDeque, time::Duration};

use bon::bon;
use tracing::{debug, warn};

use super::{
    cluster::EmbeddedCluster,
    config::{Acks, StreamsConfig},
    consumer::{Consumer, ConsumerError},
    producer::{Producer, ProducerError},
    record::{ConsumerRecord, ProducerRecord},
    serialization::{Deserializer, Serializer},
};
use crate::{
    errorhandling::RunnelFatal,
    sinks::StatelessSinkImpl,
    sources::{StatelessSourceImpl, StatelessSourcePartition},
    types::{DataMessage, KeyValue},
};

/// Time a partition waits for records in a single poll, as `poll.ms` in Kafka Streams
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Reads a topic into a stream.
///
/// Every topic partition becomes a partition of the source and records are keyed by their
/// topic partition and timestamped with their offset. Offsets are committed for the
/// application's consumer group when the job is suspended, or for bounded sources when a
/// partition reached its end, so a restarted job continues where the previous one stopped. Records with a `None` value are skipped.
///
/// Use this with [StatelessSource](crate::sources::StatelessSource).
///
/// # Example
/// ```rust
/// use runnel::embedded::*;
/// use runnel::operators::*;
/// use runnel::runtime::SingleThreadRuntime;
/// use runnel::sinks::{StatelessSink, VecSink};
/// use runnel::sources::StatelessSource;
/// use runnel::worker::StreamProvider;
///
/// let cluster = EmbeddedCluster::start();
/// cluster.create_topic("inputTopic").unwrap();
/// let config = StreamsConfig::builder()
///     .application_id("uppercase")
///     .bootstrap_servers(cluster.bootstrap_servers())
///     .build();
///
/// let mut producer = Producer::new(config.producer_config(), BytesSerde, StringSerde).unwrap();
/// producer.send(ProducerRecord::new("inputTopic", None, "hello".to_string())).unwrap();
///
/// let sink = VecSink::new();
/// let sink_clone = sink.clone();
/// SingleThreadRuntime::builder()
///     .build(move |provider: &mut dyn StreamProvider| {
///         let source = TopicSource::builder()
///             .config(config.clone())
///             .topic("inputTopic")
///             .key_deserializer(BytesSerde)
///             .value_deserializer(StringSerde)
///             .bounded(true)
///             .build()
///             .unwrap();
///         provider.new_stream()
///             .source("input", StatelessSource::new(source))
///             .map_values("uppercase", |v: String| v.to_uppercase())
///             .sink("sink", StatelessSink::new(sink_clone.clone()));
///     })
///     .execute()
///     .unwrap();
/// let out: Vec<String> = sink.into_iter().map(|x| x.value.value).collect();
/// assert_eq!(out, vec!["HELLO".to_string()]);
/// ```
///
/// Topic and deserializers are required
/// ```compile_fail
/// use runnel::embedded::*;
///
/// let config = StreamsConfig::builder()
///     .application_id("app")
///     .bootstrap_servers("embedded://0")
///     .build();
/// let source = TopicSource::builder()
///     .config(config)
///     .value_deserializer(StringSerde)
///     .build();
/// ```
pub struct TopicSource<KD, VD> {
    config: StreamsConfig,
    topic: String,
    partitions: i32,
    key_deserializer: KD,
    value_deserializer: VD,
    bounded: bool,
    poll_timeout: Duration,
}

#[bon]
impl<KD, VD> TopicSource<KD, VD>
where
    KD: Deserializer,
    VD: Deserializer,
{
    /// Create a source reading the given topic. Fails if the cluster is not reachable or the
    /// topic does not exist.
    #[builder]
    pub fn new(
        config: StreamsConfig,
        #[builder(into)] topic: String,
        key_deserializer: KD,
        value_deserializer: VD,
        /// Finish each partition at the log end offset seen when the job starts, instead of
        /// reading forever
        #[builder(default)]
        bounded: bool,
        /// How long a partition waits for new records when polled
        #[builder(default = DEFAULT_POLL_TIMEOUT)]
        poll_timeout: Duration,
    ) -> Result<Self, ConsumerError> {
        let cluster = EmbeddedCluster::resolve(&config.bootstrap_servers)?;
        let partitions = cluster.partitions(&topic)?;
        Ok(Self {
            config,
            topic,
            partitions,
            key_deserializer,
            value_deserializer,
            bounded,
            poll_timeout,
        })
    }
}

impl<KD, VD> StatelessSourceImpl<KeyValue<KD::Output, VD::Output>, i64> for TopicSource<KD, VD>
where
    KD: Deserializer + Clone + 'static,
    VD: Deserializer + Clone + 'static,
    KD::Output: Clone + 'static,
    VD::Output: Clone + 'static,
{
    type Part = i32;
    type SourcePartition = TopicSourcePartition<KD, VD>;

    fn list_parts(&self) -> Vec<Self::Part> {
        (0..self.partitions).collect()
    }

    fn build_part(&mut self, part: &Self::Part) -> Self::SourcePartition {
        TopicSourcePartition::new(
            &self.config,
            &self.topic,
            *part,
            self.key_deserializer.clone(),
            self.value_deserializer.clone(),
            self.bounded,
            self.poll_timeout,
        )
        .runnel_fatal()
    }
}

/// A single topic partition read by a [TopicSource]
pub struct TopicSourcePartition<KD: Deserializer, VD: Deserializer> {
    consumer: Consumer<KD, VD>,
    topic: String,
    partition: i32,
    buffer: VecDeque<ConsumerRecord<KD::Output, VD::Output>>,
    // offset of the next record to emit
    next_offset: i64,
    // bounded sources stop here
    end_offset: Option<i64>,
    // the end offset of a bounded partition was committed
    end_committed: bool,
    poll_timeout: Duration,
}

impl<KD, VD> TopicSourcePartition<KD, VD>
where
    KD: Deserializer,
    VD: Deserializer,
{
    fn new(
        config: &StreamsConfig,
        topic: &str,
        partition: i32,
        key_deserializer: KD,
        value_deserializer: VD,
        bounded: bool,
        poll_timeout: Duration,
    ) -> Result<Self, ConsumerError> {
        let mut consumer = Consumer::new(
            config.consumer_config(),
            key_deserializer,
            value_deserializer,
        )?;
        consumer.assign(topic, partition)?;
        let next_offset = consumer
            .position(topic, partition)
            .ok_or_else(|| ConsumerError::NotAssigned {
                topic: topic.to_string(),
                partition,
            })?;
        let end_offset = if bounded {
            Some(EmbeddedCluster::resolve(&config.bootstrap_servers)?.log_end_offset(topic, partition)?)
        } else {
            None
        };
        debug!(topic, partition, next_offset, ?end_offset, "Built topic partition");
        Ok(Self {
            consumer,
            topic: topic.to_string(),
            partition,
            buffer: VecDeque::new(),
            next_offset,
            end_offset,
            end_committed: false,
            poll_timeout,
        })
    }

    fn reached_end(&self) -> bool {
        self.end_offset.is_some_and(|end| self.next_offset >= end)
    }

    /// Commit the offset of the next record to emit for the application's group
    fn commit_position(&mut self) {
        let committed = self
            .consumer
            .seek(&self.topic, self.partition, self.next_offset)
            .and_then(|_| self.consumer.commit_sync());
        match committed {
            Ok(()) => debug!(
                topic = %self.topic,
                partition = self.partition,
                offset = self.next_offset,
                "Committed source offset"
            ),
            Err(e) => warn!(
                topic = %self.topic,
                partition = self.partition,
                error = %e,
                "Failed to commit source offset"
            ),
        }
    }
}

impl<KD, VD> StatelessSourcePartition<KeyValue<KD::Output, VD::Output>, i64>
    for TopicSourcePartition<KD, VD>
where
    KD: Deserializer,
    VD: Deserializer,
{
    fn poll(&mut self) -> Option<(KeyValue<KD::Output, VD::Output>, i64)> {
        loop {
            if self.reached_end() {
                return None;
            }
            if self.buffer.is_empty() {
                let records = self.consumer.poll(self.poll_timeout).runnel_fatal();
                self.buffer.extend(records);
            }
            let record = self.buffer.pop_front()?;
            self.next_offset = record.offset + 1;
            match record.value {
                Some(value) => return Some((KeyValue::new(record.key, value), record.offset)),
                None => continue,
            }
        }
    }

    fn suspend(&mut self) {
        // buffered records were not emitted yet, so they must be read again on restart
        self.buffer.clear();
        self.commit_position();
    }

    fn is_finished(&mut self) -> bool {
        // a finished partition is dropped without being suspended
        if self.reached_end() && !self.end_committed {
            self.commit_position();
            self.end_committed = true;
        }
        self.reached_end()
    }
}

/// Writes every [KeyValue] of a stream to a topic.
///
/// The record key of the [KeyValue] becomes the topic record key, so records with equal keys
/// end up in the same partition.
///
/// Use this with [StatelessSink](crate::sinks::StatelessSink).
///
/// Topic and serializers are required
/// ```compile_fail
/// use runnel::embedded::*;
///
/// let config = StreamsConfig::builder()
///     .application_id("app")
///     .bootstrap_servers("embedded://0")
///     .build();
/// let sink = TopicSink::builder()
///     .config(config)
///     .key_serializer(BytesSerde)
///     .build();
/// ```
pub struct TopicSink<KS, VS> {
    producer: Producer<KS, VS>,
    topic: String,
}

#[bon]
impl<KS, VS> TopicSink<KS, VS>
where
    KS: Serializer,
    VS: Serializer,
{
    /// Create a sink writing to the given topic. Fails if the cluster is not reachable.
    #[builder]
    pub fn new(
        config: StreamsConfig,
        #[builder(into)] topic: String,
        key_serializer: KS,
        value_serializer: VS,
        #[builder(default)] acks: Acks,
    ) -> Result<Self, ProducerError> {
        let mut producer_config = config.producer_config();
        producer_config.acks = acks;
        let producer = Producer::new(producer_config, key_serializer, value_serializer)?;
        Ok(Self { producer, topic })
    }
}

impl<K, T, KS, VS> StatelessSinkImpl<K, KeyValue<KS::Input, VS::Input>, T> for TopicSink<KS, VS>
where
    KS: Serializer + 'static,
    VS: Serializer + 'static,
{
    fn sink(&mut self, msg: DataMessage<K, KeyValue<KS::Input, VS::Input>, T>) {
        let record = ProducerRecord::new(self.topic.clone(), msg.value.key, msg.value.value);
        self.producer.send(record).runnel_fatal();
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::{
        embedded::{
            BytesSerde, ConsumerConfig, OffsetReset, ProducerConfig, StringSerde,
        },
        operators::{MapValues, Sink, Source},
        runtime::SingleThreadRuntime,
        sinks::{StatelessSink, VecSink},
        sources::StatelessSource,
        worker::StreamProvider,
    };

    fn streams_config(cluster: &EmbeddedCluster) -> StreamsConfig {
        StreamsConfig::builder()
            .application_id("connector-test")
            .bootstrap_servers(cluster.bootstrap_servers())
            .build()
    }

    fn produce(cluster: &EmbeddedCluster, topic: &str, records: &[(Option<&str>, &str)]) {
        let config = ProducerConfig::builder()
            .bootstrap_servers(cluster.bootstrap_servers())
            .build();
        let mut producer = Producer::new(config, StringSerde, StringSerde).unwrap();
        for (k, v) in records {
            producer
                .send(ProducerRecord::new(
                    topic,
                    k.map(str::to_string),
                    v.to_string(),
                ))
                .unwrap();
        }
    }

    fn bounded_source(config: StreamsConfig, topic: &str) -> TopicSource<StringSerde, StringSerde> {
        TopicSource::builder()
            .config(config)
            .topic(topic)
            .key_deserializer(StringSerde)
            .value_deserializer(StringSerde)
            .bounded(true)
            .build()
            .unwrap()
    }

    #[test]
    fn source_requires_existing_topic() {
        let cluster = EmbeddedCluster::start();
        let result = TopicSource::builder()
            .config(streams_config(&cluster))
            .topic("nope")
            .key_deserializer(BytesSerde)
            .value_deserializer(StringSerde)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn bounded_source_reads_all_partitions() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic_with_partitions("input", 2).unwrap();
        produce(
            &cluster,
            "input",
            &[(Some("a"), "1"), (Some("b"), "2"), (Some("c"), "3"), (None, "4")],
        );
        let config = streams_config(&cluster);
        let collector = VecSink::new();
        let collector_clone = collector.clone();
        SingleThreadRuntime::builder()
            .build(move |provider: &mut dyn StreamProvider| {
                provider
                    .new_stream()
                    .source(
                        "input",
                        StatelessSource::new(bounded_source(config.clone(), "input")),
                    )
                    .sink("sink", StatelessSink::new(collector_clone.clone()));
            })
            .execute()
            .unwrap();

        let received = collector.into_iter().collect_vec();
        // every record is keyed by its partition and timestamped with its offset
        for msg in received.iter() {
            let log_end = cluster.log_end_offset("input", msg.key).unwrap();
            assert!(msg.timestamp < log_end);
        }
        let values = received
            .into_iter()
            .map(|x| x.value.value)
            .sorted()
            .collect_vec();
        assert_eq!(values, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn source_skips_tombstones() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("input").unwrap();
        produce(&cluster, "input", &[(None, "before")]);
        cluster.append("input", 0, None, None, None).unwrap();
        produce(&cluster, "input", &[(None, "after")]);

        let config = streams_config(&cluster);
        let collector = VecSink::new();
        let collector_clone = collector.clone();
        SingleThreadRuntime::builder()
            .build(move |provider: &mut dyn StreamProvider| {
                provider
                    .new_stream()
                    .source(
                        "input",
                        StatelessSource::new(bounded_source(config.clone(), "input")),
                    )
                    .sink("sink", StatelessSink::new(collector_clone.clone()));
            })
            .execute()
            .unwrap();
        let values = collector.into_iter().map(|x| x.value.value).collect_vec();
        assert_eq!(values, vec!["before", "after"]);
    }

    #[test]
    fn sink_writes_keyed_records() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("input").unwrap();
        cluster.create_topic("output").unwrap();
        produce(&cluster, "input", &[(Some("k1"), "hello"), (None, "world")]);

        let config = streams_config(&cluster);
        SingleThreadRuntime::builder()
            .build(move |provider: &mut dyn StreamProvider| {
                let sink = TopicSink::builder()
                    .config(config.clone())
                    .topic("output")
                    .key_serializer(StringSerde)
                    .value_serializer(StringSerde)
                    .build()
                    .unwrap();
                provider
                    .new_stream()
                    .source(
                        "input",
                        StatelessSource::new(bounded_source(config.clone(), "input")),
                    )
                    .map_values("uppercase", |v: String| v.to_uppercase())
                    .sink("output", StatelessSink::new(sink));
            })
            .execute()
            .unwrap();

        let consumer_config = ConsumerConfig::builder()
            .bootstrap_servers(cluster.bootstrap_servers())
            .group_id("check")
            .auto_offset_reset(OffsetReset::Earliest)
            .build();
        let mut consumer = Consumer::new(consumer_config, StringSerde, StringSerde).unwrap();
        consumer.subscribe(["output"]).unwrap();
        let records = consumer
            .poll(Duration::from_secs(1))
            .unwrap()
            .into_iter()
            .map(|x| (x.key, x.value))
            .collect_vec();
        assert_eq!(
            records,
            vec![
                (Some("k1".to_string()), Some("HELLO".to_string())),
                (None, Some("WORLD".to_string())),
            ]
        );
    }

    #[test]
    fn suspend_commits_emitted_offset() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("input").unwrap();
        produce(&cluster, "input", &[(None, "a"), (None, "b"), (None, "c")]);
        let config = streams_config(&cluster);

        let mut partition = TopicSourcePartition::new(
            &config,
            "input",
            0,
            StringSerde,
            StringSerde,
            false,
            Duration::ZERO,
        )
        .unwrap();
        let (first, offset) = partition.poll().unwrap();
        assert_eq!(first.value, "a");
        assert_eq!(offset, 0);
        partition.suspend();

        // b and c were fetched into the buffer, but not emitted
        assert_eq!(
            cluster.committed("connector-test", "input", 0).unwrap(),
            Some(1)
        );
    }

    fn run_bounded(config: StreamsConfig, topic: &'static str) -> Vec<String> {
        let collector = VecSink::new();
        let collector_clone = collector.clone();
        SingleThreadRuntime::builder()
            .build(move |provider: &mut dyn StreamProvider| {
                provider
                    .new_stream()
                    .source(
                        "input",
                        StatelessSource::new(bounded_source(config.clone(), topic)),
                    )
                    .map_values("uppercase", |v: String| v.to_uppercase())
                    .sink("sink", StatelessSink::new(collector_clone.clone()));
            })
            .execute()
            .unwrap();
        collector.into_iter().map(|x| x.value.value).collect_vec()
    }

    /// a finished bounded job leaves its offsets committed, a rerun has nothing left to read
    #[test]
    fn bounded_run_commits_end_offset() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("input").unwrap();
        produce(&cluster, "input", &[(None, "hello"), (None, "world")]);
        let config = streams_config(&cluster);

        assert_eq!(run_bounded(config.clone(), "input"), vec!["HELLO", "WORLD"]);
        assert_eq!(
            cluster.committed("connector-test", "input", 0).unwrap(),
            Some(2)
        );
        assert!(run_bounded(config.clone(), "input").is_empty());

        produce(&cluster, "input", &[(None, "again")]);
        assert_eq!(run_bounded(config, "input"), vec!["AGAIN"]);
    }

    #[test]
    fn source_defaults_to_poll_timeout() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("input").unwrap();
        let source = TopicSource::builder()
            .config(streams_config(&cluster))
            .topic("input")
            .key_deserializer(BytesSerde)
            .value_deserializer(StringSerde)
            .build()
            .unwrap();
        assert_eq!(source.poll_timeout, DEFAULT_POLL_TIMEOUT);
        assert!(!source.bounded);
    }
}
