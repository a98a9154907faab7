//! Utilities for testing jobs end-to-end against an [EmbeddedCluster](crate::embedded::EmbeddedCluster)
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::{
    embedded::{
        BytesSerde, Consumer, ConsumerConfig, ConsumerError, ConsumerRecord, Deserializer,
        Producer, ProducerConfig, ProducerError, ProducerRecord, Serializer, StringSerde,
    },
    runtime::SingleThreadRuntime,
    worker::StreamProvider,
};

/// Wait this long for new records in a single poll
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Creates a single threaded runtime executing the given streams
pub fn get_test_rt<F>(stream: F) -> SingleThreadRuntime<F>
where
    F: FnMut(&mut dyn StreamProvider),
{
    SingleThreadRuntime::builder()
        .idle_backoff(Duration::ZERO)
        .build(stream)
}

/// Produce values with `None` keys, waiting for every send to complete before sending the next.
pub fn produce_values_synchronously<V: Clone>(
    topic: &str,
    values: &[V],
    config: ProducerConfig,
    value_serializer: impl Serializer<Input = V>,
) -> Result<(), TestUtilError> {
    let mut producer = Producer::new(config, BytesSerde, value_serializer)?;
    for value in values {
        let meta = producer.send(ProducerRecord::new(topic, None, value.clone()))?;
        debug!(topic, offset = meta.offset, "Produced test value");
    }
    Ok(())
}

/// Produce key value pairs, waiting for every send to complete before sending the next.
pub fn produce_key_values_synchronously<K: Clone, V: Clone>(
    topic: &str,
    records: &[(Option<K>, V)],
    config: ProducerConfig,
    key_serializer: impl Serializer<Input = K>,
    value_serializer: impl Serializer<Input = V>,
) -> Result<(), TestUtilError> {
    let mut producer = Producer::new(config, key_serializer, value_serializer)?;
    for (key, value) in records {
        let meta = producer.send(ProducerRecord::new(topic, key.clone(), value.clone()))?;
        debug!(topic, offset = meta.offset, "Produced test record");
    }
    Ok(())
}

/// Read the string values currently available in a topic, up to `max` values.
/// Records with `None` values are skipped.
pub fn read_values(
    topic: &str,
    config: ConsumerConfig,
    max: usize,
) -> Result<Vec<String>, TestUtilError> {
    let records = read_records(topic, config, max, BytesSerde, StringSerde)?;
    Ok(records.into_iter().filter_map(|x| x.value).collect())
}

/// Read the string key value pairs currently available in a topic, up to `max` records.
/// Records with `None` values are skipped.
pub fn read_key_values(
    topic: &str,
    config: ConsumerConfig,
    max: usize,
) -> Result<Vec<(Option<String>, String)>, TestUtilError> {
    let records = read_records(topic, config, max, StringSerde, StringSerde)?;
    Ok(records
        .into_iter()
        .filter_map(|x| x.value.map(|v| (x.key, v)))
        .collect())
}

fn read_records<KD: Deserializer, VD: Deserializer>(
    topic: &str,
    mut config: ConsumerConfig,
    max: usize,
    key_deserializer: KD,
    value_deserializer: VD,
) -> Result<Vec<ConsumerRecord<KD::Output, VD::Output>>, TestUtilError> {
    // positions are committed below, once we know which records are handed out
    let auto_commit = std::mem::replace(&mut config.enable_auto_commit, false);
    let mut consumer = Consumer::new(config, key_deserializer, value_deserializer)?;
    consumer.subscribe([topic])?;
    let mut records = Vec::new();
    while records.len() < max {
        let polled = consumer.poll(POLL_INTERVAL)?;
        if polled.is_empty() {
            break;
        }
        records.extend(polled);
    }
    // the records of every partition are in offset order, so the dropped ones are a suffix
    // per partition and the first dropped offset is where the next read must continue
    let kept = max.min(records.len());
    let mut rewind: IndexMap<i32, i64> = IndexMap::new();
    for dropped in records.drain(kept..) {
        rewind.entry(dropped.partition).or_insert(dropped.offset);
    }
    for (partition, offset) in rewind {
        consumer.seek(topic, partition, offset)?;
    }
    if auto_commit {
        consumer.commit_sync()?;
    }
    Ok(records)
}

/// Poll a topic until at least `expected` string values were received, or fail once the
/// timeout elapsed.
///
/// All values received are returned, which may be more than `expected`.
pub fn wait_until_min_values_received(
    config: ConsumerConfig,
    topic: &str,
    expected: usize,
    timeout: Duration,
) -> Result<Vec<String>, TestUtilError> {
    let deadline = Instant::now() + timeout;
    let mut consumer = Consumer::new(config, BytesSerde, StringSerde)?;
    consumer.subscribe([topic])?;
    let mut received = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let polled = consumer.poll(remaining.min(POLL_INTERVAL))?;
        received.extend(polled.into_iter().filter_map(|x| x.value));
        if received.len() >= expected {
            return Ok(received);
        }
        if remaining.is_zero() {
            return Err(TestUtilError::Timeout {
                expected,
                received: received.len(),
                timeout,
            });
        }
    }
}

/// Errors of the test utilities
#[derive(Debug, Error)]
pub enum TestUtilError {
    /// Producing test records failed
    #[error("Error producing test records")]
    Producer(#[from] ProducerError),
    /// Reading records failed
    #[error("Error consuming records")]
    Consumer(#[from] ConsumerError),
    /// Not enough records arrived in time
    #[error("Expected {expected} values, received {received} within {timeout:?}")]
    Timeout {
        /// Number of values waited for
        expected: usize,
        /// Number of values which arrived
        received: usize,
        /// Time waited
        timeout: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedded::{EmbeddedCluster, OffsetReset};

    fn configs(cluster: &EmbeddedCluster) -> (ProducerConfig, ConsumerConfig) {
        let producer = ProducerConfig::builder()
            .bootstrap_servers(cluster.bootstrap_servers())
            .build();
        let consumer = ConsumerConfig::builder()
            .bootstrap_servers(cluster.bootstrap_servers())
            .group_id("test-utils")
            .auto_offset_reset(OffsetReset::Earliest)
            .build();
        (producer, consumer)
    }

    #[test]
    fn produces_and_reads_values() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("topic").unwrap();
        let (producer, consumer) = configs(&cluster);
        let values = ["hello".to_string(), "world".to_string()];
        produce_values_synchronously("topic", &values, producer, StringSerde).unwrap();
        assert_eq!(read_values("topic", consumer, 10).unwrap(), values);
    }

    #[test]
    fn reads_at_most_max() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("topic").unwrap();
        let (producer, consumer) = configs(&cluster);
        let values = ["a", "b", "c"].map(String::from);
        produce_values_synchronously("topic", &values, producer, StringSerde).unwrap();
        assert_eq!(read_values("topic", consumer, 2).unwrap(), vec!["a", "b"]);
    }

    /// values beyond `max` stay available for the next read of the group
    #[test]
    fn values_beyond_max_are_not_committed() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("topic").unwrap();
        let (producer, consumer) = configs(&cluster);
        let values = ["a", "b", "c"].map(String::from);
        produce_values_synchronously("topic", &values, producer, StringSerde).unwrap();
        assert_eq!(
            read_values("topic", consumer.clone(), 2).unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(read_values("topic", consumer, 10).unwrap(), vec!["c"]);
    }

    #[test]
    fn reads_key_values() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("topic").unwrap();
        let (producer, consumer) = configs(&cluster);
        let records = [
            (Some("hello".to_string()), "HELLO".to_string()),
            (None, "WORLD".to_string()),
        ];
        produce_key_values_synchronously("topic", &records, producer, StringSerde, StringSerde)
            .unwrap();
        assert_eq!(read_key_values("topic", consumer, 10).unwrap(), records);
    }

    #[test]
    fn waits_for_late_values() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("topic").unwrap();
        let (producer, consumer) = configs(&cluster);
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            produce_values_synchronously("topic", &["late".to_string()], producer, StringSerde)
        });
        let received =
            wait_until_min_values_received(consumer, "topic", 1, Duration::from_secs(10))
                .unwrap();
        thread.join().unwrap().unwrap();
        assert_eq!(received, vec!["late"]);
    }

    #[test]
    fn wait_times_out() {
        let cluster = EmbeddedCluster::start();
        cluster.create_topic("topic").unwrap();
        let (_, consumer) = configs(&cluster);
        let err =
            wait_until_min_values_received(consumer, "topic", 1, Duration::from_millis(50))
                .unwrap_err();
        assert!(matches!(
            err,
            TestUtilError::Timeout {
                expected: 1,
                received: 0,
                ..
            }
        ));
    }
}
