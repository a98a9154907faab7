use kafka_sink_builder::SetAtLeastOneBroker;
use rdkafka::producer::{BaseProducer, DefaultProducerContext, Producer as _};
use rdkafka::ClientConfig;
use runnel::errorhandling::RunnelFatal as _;
use runnel::sinks::StatelessSinkImpl;
use runnel::types::DataMessage;
use std::{collections::HashMap, time::Duration};
use thiserror::Error;
use tracing::debug;

use bon::bon;

use crate::KafkaRecord;

/// A sink producing [KafkaRecord]s to a Kafka cluster.
/// Each record is written to the topic (and partition if set) it names.
/// Buffered records are flushed when the job is suspended.
pub struct KafkaSink {
    producer: BaseProducer<DefaultProducerContext>,
    flush_timeout: Duration,
}

#[bon]
impl KafkaSink {
    /// Create a new sink producing to the given brokers
    #[builder]
    #[builder(on(String, into))]
    pub fn new(
        #[builder(field)] kafka_config: HashMap<String, String>,
        #[builder(field)] brokers: Vec<String>,
        /// this is a workaround to check if at least one broker was provided
        #[builder(overwritable, setters(vis = "", name = "at_least_one_broker"))]
        _at_least_one_broker: (),
        group_id: String,
        /// How long to wait for outstanding records when suspending
        #[builder(default = Duration::from_secs(10))]
        flush_timeout: Duration,
    ) -> Self {
        let mut kafka_conf = ClientConfig::new();
        for (k, v) in kafka_config.iter() {
            kafka_conf.set(k, v);
        }
        let producer = kafka_conf
            .set("group.id", group_id)
            .set("bootstrap.servers", brokers.join(","))
            .create()
            .map_err(KafkaProducerError::CreateProducer)
            .runnel_fatal();
        Self {
            producer,
            flush_timeout,
        }
    }
}

impl<S: kafka_sink_builder::State> KafkaSinkBuilder<S> {
    /// Provide an additional config for the Kafka producer.
    /// Note that `bootstrap.servers`, `group.id` configs are
    /// ignored. Use the respective builder methods to supply these.
    pub fn conf(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kafka_config.insert(key.into(), value.into());
        self
    }
    /// Add a broker URL to produce records to
    pub fn broker(mut self, url: impl Into<String>) -> KafkaSinkBuilder<SetAtLeastOneBroker<S>> {
        self.brokers.push(url.into());
        self.at_least_one_broker(())
    }
}

impl<K, T> StatelessSinkImpl<K, KafkaRecord, T> for KafkaSink {
    fn sink(&mut self, msg: DataMessage<K, KafkaRecord, T>) {
        let record = msg.value;

        let base_record = record.base_record();
        self.producer
            .send(base_record)
            .map_err(|(e, _)| KafkaProducerError::Send(e))
            .runnel_fatal();
        // serve delivery callbacks so the internal queue does not fill up
        self.producer.poll(Duration::default());
    }

    fn suspend(&mut self) {
        debug!(in_flight = self.producer.in_flight_count(), "Flushing Kafka producer");
        self.producer
            .flush(self.flush_timeout)
            .map_err(KafkaProducerError::Flush)
            .runnel_fatal();
    }
}

/// Possible errors which can occur in the KafkaSink
#[derive(Debug, Error)]
pub enum KafkaProducerError {
    /// A record could not be enqueued
    #[error("Failed to send message")]
    Send(#[source] rdkafka::error::KafkaError),
    /// The producer could not be created, usually due to invalid config
    #[error("Failed to create Kafka Producer")]
    CreateProducer(#[source] rdkafka::error::KafkaError),
    /// Outstanding records were not delivered within the flush timeout
    #[error("Failed to flush Kafka Producer")]
    Flush(#[source] rdkafka::error::KafkaError),
}

/// Doctests to assert some bad builders do not compile
/// see: https://stackoverflow.com/a/55327334
/// this should not compile because the broker is missing
/// ```compile_fail
/// use runnel_kafka::KafkaSink;
/// KafkaSink::builder()
/// .group_id("groupid")
/// .build();
/// ```
/// missing group id
/// ```compile_fail
/// use runnel_kafka::KafkaSink;
/// KafkaSink::builder()
/// .broker("broker.com")
/// .build();
/// ```
struct _CompileTests;

#[cfg(test)]
mod tests {
    use super::KafkaSink;
    use crate::KafkaRecord;
    use runnel::sinks::StatelessSinkImpl;
    use runnel::types::NoKey;

    #[test]
    fn test_sink_builder() {
        let _sink = KafkaSink::builder()
            .broker("foo.com")
            .group_id("mygroup")
            .conf("log_level", "3")
            .build();
    }

    /// with nothing in flight a flush returns right away, even without a reachable broker
    #[test]
    fn suspend_without_records() {
        let mut sink = KafkaSink::builder()
            .broker("localhost:1")
            .group_id("mygroup")
            .build();
        StatelessSinkImpl::<NoKey, KafkaRecord, i64>::suspend(&mut sink);
    }
}
