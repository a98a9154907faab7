//! Kafka sources and sinks for Runnel.
//!
//! [KafkaSource] reads a topic with one stream partition per Kafka partition, [KafkaSink]
//! produces [KafkaRecord]s. Both talk to a real cluster through `rdkafka`. For tests without a
//! cluster use the embedded broker in `runnel::embedded` instead.
mod record;
mod sink;
mod source;

pub use record::KafkaRecord;
pub use sink::{KafkaProducerError, KafkaSink};
pub use source::{KafkaConsumerError, KafkaSource, KafkaSourcePartition};
