//! An embedded, in-process topic broker with producer and consumer clients.
//!
//! The broker keeps every topic as a set of append-only partition logs in memory. It is meant
//! for testing jobs end-to-end without any external infrastructure: start an [EmbeddedCluster],
//! create topics, run a job reading from a [TopicSource] and writing into a [TopicSink] and
//! check the results with a [Consumer].
//!
//! Clients find their cluster through the address returned by
//! [EmbeddedCluster::bootstrap_servers], much like clients of a networked broker would.
mod cluster;
mod config;
mod connectors;
mod consumer;
mod producer;
mod record;
mod serialization;

pub use cluster::{BrokerError, EmbeddedCluster};
pub use config::{Acks, ConfigError, ConsumerConfig, OffsetReset, ProducerConfig, StreamsConfig};
pub use connectors::{TopicSink, TopicSource, TopicSourcePartition};
pub use consumer::{Consumer, ConsumerError};
pub use producer::{Producer, ProducerError};
pub use record::{ConsumerRecord, ProducerRecord, Record, RecordMetadata};
pub use serialization::{
    BytesSerde, Deserializer, MsgPackSerde, SerdeError, Serializer, StringSerde,
};
