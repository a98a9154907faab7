//! Uppercase every record of `inputTopic` and write it to `outputTopic` on a real Kafka cluster.
//!
//! The broker address is read from `KAFKA_BOOTSTRAP_SERVERS` and defaults to `localhost:9092`.
use runnel::operators::{Map, Sink, Source};
use runnel::runtime::SingleThreadRuntime;
use runnel::sinks::StatelessSink;
use runnel::sources::StatelessSource;
use runnel::worker::StreamProvider;
use runnel_kafka::{KafkaRecord, KafkaSink, KafkaSource};

fn main() {
    tracing_subscriber::fmt::init();
    SingleThreadRuntime::builder()
        .name("map-function")
        .build(build_dataflow)
        .execute()
        .unwrap();
}

fn build_dataflow(provider: &mut dyn StreamProvider) {
    let brokers = std::env::var("KAFKA_BOOTSTRAP_SERVERS")
        .unwrap_or_else(|_| "localhost:9092".to_string());
    let source = KafkaSource::builder()
        .broker(&brokers)
        .topic("inputTopic")
        .group_id("map-function-lambda-example")
        .auto_offset_reset("earliest")
        // https://github.com/confluentinc/librdkafka/blob/master/CONFIGURATION.md
        // for all supported config values
        .conf("client.id", "map-function-lambda-example-client")
        .build();
    let sink = KafkaSink::builder()
        .broker(&brokers)
        .group_id("map-function-lambda-example")
        .build();

    provider
        .new_stream()
        .source("kafka-source", StatelessSource::new(source))
        .map("uppercase", |record: KafkaRecord| {
            let value = String::from_utf8_lossy(&record.payload).to_uppercase();
            tracing::info!(%value, partition = ?record.partition, "Uppercased record");
            KafkaRecord {
                topic: "outputTopic".to_string(),
                partition: None,
                payload: value.into_bytes(),
                ..record
            }
        })
        .sink("kafka-sink", StatelessSink::new(sink));
}
