//! Uppercase every value of a topic on an embedded cluster and print the results
use std::time::Duration;

use runnel::embedded::*;
use runnel::errorhandling::RunnelFatal;
use runnel::operators::*;
use runnel::runtime::SingleThreadRuntime;
use runnel::sinks::StatelessSink;
use runnel::sources::StatelessSource;
use runnel::testing::{produce_values_synchronously, wait_until_min_values_received};
use runnel::worker::StreamProvider;

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();
    let cluster = EmbeddedCluster::start();
    cluster.create_topic("inputTopic")?;
    cluster.create_topic("outputTopic")?;

    let config = StreamsConfig::builder()
        .application_id("map-function-example")
        .bootstrap_servers(cluster.bootstrap_servers())
        .build();
    let job_config = config.clone();
    let handle = SingleThreadRuntime::builder()
        .name("map-function")
        .build(move |provider: &mut dyn StreamProvider| {
            let source = TopicSource::builder()
                .config(job_config.clone())
                .topic("inputTopic")
                .key_deserializer(BytesSerde)
                .value_deserializer(StringSerde)
                .build()
                .runnel_fatal();
            let sink = TopicSink::builder()
                .config(job_config.clone())
                .topic("outputTopic")
                .key_serializer(BytesSerde)
                .value_serializer(StringSerde)
                .build()
                .runnel_fatal();
            provider
                .new_stream()
                .source("input", StatelessSource::new(source))
                .map_values("uppercase", |v: String| v.to_uppercase())
                .sink("output", StatelessSink::new(sink));
        })
        .spawn()?;
    handle.await_running(Duration::from_secs(10))?;

    let values = ["hello", "world"].map(String::from);
    produce_values_synchronously("inputTopic", &values, config.producer_config(), StringSerde)?;

    let consumer_config = ConsumerConfig::builder()
        .bootstrap_servers(cluster.bootstrap_servers())
        .group_id("map-function-example-reader")
        .auto_offset_reset(OffsetReset::Earliest)
        .build();
    let output = wait_until_min_values_received(
        consumer_config,
        "outputTopic",
        values.len(),
        Duration::from_secs(30),
    )?;
    handle.close(Duration::from_secs(10))?;
    for value in output {
        println!("{value}");
    }
    Ok(())
}
