//! End-to-end tests of a job uppercasing the values of a topic, run against an embedded cluster
use std::time::Duration;

use runnel::embedded::*;
use runnel::errorhandling::RunnelFatal;
use runnel::operators::*;
use runnel::runtime::{HandleError, RuntimeHandle, RuntimeState, SingleThreadRuntime};
use runnel::sinks::StatelessSink;
use runnel::sources::StatelessSource;
use runnel::testing::{
    produce_values_synchronously, read_key_values, read_values, wait_until_min_values_received,
};
use runnel::types::KeyValue;
use runnel::worker::{ExecutionOutcome, StreamProvider};

const INPUT_TOPIC: &str = "inputTopic";
const OUTPUT_TOPIC: &str = "outputTopic";
const APPLICATION_ID: &str = "map-function-lambda-integration-test";
const TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A cluster with the input and output topics created
fn start_cluster() -> EmbeddedCluster {
    let cluster = EmbeddedCluster::start();
    cluster.create_topic(INPUT_TOPIC).unwrap();
    cluster.create_topic(OUTPUT_TOPIC).unwrap();
    cluster
}

fn streams_config(cluster: &EmbeddedCluster) -> StreamsConfig {
    StreamsConfig::from_properties([
        ("application.id", APPLICATION_ID),
        ("bootstrap.servers", cluster.bootstrap_servers()),
    ])
    .unwrap()
}

fn producer_config(cluster: &EmbeddedCluster) -> ProducerConfig {
    ProducerConfig::from_properties([
        ("bootstrap.servers", cluster.bootstrap_servers()),
        ("acks", "all"),
        ("retries", "0"),
    ])
    .unwrap()
}

fn consumer_config(cluster: &EmbeddedCluster) -> ConsumerConfig {
    ConsumerConfig::from_properties([
        ("bootstrap.servers", cluster.bootstrap_servers()),
        (
            "group.id",
            "map-function-lambda-integration-test-standard-consumer",
        ),
        ("auto.offset.reset", "earliest"),
    ])
    .unwrap()
}

fn input_source(config: StreamsConfig, bounded: bool) -> TopicSource<BytesSerde, StringSerde> {
    TopicSource::builder()
        .config(config)
        .topic(INPUT_TOPIC)
        .key_deserializer(BytesSerde)
        .value_deserializer(StringSerde)
        .bounded(bounded)
        .build()
        .runnel_fatal()
}

/// Start the uppercasing job on its own thread
fn start_uppercase_job(config: StreamsConfig) -> RuntimeHandle {
    SingleThreadRuntime::builder()
        .name(APPLICATION_ID)
        .build(move |provider: &mut dyn StreamProvider| {
            let sink = TopicSink::builder()
                .config(config.clone())
                .topic(OUTPUT_TOPIC)
                .key_serializer(BytesSerde)
                .value_serializer(StringSerde)
                .build()
                .runnel_fatal();
            provider
                .new_stream()
                .source("input", StatelessSource::new(input_source(config.clone(), false)))
                .map_values("uppercase", |v: String| v.to_uppercase())
                .sink("output", StatelessSink::new(sink));
        })
        .spawn()
        .unwrap()
}

#[test]
fn should_uppercase_the_input() {
    init_tracing();
    let cluster = start_cluster();
    let input_values = ["hello", "world"].map(String::from);
    let expected_values: Vec<String> = input_values.iter().map(|x| x.to_uppercase()).collect();

    // Step 1: start the job and wait until it runs
    let handle = start_uppercase_job(streams_config(&cluster));
    handle.await_running(TIMEOUT).unwrap();
    assert_eq!(handle.state(), RuntimeState::Running);

    // Step 2: produce the input
    produce_values_synchronously(
        INPUT_TOPIC,
        &input_values,
        producer_config(&cluster),
        StringSerde,
    )
    .unwrap();

    // Step 3: wait for the output, stop the job and verify
    let received = wait_until_min_values_received(
        consumer_config(&cluster),
        OUTPUT_TOPIC,
        expected_values.len(),
        TIMEOUT,
    )
    .unwrap();
    assert_eq!(received, expected_values);
    assert_eq!(handle.close(TIMEOUT).unwrap(), ExecutionOutcome::Suspended);

    // a fresh read of the whole topic must see exactly the expected values
    let fresh_reader = ConsumerConfig {
        group_id: "map-function-lambda-integration-test-verifier".to_string(),
        ..consumer_config(&cluster)
    };
    let actual_values = read_values(OUTPUT_TOPIC, fresh_reader, input_values.len()).unwrap();
    assert_eq!(actual_values, expected_values);
}

/// A second branch keys every uppercased value by its original value
#[test]
fn should_key_uppercased_by_original() {
    init_tracing();
    let cluster = start_cluster();
    cluster.create_topic("originalAndUppercased").unwrap();
    let config = streams_config(&cluster);
    let input_values = ["hello", "world"].map(String::from);
    produce_values_synchronously(
        INPUT_TOPIC,
        &input_values,
        producer_config(&cluster),
        StringSerde,
    )
    .unwrap();

    SingleThreadRuntime::builder()
        .build(move |provider: &mut dyn StreamProvider| {
            let uppercased = provider
                .new_stream()
                .source("input", StatelessSource::new(input_source(config.clone(), true)))
                .map_values("uppercase", |v: String| v.to_uppercase());
            let original_and_uppercased = provider
                .new_stream()
                .source(
                    "input-again",
                    StatelessSource::new(input_source(config.clone(), true)),
                )
                .map("key-by-original", |kv: KeyValue<Vec<u8>, String>| {
                    KeyValue::new(Some(kv.value.clone()), kv.value.to_uppercase())
                });
            uppercased.sink(
                "uppercased",
                StatelessSink::new(
                    TopicSink::builder()
                        .config(config.clone())
                        .topic(OUTPUT_TOPIC)
                        .key_serializer(BytesSerde)
                        .value_serializer(StringSerde)
                        .build()
                        .runnel_fatal(),
                ),
            );
            original_and_uppercased.sink(
                "original-and-uppercased",
                StatelessSink::new(
                    TopicSink::builder()
                        .config(config.clone())
                        .topic("originalAndUppercased")
                        .key_serializer(StringSerde)
                        .value_serializer(StringSerde)
                        .build()
                        .runnel_fatal(),
                ),
            );
        })
        .execute()
        .unwrap();

    let keyed = read_key_values("originalAndUppercased", consumer_config(&cluster), 10);
    let uppercased = read_values(OUTPUT_TOPIC, consumer_config(&cluster), 10).unwrap();
    assert_eq!(uppercased, vec!["HELLO", "WORLD"]);
    assert_eq!(
        keyed.unwrap(),
        vec![
            (Some("hello".to_string()), "HELLO".to_string()),
            (Some("world".to_string()), "WORLD".to_string()),
        ]
    );
}

/// Closing the job commits the input offsets, a restarted job only sees new records
#[test]
fn restarted_job_resumes_from_committed_offsets() {
    init_tracing();
    let cluster = start_cluster();
    let consumer = consumer_config(&cluster);

    let handle = start_uppercase_job(streams_config(&cluster));
    handle.await_running(TIMEOUT).unwrap();
    produce_values_synchronously(
        INPUT_TOPIC,
        &["hello".to_string()],
        producer_config(&cluster),
        StringSerde,
    )
    .unwrap();
    wait_until_min_values_received(consumer.clone(), OUTPUT_TOPIC, 1, TIMEOUT).unwrap();
    handle.close(TIMEOUT).unwrap();

    produce_values_synchronously(
        INPUT_TOPIC,
        &["world".to_string()],
        producer_config(&cluster),
        StringSerde,
    )
    .unwrap();
    let handle = start_uppercase_job(streams_config(&cluster));
    handle.await_running(TIMEOUT).unwrap();
    // the standard consumer group already read HELLO
    let received = wait_until_min_values_received(consumer, OUTPUT_TOPIC, 1, TIMEOUT).unwrap();
    handle.close(TIMEOUT).unwrap();
    assert_eq!(received, vec!["WORLD"]);

    let verifier = ConsumerConfig {
        group_id: "verifier".to_string(),
        ..consumer_config(&cluster)
    };
    assert_eq!(
        read_values(OUTPUT_TOPIC, verifier, 10).unwrap(),
        vec!["HELLO", "WORLD"]
    );
}

/// A job writing to a topic which does not exist fails and the handle reports it
#[test]
fn missing_output_topic_fails_job() {
    init_tracing();
    let cluster = EmbeddedCluster::start();
    cluster.create_topic(INPUT_TOPIC).unwrap();
    produce_values_synchronously(
        INPUT_TOPIC,
        &["hello".to_string()],
        producer_config(&cluster),
        StringSerde,
    )
    .unwrap();

    let handle = start_uppercase_job(streams_config(&cluster));
    // the job stops on its own once the sink fails
    let err = handle.join().unwrap_err();
    assert!(matches!(err, HandleError::WorkerPanic(msg) if msg.contains("outputTopic")));
}
