use crate::{
    stream::StreamBuilder,
    types::{Data, MaybeKey, Timestamp},
};

/// End a stream by writing its records somewhere
pub trait Sink<K, V, T, S>: super::sealed::Sealed {
    /// Write every record of this stream to `sink`. Ends the stream.
    ///
    /// # Example
    ///
    /// ```
    /// use runnel::embedded::*;
    /// use runnel::operators::*;
    /// use runnel::runtime::SingleThreadRuntime;
    /// use runnel::sinks::StatelessSink;
    /// use runnel::sources::{SingleIteratorSource, StatelessSource};
    /// use runnel::testing::read_values;
    /// use runnel::types::KeyValue;
    /// use runnel::worker::StreamProvider;
    ///
    /// let cluster = EmbeddedCluster::start();
    /// cluster.create_topic("greetings").unwrap();
    /// let config = StreamsConfig::from_properties([
    ///     ("application.id", "greeter"),
    ///     ("bootstrap.servers", cluster.bootstrap_servers()),
    /// ])
    /// .unwrap();
    ///
    /// SingleThreadRuntime::builder()
    ///     .build(move |provider: &mut dyn StreamProvider| {
    ///         let topic = TopicSink::builder()
    ///             .config(config.clone())
    ///             .topic("greetings")
    ///             .key_serializer(StringSerde)
    ///             .value_serializer(StringSerde)
    ///             .build()
    ///             .unwrap();
    ///         provider.new_stream()
    ///             .source("names", StatelessSource::new(SingleIteratorSource::new(["ada", "grace"])))
    ///             .map("greet", |name| KeyValue::new(Some(name.to_string()), format!("hello {name}")))
    ///             .sink("greetings", StatelessSink::new(topic));
    ///     })
    ///     .execute()
    ///     .unwrap();
    ///
    /// let reader = ConsumerConfig::from_properties([
    ///     ("bootstrap.servers", cluster.bootstrap_servers()),
    ///     ("group.id", "reader"),
    ///     ("auto.offset.reset", "earliest"),
    /// ])
    /// .unwrap();
    /// let written = read_values("greetings", reader, 10).unwrap();
    /// assert_eq!(written, vec!["hello ada", "hello grace"]);
    /// ```
    fn sink(self, name: &str, sink: S);
}

/// Anything which can take the records of a stream, for example a topic. Most outputs
/// implement [StatelessSinkImpl](crate::sinks::StatelessSinkImpl) and are wrapped in a
/// [StatelessSink](crate::sinks::StatelessSink) rather than implementing this directly.
#[diagnostic::on_unimplemented(message = "`{Self}` is not a stream sink, \
    wrap it in `StatelessSink::new` if it implements `StatelessSinkImpl`")]
pub trait StreamSink<K, V, T> {
    /// Append the operator writing to this output, consuming the stream.
    fn consume_stream(self, name: &str, builder: StreamBuilder<K, V, T>);
}

impl<K, V, T, S> Sink<K, V, T, S> for StreamBuilder<K, V, T>
where
    K: MaybeKey,
    V: Data,
    T: Timestamp,
    S: StreamSink<K, V, T>,
{
    fn sink(self, name: &str, sink: S) {
        sink.consume_stream(name, self)
    }
}
