use crate::{
    stream::StreamBuilder,
    types::{Data, MaybeKey, NoData, NoKey, NoTime, Timestamp},
};

/// Start a stream by reading from a source
pub trait Source<K, V, T, S>: super::sealed::Sealed {
    /// Attach a source to a fresh stream from
    /// [StreamProvider::new_stream](crate::worker::StreamProvider::new_stream).
    /// A stream has exactly one source. Jobs reading several inputs create one stream per
    /// input and merge them with [StreamBuilder::union].
    ///
    /// # Example
    ///
    /// ```
    /// use runnel::operators::*;
    /// use runnel::runtime::SingleThreadRuntime;
    /// use runnel::sources::{SingleIteratorSource, StatelessSource};
    /// use runnel::worker::StreamProvider;
    /// use runnel::sinks::{VecSink, StatelessSink};
    ///
    /// let sink = VecSink::new();
    /// let sink_clone = sink.clone();
    ///
    /// SingleThreadRuntime::builder()
    ///     .build(move |provider: &mut dyn StreamProvider| {
    ///         let greetings = provider
    ///             .new_stream()
    ///             .source("greetings", StatelessSource::new(SingleIteratorSource::new(["hello"])));
    ///         let names = provider
    ///             .new_stream()
    ///             .source("names", StatelessSource::new(SingleIteratorSource::new(["world"])));
    ///         greetings
    ///             .union([names])
    ///             .sink("sink", StatelessSink::new(sink_clone.clone()));
    ///     })
    ///     .execute()
    ///     .unwrap();
    /// let mut out: Vec<&str> = sink.into_iter().map(|x| x.value).collect();
    /// out.sort();
    /// assert_eq!(out, vec!["hello", "world"]);
    /// ```
    fn source(self, name: &str, source: S) -> StreamBuilder<K, V, T>;
}

/// Anything which can feed records into a stream, for example a topic. Most inputs implement
/// [StatelessSourceImpl](crate::sources::StatelessSourceImpl) and are wrapped in a
/// [StatelessSource](crate::sources::StatelessSource) rather than implementing this directly.
#[diagnostic::on_unimplemented(message = "`{Self}` is not a stream source, \
    wrap it in `StatelessSource::new` if it implements `StatelessSourceImpl`")]
pub trait StreamSource<K, V, T> {
    /// Append the operator reading this input to an empty stream.
    /// The operator must keep reading the stream's input and pass suspend markers on.
    fn into_stream(
        self,
        name: &str,
        builder: StreamBuilder<NoKey, NoData, NoTime>,
    ) -> StreamBuilder<K, V, T>;
}

impl<K, V, T, S> Source<K, V, T, S> for StreamBuilder<NoKey, NoData, NoTime>
where
    K: MaybeKey,
    V: Data,
    T: Timestamp,
    S: StreamSource<K, V, T>,
{
    fn source(self, name: &str, source: S) -> StreamBuilder<K, V, T> {
        source.into_stream(name, self)
    }
}
