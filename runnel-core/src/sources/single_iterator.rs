use std::iter;

use crate::types::{Data, NoKey};

use super::{StatelessSourceImpl, StatelessSourcePartition};

type BoxedValues<V> = Box<dyn Iterator<Item = V>>;

/// Emits the values of an iterator, in order, from a single partition. Each value is
/// timestamped with its position in the iterator. The stream finishes after the last value.
///
/// Handy to feed fixed test data into a job:
///
/// ```rust
/// use runnel::operators::*;
/// use runnel::runtime::SingleThreadRuntime;
/// use runnel::sources::{SingleIteratorSource, StatelessSource};
/// use runnel::worker::StreamProvider;
/// use runnel::sinks::{VecSink, StatelessSink};
/// use runnel::types::KeyValue;
///
/// let sink = VecSink::new();
/// let sink_clone = sink.clone();
/// let records = [
///     KeyValue::new(Some("k1".to_string()), "hello".to_string()),
///     KeyValue::new(None, "world".to_string()),
/// ];
///
/// SingleThreadRuntime::builder()
///     .build(move |provider: &mut dyn StreamProvider| {
///         provider.new_stream()
///         .source("records", StatelessSource::new(SingleIteratorSource::new(records.clone())))
///         .map_values("uppercase", |v: String| v.to_uppercase())
///         .sink("sink", StatelessSink::new(sink_clone.clone()));
///     })
///     .execute()
///     .unwrap();
/// let out: Vec<(usize, String)> = sink
///     .into_iter()
///     .map(|x| (x.timestamp, x.value.value))
///     .collect();
/// assert_eq!(out, vec![(0, "HELLO".to_string()), (1, "WORLD".to_string())]);
/// ```
pub struct SingleIteratorSource<V> {
    values: Option<BoxedValues<V>>,
}

impl<V> SingleIteratorSource<V> {
    /// Source emitting everything `values` yields
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        I::IntoIter: 'static,
    {
        Self {
            values: Some(Box::new(values.into_iter())),
        }
    }
}

impl<V: Data> StatelessSourceImpl<V, usize> for SingleIteratorSource<V> {
    type Part = NoKey;
    type SourcePartition = SingleIteratorPartition<V>;

    fn list_parts(&self) -> Vec<NoKey> {
        vec![NoKey]
    }

    fn build_part(&mut self, _part: &NoKey) -> SingleIteratorPartition<V> {
        // the iterator can only be handed out once, any further partition is empty
        let mut values = self
            .values
            .take()
            .unwrap_or_else(|| Box::new(iter::empty()));
        SingleIteratorPartition {
            lookahead: values.next(),
            values,
            position: 0,
        }
    }
}

/// The only partition of a [SingleIteratorSource]
pub struct SingleIteratorPartition<V> {
    values: BoxedValues<V>,
    // next value to emit, `None` once the iterator is exhausted
    lookahead: Option<V>,
    position: usize,
}

impl<V> StatelessSourcePartition<V, usize> for SingleIteratorPartition<V> {
    fn poll(&mut self) -> Option<(V, usize)> {
        let value = std::mem::replace(&mut self.lookahead, self.values.next())?;
        let position = self.position;
        self.position += 1;
        Some((value, position))
    }

    fn is_finished(&mut self) -> bool {
        self.lookahead.is_none()
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use crate::{
        channels::operator_io::Input,
        operators::*,
        sinks::{StatelessSink, VecSink},
        sources::{
            SingleIteratorSource, StatelessSource, StatelessSourceImpl, StatelessSourcePartition,
        },
        stream::OperatorBuilder,
        testing::get_test_rt,
        types::{Message, NoKey},
    };

    /// values arrive in iterator order, timestamped with their position
    #[test]
    fn emits_values_with_position() {
        let sink = VecSink::new();
        let rt = get_test_rt(|provider| {
            provider
                .new_stream()
                .source(
                    "words",
                    StatelessSource::new(SingleIteratorSource::new(["a", "b", "c"])),
                )
                .sink("sink", StatelessSink::new(sink.clone()));
        });
        rt.execute().unwrap();

        let out = sink.into_iter().map(|x| (x.timestamp, x.value)).collect_vec();
        assert_eq!(out, vec![(0, "a"), (1, "b"), (2, "c")]);
    }

    /// the stream is closed with `usize::MAX`, also when there are no values
    #[test]
    fn empty_iterator_finishes_stream() {
        let epochs = VecSink::new();
        let values = VecSink::new();
        let rt = get_test_rt(|provider| {
            let epochs = epochs.clone();
            provider
                .new_stream()
                .source(
                    "nothing",
                    StatelessSource::new(SingleIteratorSource::new(Vec::<String>::new())),
                )
                .then(OperatorBuilder::direct(
                    "epochs",
                    move |input: &mut Input<NoKey, String, usize>, output, _ctx| {
                        if let Some(msg) = input.recv() {
                            if let Message::Epoch(e) = &msg {
                                epochs.give(*e);
                            }
                            output.send(msg);
                        }
                    },
                ))
                .sink("sink", StatelessSink::new(values.clone()));
        });
        rt.execute().unwrap();

        assert!(values.is_empty());
        assert_eq!(epochs.drain_vec(..), vec![usize::MAX]);
    }

    /// a second partition built from the same source has nothing to emit
    #[test]
    fn iterator_is_handed_out_once() {
        let mut source = SingleIteratorSource::new(0..3);
        let mut first = source.build_part(&NoKey);
        let mut second = source.build_part(&NoKey);

        assert!(second.is_finished());
        assert_eq!(second.poll(), None);
        assert!(!first.is_finished());
        let polled = std::iter::from_fn(|| first.poll()).collect_vec();
        assert_eq!(polled, vec![(0, 0), (1, 1), (2, 2)]);
        assert!(first.is_finished());
    }
}
