//! Chaining operators into streams

use std::{
    iter,
    rc::Rc,
    sync::{Mutex, PoisonError},
};

use super::operator::{AppendableOperator, BuildableOperator, OperatorBuilder};
use crate::{
    channels::operator_io::{link, Input},
    types::{Data, MaybeKey, MaybeTime},
    worker::{union, InnerRuntimeBuilder},
};

/// A stream under construction. Operators are appended with `.then` or one of the operator
/// traits like [Map](crate::operators::Map). Once the builder is dropped, or consumed by a
/// sink, its operators are registered with the worker which created it.
pub struct StreamBuilder<K, V, T> {
    // operators not yet handed to the worker
    pending: Vec<Box<dyn BuildableOperator>>,
    // receives whatever the last operator emits
    tail: Input<K, V, T>,
    worker: Rc<Mutex<InnerRuntimeBuilder>>,
}

impl<K, V, T> StreamBuilder<K, V, T> {
    fn take_tail(&mut self) -> Input<K, V, T> {
        std::mem::replace(&mut self.tail, Input::new_unlinked())
    }

    fn register(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_operators(self.pending.drain(..));
    }
}

impl<K, V, T> StreamBuilder<K, V, T>
where
    K: MaybeKey,
    V: Data,
    T: MaybeTime,
{
    pub(crate) fn new(tail: Input<K, V, T>, worker: Rc<Mutex<InnerRuntimeBuilder>>) -> Self {
        Self {
            pending: Vec::new(),
            tail,
            worker,
        }
    }

    /// Append an operator, returning the stream of its output
    pub fn then<KO: MaybeKey, VO: Data, TO: MaybeTime>(
        mut self,
        mut operator: OperatorBuilder<K, V, T, KO, VO, TO>,
    ) -> StreamBuilder<KO, VO, TO> {
        operator.connect_input(self.take_tail());
        let mut next = StreamBuilder::new(Input::new_unlinked(), Rc::clone(&self.worker));
        link(operator.output_mut(), &mut next.tail);
        next.pending = std::mem::take(&mut self.pending);
        next.pending.push(Box::new(operator).into_buildable());
        next
    }

    /// Register all operators with the worker and hand out the input at the end of the stream
    pub(crate) fn into_tail(mut self) -> Input<K, V, T> {
        self.register();
        self.take_tail()
    }

    /// Merge this stream with others of the same type. The merged stream finishes once all
    /// streams finished.
    pub fn union(
        self,
        others: impl IntoIterator<Item = StreamBuilder<K, V, T>>,
    ) -> StreamBuilder<K, V, T> {
        let worker = Rc::clone(&self.worker);
        union(worker, iter::once(self).chain(others))
    }
}

impl<K, V, T> Drop for StreamBuilder<K, V, T> {
    fn drop(&mut self) {
        self.register();
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use crate::{
        operators::{Map, Sink, Source},
        sinks::{StatelessSink, VecSink},
        sources::{SingleIteratorSource, StatelessSource},
        testing::get_test_rt,
    };

    #[test]
    fn union_merges_streams() {
        let sink = VecSink::new();
        let rt = get_test_rt(|provider| {
            let hello = provider.new_stream().source(
                "hello",
                StatelessSource::new(SingleIteratorSource::new(["hello"])),
            );
            let world = provider.new_stream().source(
                "world",
                StatelessSource::new(SingleIteratorSource::new(["world"])),
            );
            hello
                .union([world])
                .map("uppercase", |x| x.to_uppercase())
                .sink("sink", StatelessSink::new(sink.clone()));
        });
        rt.execute().unwrap();
        let values = sink.into_iter().map(|x| x.value).sorted().collect_vec();
        assert_eq!(values, vec!["HELLO", "WORLD"]);
    }

    /// operators of a stream which is dropped without a sink still run
    #[test]
    fn dropped_stream_is_scheduled() {
        let seen = VecSink::new();
        let rt = get_test_rt(|provider| {
            let seen = seen.clone();
            let _unsunk = provider
                .new_stream()
                .source(
                    "words",
                    StatelessSource::new(SingleIteratorSource::new(["hello", "world"])),
                )
                .map("record", move |x| {
                    seen.give(x);
                    x
                });
        });
        rt.execute().unwrap();
        assert_eq!(seen.len(), 2);
    }
}
