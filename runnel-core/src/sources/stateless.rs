use std::hash::Hash;
use std::marker::PhantomData;

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    channels::operator_io::{Input, Output},
    operators::StreamSource,
    stream::{OperatorBuilder, StreamBuilder},
    types::{Data, DataMessage, MaybeKey, Message, NoData, NoKey, NoTime, Timestamp},
};

/// A source which provides records for processing and does not hold any state
/// (or only ephemeral state)
pub struct StatelessSource<V, T, S: StatelessSourceImpl<V, T>>(S, PhantomData<(V, T)>);
impl<V, T, S> StatelessSource<V, T, S>
where
    S: StatelessSourceImpl<V, T>,
{
    /// Create a new stateless source from the given source implementation.
    pub fn new(source: S) -> Self {
        Self(source, PhantomData)
    }
}

/// Implementation of a stateless stream source
pub trait StatelessSourceImpl<V, T>: 'static {
    /// A `Part` of a partition is a key by which any partition of the source is
    /// uniquely identified. It is perfectly valid for a source to only have a single part and in
    /// turn only a single partition. Usually parts will directly relate to some partitioning used
    /// by the external system providing the data, e.g. topic partitions.
    ///
    /// Every record emitted by a partition is keyed with its part.
    type Part: MaybeKey + Hash + Eq;
    /// A partition of this source. Each partition must be able to read unique values.
    type SourcePartition: StatelessSourcePartition<V, T>;

    /// List all partitions for this source
    fn list_parts(&self) -> Vec<Self::Part>;

    /// Build the partition for the given part
    fn build_part(&mut self, part: &Self::Part) -> Self::SourcePartition;
}

/// A single partition of a stateless source. A partition is the smallest unit of a source.
pub trait StatelessSourcePartition<V, T> {
    /// Poll this partition, possibly returning a record
    fn poll(&mut self) -> Option<(V, T)>;

    /// Suspend this partition.
    /// Suspend means the execution will be halted, but could continue later.
    /// Use this method to clean up any resources like external connections or
    /// file handles
    fn suspend(&mut self) {}

    /// Return true if this partition is finished and can be removed
    fn is_finished(&mut self) -> bool;
}

impl<V, T, S> StreamSource<S::Part, V, T> for StatelessSource<V, T, S>
where
    V: Data,
    T: Timestamp,
    S: StatelessSourceImpl<V, T>,
{
    fn into_stream(
        self,
        name: &str,
        builder: StreamBuilder<NoKey, NoData, NoTime>,
    ) -> StreamBuilder<S::Part, V, T> {
        let mut part_builder = self.0;
        let operator = OperatorBuilder::built_by(name, move |ctx| {
            let mut partitions: IndexMap<S::Part, S::SourcePartition> = part_builder
                .list_parts()
                .into_iter()
                .map(|part| {
                    let partition = part_builder.build_part(&part);
                    (part, partition)
                })
                .collect();
            debug!(
                operator = %ctx.operator_name,
                partitions = partitions.len(),
                "Built source partitions"
            );
            // final marker, we keep it in an option to only send it once
            let mut max_t = Some(T::MAX);

            move |input: &mut Input<NoKey, NoData, NoTime>,
                  output: &mut Output<S::Part, V, T>,
                  _ctx| {
                for (part, partition) in partitions.iter_mut() {
                    if let Some((data, time)) = partition.poll() {
                        output.send(Message::Data(DataMessage::new(part.clone(), data, time)));
                    }
                }
                partitions.retain(|_, partition| !partition.is_finished());
                if let Some(t) = max_t.take_if(|_| partitions.is_empty()) {
                    output.send(Message::Epoch(t));
                }

                match input.recv() {
                    Some(Message::SuspendMarker(marker)) => {
                        for partition in partitions.values_mut() {
                            partition.suspend();
                        }
                        output.send(Message::SuspendMarker(marker));
                    }
                    Some(Message::Data(_)) | Some(Message::Epoch(_)) | None => (),
                }
            }
        });
        builder.then(operator)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use itertools::Itertools;

    use super::*;
    use crate::{
        operators::{Sink, Source},
        sinks::{StatelessSink, VecSink},
        testing::get_test_rt,
        worker::{ControlSignal, StreamProvider, WorkerBuilder},
    };

    /// Counts down from a start value, one partition per start value
    struct Countdown {
        starts: Vec<u8>,
    }

    struct CountdownPartition(u8);

    impl StatelessSourceImpl<u8, u64> for Countdown {
        type Part = u8;
        type SourcePartition = CountdownPartition;

        fn list_parts(&self) -> Vec<Self::Part> {
            self.starts.clone()
        }

        fn build_part(&mut self, part: &Self::Part) -> Self::SourcePartition {
            CountdownPartition(*part)
        }
    }

    impl StatelessSourcePartition<u8, u64> for CountdownPartition {
        fn poll(&mut self) -> Option<(u8, u64)> {
            let current = self.0;
            self.0 = self.0.checked_sub(1)?;
            Some((current, 0))
        }

        fn is_finished(&mut self) -> bool {
            self.0 == 0
        }
    }

    /// every partition is polled and records are keyed by their part
    #[test]
    fn polls_all_partitions() {
        let sink = VecSink::new();
        let rt = get_test_rt(|provider| {
            provider
                .new_stream()
                .source(
                    "countdown",
                    StatelessSource::new(Countdown { starts: vec![2, 3] }),
                )
                .sink("sink", StatelessSink::new(sink.clone()));
        });
        rt.execute().unwrap();

        let mut out = sink.into_iter().map(|x| (x.key, x.value)).collect_vec();
        out.sort();
        assert_eq!(out, vec![(2, 1), (2, 2), (3, 1), (3, 2), (3, 3)]);
    }

    struct Forever(Rc<RefCell<bool>>);
    struct ForeverPartition(Rc<RefCell<bool>>);

    impl StatelessSourceImpl<(), u64> for Forever {
        type Part = NoKey;
        type SourcePartition = ForeverPartition;

        fn list_parts(&self) -> Vec<Self::Part> {
            vec![NoKey]
        }

        fn build_part(&mut self, _part: &Self::Part) -> Self::SourcePartition {
            ForeverPartition(Rc::clone(&self.0))
        }
    }

    impl StatelessSourcePartition<(), u64> for ForeverPartition {
        fn poll(&mut self) -> Option<((), u64)> {
            None
        }

        fn suspend(&mut self) {
            *self.0.borrow_mut() = true;
        }

        fn is_finished(&mut self) -> bool {
            false
        }
    }

    /// partitions get notified when the job is suspended
    #[test]
    fn suspends_partitions() {
        let suspended = Rc::new(RefCell::new(false));
        let mut builder = WorkerBuilder::new();
        builder
            .new_stream()
            .source("forever", StatelessSource::new(Forever(Rc::clone(&suspended))))
            .sink("sink", StatelessSink::new(VecSink::new()));
        let mut worker = builder.build(0, std::time::Duration::ZERO).unwrap();
        let (tx, rx) = flume::unbounded();
        tx.send(ControlSignal::Suspend).unwrap();
        worker.execute(&rx, || ());
        assert!(*suspended.borrow());
    }
}
