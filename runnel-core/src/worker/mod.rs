//! Worker: A worker in Runnel is the unit which is executing the operations in a job.
//! All operators of a job are scheduled cooperatively on the worker's thread.
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::channels::operator_io::{link, merge_inputs, Input, Output};
use crate::stream::StreamBuilder;
use crate::stream::{BuildContext, BuildableOperator, RunnableOperator};
use crate::types::{
    Data, MaybeKey, MaybeTime, Message, NoData, NoKey, NoTime, SuspendMarker, WorkerId,
};
use thiserror::Error;
use tracing::{debug, info, span, Level};

/// Builder for a Runnel worker.
/// This builder is used to create new streams. Once all streams are defined it is turned into
/// a worker which executes them.
pub struct WorkerBuilder {
    inner: Rc<Mutex<InnerRuntimeBuilder>>,
    root_stream: Output<NoKey, NoData, NoTime>,
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerBuilder {
    /// Create a new worker builder without any streams
    pub fn new() -> WorkerBuilder {
        WorkerBuilder {
            inner: Rc::new(Mutex::new(InnerRuntimeBuilder::default())),
            root_stream: Output::new_unlinked(),
        }
    }
}

/// Creates new streams to add to the job
pub trait StreamProvider {
    /// Create a new empty stream. This stream will not contain any data.
    /// Call `.source()` on the stream to add a source.
    fn new_stream(&mut self) -> StreamBuilder<NoKey, NoData, NoTime>;
}

impl StreamProvider for WorkerBuilder {
    fn new_stream(&mut self) -> StreamBuilder<NoKey, NoData, NoTime> {
        // link our new stream to the root stream
        // so it can receive system messages
        let mut receiver = Input::new_unlinked();
        link(&mut self.root_stream, &mut receiver);
        StreamBuilder::new(receiver, Rc::clone(&self.inner))
    }
}

impl WorkerBuilder {
    /// Build all operators registered on this worker.
    ///
    /// Fails if a stream builder created from this worker is still alive or two operators share
    /// the same name.
    pub(crate) fn build(
        self,
        worker_id: WorkerId,
        idle_backoff: Duration,
    ) -> Result<Worker, WorkerExecutionError> {
        let ref_count = Rc::strong_count(&self.inner);
        let inner = Rc::try_unwrap(self.inner)
            .map_err(|_| WorkerExecutionError::UnfinishedStreams(ref_count - 1))?;
        let operators = inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .finish();

        let mut seen_ids = HashSet::new();
        let operators = operators
            .into_iter()
            .map(|x| {
                let operator_name = x.get_name().to_string();
                let operator_id = x.get_id();
                if !seen_ids.insert(operator_id) {
                    Err(WorkerExecutionError::NonUniqueName(operator_name.clone()))?
                }
                let mut ctx = BuildContext::new(worker_id, operator_id, operator_name);
                Ok(x.into_runnable(&mut ctx))
            })
            .collect::<Result<Vec<RunnableOperator>, WorkerExecutionError>>()?;
        info!(worker_id, operator_count = operators.len(), "Built worker");
        Ok(Worker {
            worker_id,
            operators,
            root: self.root_stream,
            idle_backoff,
        })
    }
}

/// Possible errors when building or executing a worker
#[derive(Error, Debug)]
pub enum WorkerExecutionError {
    /// A stream builder was not dropped before building the worker
    #[error(
        "{0} Unfinished streams in this runtime.
    You must drop all streams created on this runtime before building the Runtime"
    )]
    UnfinishedStreams(usize),
    /// Operator names must be unique within a job
    #[error("Operator name '{0}' is not unique. Rename this operator.")]
    NonUniqueName(String),
}

#[derive(Default)]
pub(crate) struct InnerRuntimeBuilder {
    operators: Vec<Box<dyn BuildableOperator>>,
}
impl InnerRuntimeBuilder {
    pub(crate) fn add_operators(
        &mut self,
        operators: impl IntoIterator<Item = Box<dyn BuildableOperator>>,
    ) {
        self.operators.extend(operators)
    }
    // destroy this builder and return the operators
    fn finish(self) -> Vec<Box<dyn BuildableOperator>> {
        self.operators
    }
}

/// Unions N streams with identical output types into a single stream
pub(crate) fn union<K: MaybeKey, V: Data, T: MaybeTime>(
    runtime: Rc<Mutex<InnerRuntimeBuilder>>,
    streams: impl Iterator<Item = StreamBuilder<K, V, T>>,
) -> StreamBuilder<K, V, T> {
    let stream_receivers = streams.map(|x| x.into_tail()).collect();
    let merged = merge_inputs(stream_receivers);
    StreamBuilder::new(merged, runtime)
}

/// Result of scheduling every operator once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StepOutcome {
    /// every operator reached a finished state
    pub(crate) finished: bool,
    /// at least one operator had messages waiting
    pub(crate) progressed: bool,
}

/// Signals which can be given to a running worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlSignal {
    Suspend,
}

/// How a worker stopped executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// All sources finished and every message was processed
    Finished,
    /// The job was closed before its sources finished
    Suspended,
}

/// A built worker executing a job
pub(crate) struct Worker {
    worker_id: WorkerId,
    operators: Vec<RunnableOperator>,
    root: Output<NoKey, NoData, NoTime>,
    idle_backoff: Duration,
}

impl Worker {
    pub(crate) fn step(&mut self) -> StepOutcome {
        let span = tracing::debug_span!("scheduling::run_graph", worker_id = self.worker_id);
        let _span_guard = span.enter();
        let mut outcome = StepOutcome {
            finished: true,
            progressed: false,
        };
        for op in self.operators.iter_mut().rev() {
            let span = span!(Level::DEBUG, "operator", operator_name = op.name());
            let _span_guard = span.enter();
            if op.is_suspended() {
                continue;
            }
            outcome.progressed |= op.has_queued_work();
            op.step();
            while op.has_queued_work() {
                op.step();
            }
            outcome.finished &= op.is_finalized();
        }
        outcome
    }

    /// Repeatedly schedule all operators until all have reached a finished state or a suspend
    /// signal is received.
    /// Note that depending on the specific operator implementations the job may never finish
    /// on its own.
    pub(crate) fn execute(
        &mut self,
        control: &flume::Receiver<ControlSignal>,
        mut on_running: impl FnMut(),
    ) -> ExecutionOutcome {
        let _span = span!(Level::INFO, "worker", worker_id = self.worker_id);
        let _span_guard = _span.enter();
        info!("Starting execution");
        on_running();
        loop {
            let outcome = self.step();
            if outcome.finished {
                info!("Finished execution");
                return ExecutionOutcome::Finished;
            }
            match control.try_recv() {
                Ok(ControlSignal::Suspend) | Err(flume::TryRecvError::Disconnected) => {
                    info!("Suspending execution");
                    self.suspend();
                    return ExecutionOutcome::Suspended;
                }
                Err(flume::TryRecvError::Empty) => (),
            }
            if !outcome.progressed {
                std::thread::sleep(self.idle_backoff);
            }
        }
    }

    /// Send a suspend marker through all streams and schedule operators until every one of them
    /// released it
    fn suspend(&mut self) {
        let suspend = SuspendMarker::default();
        self.root.send(Message::SuspendMarker(suspend.clone()));
        while suspend.strong_count() > 1 {
            if self.step().finished {
                break;
            }
        }
        debug!("All operators suspended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{Map, Sink, Source};
    use crate::sinks::{StatelessSink, VecSink};
    use crate::sources::{SingleIteratorSource, StatelessSource};

    /// check we can build the most basic worker
    #[test]
    fn builds_empty_worker() {
        let mut builder = WorkerBuilder::new();
        builder.new_stream();
        builder.build(0, Duration::ZERO).unwrap();
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut builder = WorkerBuilder::new();
        builder
            .new_stream()
            .source(
                "numbers",
                StatelessSource::new(SingleIteratorSource::new(0..3)),
            )
            .map("double", |x| x * 2)
            .map("double", |x| x * 2);
        let err = builder.build(0, Duration::ZERO).err().unwrap();
        assert!(matches!(err, WorkerExecutionError::NonUniqueName(name) if name == "double"));
    }

    #[test]
    fn rejects_unfinished_streams() {
        let mut builder = WorkerBuilder::new();
        let stream = builder.new_stream();
        let err = builder.build(0, Duration::ZERO).err().unwrap();
        assert!(matches!(err, WorkerExecutionError::UnfinishedStreams(1)));
        drop(stream);
    }

    #[test]
    fn suspends_on_disconnected_control() {
        let sink = VecSink::new();
        let mut builder = WorkerBuilder::new();
        builder
            .new_stream()
            .source(
                "numbers",
                StatelessSource::new(SingleIteratorSource::new(std::iter::repeat(1))),
            )
            .sink("sink", StatelessSink::new(sink.clone()));
        let mut worker = builder.build(0, Duration::ZERO).unwrap();
        let (tx, rx) = flume::unbounded();
        drop(tx);
        let outcome = worker.execute(&rx, || ());
        assert_eq!(outcome, ExecutionOutcome::Suspended);
    }
}
