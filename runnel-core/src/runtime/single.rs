use std::{sync::Arc, time::Duration};

use bon::Builder;
use thiserror::Error;
use tracing::{error, info};

use super::handle::{PanicGuard, RuntimeHandle, RuntimeState, SharedState};
use crate::worker::{
    ControlSignal, ExecutionOutcome, StreamProvider, WorkerBuilder, WorkerExecutionError,
};

/// Runs all dataflows in a single thread on a
/// single machine with no parallelism.
///
/// # Example
/// ```rust
/// use runnel::operators::*;
/// use runnel::runtime::SingleThreadRuntime;
/// use runnel::sources::{SingleIteratorSource, StatelessSource};
/// use runnel::worker::StreamProvider;
/// use runnel::sinks::{StatelessSink, VecSink};
///
/// let sink = VecSink::new();
/// let sink_clone = sink.clone();
/// SingleThreadRuntime::builder()
///     .build(move |provider: &mut dyn StreamProvider| {
///         provider.new_stream()
///         .source("numbers", StatelessSource::new(SingleIteratorSource::new(0..10)))
///         .map("double", |x| x * 2)
///         .sink("collect", StatelessSink::new(sink_clone.clone()));
///     })
///     .execute()
///     .unwrap();
/// assert_eq!(sink.len(), 10);
/// ```
#[derive(Builder)]
pub struct SingleThreadRuntime<F> {
    #[builder(finish_fn)]
    build: F,
    /// Time the worker sleeps when no operator had any work to do
    #[builder(default = Duration::from_millis(1))]
    idle_backoff: Duration,
    /// Name of the thread spawned by [SingleThreadRuntime::spawn]
    #[builder(into, default = String::from("runnel"))]
    name: String,
}

impl<F> SingleThreadRuntime<F>
where
    F: FnMut(&mut dyn StreamProvider),
{
    /// Execute the job on the current thread, blocking until all sources are finished.
    ///
    /// Returns an error if building the worker fails.
    pub fn execute(mut self) -> Result<(), ExecutionError> {
        let mut worker = WorkerBuilder::new();
        (self.build)(&mut worker);
        let mut worker = worker.build(0, self.idle_backoff)?;

        // the sender is kept alive so the worker is never told to suspend
        let (_control_tx, control_rx) = flume::unbounded::<ControlSignal>();
        worker.execute(&control_rx, || ());
        Ok(())
    }
}

impl<F> SingleThreadRuntime<F>
where
    F: FnMut(&mut dyn StreamProvider) + Send + 'static,
{
    /// Start the job on a newly spawned thread and return a handle to observe and stop it.
    ///
    /// Dropping the returned handle suspends the job.
    pub fn spawn(self) -> Result<RuntimeHandle, ExecutionError> {
        let SingleThreadRuntime {
            mut build,
            idle_backoff,
            name,
        } = self;
        let (control_tx, control_rx) = flume::unbounded();
        let shared = Arc::new(SharedState::new());
        let thread_shared = Arc::clone(&shared);

        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = PanicGuard::new(&thread_shared);
                let mut worker = WorkerBuilder::new();
                build(&mut worker);
                let mut worker = match worker.build(0, idle_backoff) {
                    Ok(w) => w,
                    Err(e) => {
                        error!(error = %e, "Failed to build worker");
                        thread_shared.set(RuntimeState::Failed);
                        return Err(ExecutionError::Worker(e));
                    }
                };
                let outcome =
                    worker.execute(&control_rx, || thread_shared.set(RuntimeState::Running));
                thread_shared.set(match outcome {
                    ExecutionOutcome::Finished => RuntimeState::Finished,
                    ExecutionOutcome::Suspended => RuntimeState::Suspended,
                });
                Ok(outcome)
            })
            .map_err(ExecutionError::Spawn)?;
        info!(runtime = %name, "Spawned runtime thread");
        Ok(RuntimeHandle::new(control_tx, shared, thread))
    }
}

/// Errors which can occur when starting a runtime
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The worker could not be built from the given streams
    #[error("Error building worker")]
    Worker(#[from] WorkerExecutionError),
    /// The OS refused to spawn the runtime thread
    #[error("Error spawning runtime thread")]
    Spawn(#[source] std::io::Error),
}
