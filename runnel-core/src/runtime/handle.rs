//! Handle to observe and stop a job running on its own thread
use std::{
    any::Any,
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread::JoinHandle,
    time::Duration,
};

use thiserror::Error;
use tracing::{debug, info};

use super::ExecutionError;
use crate::worker::{ControlSignal, ExecutionOutcome};

/// Lifecycle of a spawned job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// The thread was spawned but the worker is not yet executing
    Created,
    /// The worker is built and scheduling operators
    Running,
    /// All sources finished and every record was processed
    Finished,
    /// The job was closed before its sources finished
    Suspended,
    /// Building or executing the worker failed
    Failed,
}

impl RuntimeState {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            RuntimeState::Finished | RuntimeState::Suspended | RuntimeState::Failed
        )
    }
}

/// State shared between a [RuntimeHandle] and the thread executing the job
#[derive(Debug)]
pub(crate) struct SharedState {
    state: Mutex<RuntimeState>,
    changed: Condvar,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RuntimeState::Created),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn set(&self, state: RuntimeState) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = ?*guard, to = ?state, "Runtime state changed");
        *guard = state;
        self.changed.notify_all();
    }

    fn get(&self) -> RuntimeState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block while the condition holds or until the timeout elapsed.
    /// Returns the state observed last and whether the wait timed out.
    fn wait_while(
        &self,
        timeout: Duration,
        mut condition: impl FnMut(&RuntimeState) -> bool,
    ) -> (RuntimeState, bool) {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, result) = self
            .changed
            .wait_timeout_while(guard, timeout, |state| condition(state))
            .unwrap_or_else(PoisonError::into_inner);
        (*guard, result.timed_out())
    }
}

/// Marks the job as failed if the thread holding this guard panics
pub(crate) struct PanicGuard<'a>(&'a SharedState);

impl<'a> PanicGuard<'a> {
    pub(crate) fn new(shared: &'a SharedState) -> Self {
        Self(shared)
    }
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.set(RuntimeState::Failed);
        }
    }
}

/// A handle to a job executing on a separate thread.
///
/// Dropping the handle disconnects it from the job, which makes the job suspend at the next
/// opportunity.
pub struct RuntimeHandle {
    control: flume::Sender<ControlSignal>,
    shared: Arc<SharedState>,
    thread: JoinHandle<Result<ExecutionOutcome, ExecutionError>>,
}

impl RuntimeHandle {
    pub(crate) fn new(
        control: flume::Sender<ControlSignal>,
        shared: Arc<SharedState>,
        thread: JoinHandle<Result<ExecutionOutcome, ExecutionError>>,
    ) -> Self {
        Self {
            control,
            shared,
            thread,
        }
    }

    /// Current lifecycle state of the job
    pub fn state(&self) -> RuntimeState {
        self.shared.get()
    }

    /// Block until the job is running, meaning all operators are built and the sources
    /// started reading.
    ///
    /// Also returns `Ok` if the job already finished. Returns an error if the job failed or did
    /// not start within the timeout.
    pub fn await_running(&self, timeout: Duration) -> Result<(), HandleError> {
        let (state, timed_out) = self
            .shared
            .wait_while(timeout, |state| *state == RuntimeState::Created);
        match state {
            RuntimeState::Failed => Err(HandleError::Failed),
            RuntimeState::Created if timed_out => Err(HandleError::Timeout(timeout)),
            _ => Ok(()),
        }
    }

    /// Ask the job to suspend and wait for it to stop.
    ///
    /// Sources and sinks are suspended in order, so every record read before closing has
    /// passed the whole stream once this returns.
    pub fn close(self, timeout: Duration) -> Result<ExecutionOutcome, HandleError> {
        info!("Closing runtime");
        // the job may already have stopped and dropped its receiver
        let _ = self.control.send(ControlSignal::Suspend);
        let (_, timed_out) = self
            .shared
            .wait_while(timeout, |state| !state.is_terminal());
        if timed_out {
            return Err(HandleError::Timeout(timeout));
        }
        self.join()
    }

    /// Wait for the job to stop on its own, which happens once all its sources are finished.
    pub fn join(self) -> Result<ExecutionOutcome, HandleError> {
        match self.thread.join() {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(HandleError::Execution(e)),
            Err(panic) => Err(HandleError::WorkerPanic(panic_message(panic))),
        }
    }
}

/// Errors returned when controlling a spawned job
#[derive(Debug, Error)]
pub enum HandleError {
    /// The job did not reach the desired state in time
    #[error("Runtime did not respond within {0:?}")]
    Timeout(Duration),
    /// The job failed, close or join the handle to retrieve the cause
    #[error("Runtime failed")]
    Failed,
    /// The worker could not be built
    #[error("Runtime execution failed")]
    Execution(#[source] ExecutionError),
    /// The thread executing the job panicked
    #[error("Runtime thread panicked: {0}")]
    WorkerPanic(String),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(msg) => msg.to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}
