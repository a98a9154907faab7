//! Runtimes determine where Runnel jobs are executed. A runtime builds the worker from the
//! user's stream definition and drives it, either on the calling thread or on a thread of its own.
mod handle;
mod single;

pub use handle::{HandleError, RuntimeHandle, RuntimeState};
pub use single::{ExecutionError, SingleThreadRuntime};
