//! Runnel is a framework for building stream processing jobs.
//!
//! Jobs are defined by chaining operators on a [stream::StreamBuilder] and executed by a
//! [runtime::SingleThreadRuntime]. The [embedded] module provides an in-process topic broker
//! with producer and consumer clients, so jobs reading and writing topics can be tested without
//! any external infrastructure.
pub mod channels;
pub mod embedded;
pub mod errorhandling;
pub mod operators;
pub mod runtime;
pub mod sinks;
pub mod sources;
pub mod stream;
pub mod testing;
pub mod types;
pub mod worker;
