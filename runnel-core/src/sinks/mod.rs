//! Sinks for writing data from a Runnel job
mod stateless;
mod vec_sink;
pub use stateless::{StatelessSink, StatelessSinkImpl};
pub use vec_sink::VecSink;
