//! Channels connecting operators on the same worker
pub mod operator_io;
mod spsc;
