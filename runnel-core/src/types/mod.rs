//! Types and traits used across Runnel
mod data;
mod key;
mod key_value;
mod message;
mod time;

pub use data::{Data, MaybeData, NoData};
pub use key::{Key, MaybeKey, NoKey};
pub use key_value::KeyValue;
pub use message::{DataMessage, Message, SuspendMarker};
pub use time::{MaybeTime, NoTime, Timestamp};

/// Uniquely identifies an operator within a job
pub type OperatorId = u64;

/// Uniquely identifies a worker executing a job
pub type WorkerId = u64;
