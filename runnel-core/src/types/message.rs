//! Contains Runnel's message types.
//! Runnel communicates in between Operators exclusively via messages, which may contain
//! data or be control messages

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use super::Timestamp;

/// A message which gets processed in a stream.
/// Messages always include a timestamp and content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataMessage<K, V, T> {
    /// Key of this message, for source streams this is the source partition
    pub key: K,
    /// Payload
    pub value: V,
    /// Event time of this message
    pub timestamp: T,
}
impl<K, V, T> DataMessage<K, V, T> {
    /// Create a new data message
    pub fn new(key: K, value: V, timestamp: T) -> Self {
        Self {
            timestamp,
            key,
            value,
        }
    }
}

/// Content variants of a Runnel message.
/// Most messages will be of the data flavour, i.e. data to be processed,
/// however Runnel also uses its data channels to signal progress and shutdown.
#[derive(Debug)]
pub enum Message<K, V, T> {
    /// A record to be processed
    Data(DataMessage<K, V, T>),
    /// Progress marker, no message with a lower timestamp will follow
    Epoch(T),
    /// Information that this worker plans on shutting down.
    /// See struct docstring for more information
    SuspendMarker(SuspendMarker),
}

impl<K, V, T> From<DataMessage<K, V, T>> for Message<K, V, T> {
    fn from(value: DataMessage<K, V, T>) -> Self {
        Message::Data(value)
    }
}

impl<K, V, T> From<SuspendMarker> for Message<K, V, T> {
    fn from(value: SuspendMarker) -> Self {
        Message::SuspendMarker(value)
    }
}

impl<K, V, T> From<T> for Message<K, V, T>
where
    T: Timestamp,
{
    fn from(value: T) -> Self {
        Message::Epoch(value)
    }
}

impl<K, V, T> Clone for Message<K, V, T>
where
    K: Clone,
    V: Clone,
    T: Clone,
{
    fn clone(&self) -> Self {
        // for some reason this could not be derived
        match self {
            Self::Data(x) => Self::Data(x.clone()),
            Self::Epoch(x) => Self::Epoch(x.clone()),
            Self::SuspendMarker(x) => Self::SuspendMarker(x.clone()),
        }
    }
}

/// This marker will be sent by the worker when the job is closed before its sources finished.
/// Operators wishing to delay shut down, must hold onto this marker as long
/// as necessary
#[derive(Debug, Clone, Default)]
pub struct SuspendMarker {
    rc: Rc<()>,
}
impl SuspendMarker {
    /// Get the count of strong reference to the inner Rc
    /// Note that this includes the instance you are calling
    /// this method on.
    pub(crate) fn strong_count(&self) -> usize {
        Rc::strong_count(&self.rc)
    }
}
