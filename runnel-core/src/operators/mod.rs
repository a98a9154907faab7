//! Operators for performing various operations on data in a job
// public API operators
mod map;
mod map_values;
mod sink;
mod source;

// Public Api operators reexported for convenience
pub use map::Map;
pub use map_values::MapValues;
pub use sink::{Sink, StreamSink};
pub use source::{Source, StreamSource};
pub use stateless_op::{StatelessLogic, StatelessOp};

mod stateless_op;

// marker used to seal the traits implementing operators
// on StreamBuilder
mod sealed {
    use crate::stream::StreamBuilder;

    pub trait Sealed {}

    impl<K, V, T> Sealed for StreamBuilder<K, V, T> {}
}
