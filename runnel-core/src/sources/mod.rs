//! Sources bring data into a Runnel job
mod single_iterator;
mod stateless;

pub use single_iterator::SingleIteratorSource;
pub use stateless::{StatelessSource, StatelessSourceImpl, StatelessSourcePartition};
