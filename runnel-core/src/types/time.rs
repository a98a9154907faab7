//! Types and traits specific to time-keeping and timestamped streams.

use serde::{Deserialize, Serialize};

/// Trait implemented by all types usable as timestamps in Runnel
pub trait Timestamp: PartialOrd + Ord + Clone + std::fmt::Debug + 'static {
    /// Maximum or final value of this type. A stream which reached this timestamp is finished.
    const MAX: Self;
    /// Minimum value of this type.
    const MIN: Self;

    /// Merges two timestamps. Merging aligns timestamps coming from multiple upstreams
    /// and yields the lowest common timestamp of the two values.
    fn merge(&self, other: &Self) -> Self;
}

/// Zero sized marker indicating a stream with no timestamps associated.
///
/// Operators emitting `NoTime` can not advance the computation. If all timestamped operators
/// in a job are finished, a `NoTime` emitting operator will not keep the job running.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoTime;

impl PartialOrd for NoTime {
    fn partial_cmp(&self, _other: &Self) -> Option<std::cmp::Ordering> {
        None
    }
}

/// Time where the timestamp may not yet have been set
pub trait MaybeTime: std::fmt::Debug + Clone + PartialOrd + 'static {
    /// Try to merge two times, returning Some if the
    /// specific type implementing this trait implements
    /// Timestamp and None if it does not
    fn try_merge(&self, other: &Self) -> Option<Self>;

    /// Check if an optional timestamp is equal to the max timestamp.
    /// `NoTime` is always considered finished.
    const CHECK_FINISHED: fn(&Option<Self>) -> bool;
}
impl<T> MaybeTime for T
where
    T: Timestamp,
{
    fn try_merge(&self, other: &Self) -> Option<Self> {
        Some(self.merge(other))
    }

    const CHECK_FINISHED: fn(&Option<Self>) -> bool =
        |opt_t| opt_t.as_ref().is_some_and(|t| *t == T::MAX);
}
impl MaybeTime for NoTime {
    fn try_merge(&self, _other: &Self) -> Option<Self> {
        Some(NoTime)
    }

    const CHECK_FINISHED: fn(&Option<Self>) -> bool = |_| true;
}

/// Implements `Timestamp` for numeric types
macro_rules! timestamp_impl {
    ($t:ty) => {
        impl Timestamp for $t {
            const MAX: $t = <$t>::MAX;
            const MIN: $t = <$t>::MIN;

            fn merge(&self, other: &$t) -> $t {
                *self.min(other)
            }
        }
    };
}

timestamp_impl!(usize);
timestamp_impl!(u8);
timestamp_impl!(u16);
timestamp_impl!(u32);
timestamp_impl!(u64);
timestamp_impl!(u128);

timestamp_impl!(isize);
timestamp_impl!(i8);
timestamp_impl!(i16);
timestamp_impl!(i32);
timestamp_impl!(i64);
timestamp_impl!(i128);
