//! Operators go through a small lifecycle:
//! [OperatorBuilder] -> [BuildableOperator] -> [RunnableOperator].
//! Each step erases more of the operator's type so the worker can schedule all of them alike.
mod builder;
mod context;
mod runnable;
mod standard;
mod traits;

pub use builder::{Logic, OperatorBuilder};
pub use context::{BuildContext, OperatorContext};
pub(crate) use runnable::RunnableOperator;
pub(crate) use traits::{AppendableOperator, BuildableOperator};
