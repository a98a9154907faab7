//! A series of traits which operators implement
//! These traits essentially exist to perform successive type erasure
//! AppendableOperator -> BuildableOperator -> Operator

use crate::channels::operator_io::Output;

use super::{BuildContext, OperatorContext, RunnableOperator};

/// An Operator which can have output added.
/// This trait exists mainly for type erasure, so that the stream builder
/// need not know the input type of its last operator
pub(crate) trait AppendableOperator<K, V, T> {
    fn output_mut(&mut self) -> &mut Output<K, V, T>;

    fn into_buildable(self: Box<Self>) -> Box<dyn BuildableOperator>;
}

/// An operator which can be turned into a runnable operator, by supplying a BuildContext
pub(crate) trait BuildableOperator {
    fn into_runnable(self: Box<Self>, context: &mut BuildContext) -> RunnableOperator;

    fn get_name(&self) -> &str;

    fn get_id(&self) -> u64;
}

/// Each runnable operator contains an object of this trait which is the actual logic that will get executed
pub(crate) trait Operator {
    /// Calling step instructs the operator, that it should attempt to make
    /// progress, i.e. read its input and write to its output
    fn step(&mut self, context: &mut OperatorContext);

    /// True if there are messages waiting in the operator's input
    fn has_queued_work(&self) -> bool;

    /// Indicate to the worker this operator need not run again
    /// The worker will stop execution once all operators are finished
    fn is_finalized(&self) -> bool;

    /// True once the operator forwarded a suspend marker
    fn is_suspended(&self) -> bool;
}
