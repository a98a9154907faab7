//! Describing an operator before it is placed on a worker

use crate::{
    channels::operator_io::{Input, Output},
    types::{Data, MaybeKey, MaybeTime},
};

use super::{
    standard::StandardOperator, AppendableOperator, BuildContext, BuildableOperator,
    OperatorContext, RunnableOperator,
};

type LogicFactory<KI, VI, TI, KO, VO, TO> =
    Box<dyn FnOnce(&mut BuildContext) -> Box<dyn Logic<KI, VI, TI, KO, VO, TO>>>;

/// An operator which is not yet running. Its input is connected when it is appended to a
/// stream, its logic is created once the worker is built.
///
/// ```
/// use runnel::stream::OperatorBuilder;
/// use runnel::channels::operator_io::{Input, Output};
/// use runnel::types::{KeyValue, Message, NoKey, NoTime};
///
/// // drop every record without a key
/// let keyed_only = OperatorBuilder::direct(
///     "keyed-only",
///     |input: &mut Input<NoKey, KeyValue<String, String>, NoTime>,
///      output: &mut Output<NoKey, KeyValue<String, String>, NoTime>,
///      _ctx| {
///         match input.recv() {
///             Some(Message::Data(d)) if d.value.key.is_none() => (),
///             Some(msg) => output.send(msg),
///             None => (),
///         }
///     },
/// );
/// ```
pub struct OperatorBuilder<KI, VI, TI, KO, VO, TO> {
    name: String,
    id: u64,
    input: Input<KI, VI, TI>,
    output: Output<KO, VO, TO>,
    factory: LogicFactory<KI, VI, TI, KO, VO, TO>,
}

/// The logic of an operator. Called every time the operator is scheduled.
pub trait Logic<KI, VI, TI, KO, VO, TO>:
    FnMut(&mut Input<KI, VI, TI>, &mut Output<KO, VO, TO>, &mut OperatorContext) + 'static
{
}
impl<KI, VI, TI, KO, VO, TO, F> Logic<KI, VI, TI, KO, VO, TO> for F where
    F: FnMut(&mut Input<KI, VI, TI>, &mut Output<KO, VO, TO>, &mut OperatorContext) + 'static
{
}

impl<KI, VI, TI, KO, VO, TO> OperatorBuilder<KI, VI, TI, KO, VO, TO>
where
    KI: MaybeKey,
    VI: Data,
    TI: MaybeTime,
    KO: MaybeKey,
    VO: Data,
    TO: MaybeTime,
{
    /// Operator running the given logic as is
    pub fn direct<L: Logic<KI, VI, TI, KO, VO, TO>>(name: &str, logic: L) -> Self {
        Self::built_by(name, move |_| logic)
    }

    /// Operator whose logic is created on the worker. Use this if the logic needs
    /// the worker id or other build time information.
    pub fn built_by<L: Logic<KI, VI, TI, KO, VO, TO>>(
        name: &str,
        factory: impl FnOnce(&mut BuildContext) -> L + 'static,
    ) -> Self {
        Self {
            name: name.to_owned(),
            id: operator_id(name),
            input: Input::new_unlinked(),
            output: Output::new_unlinked(),
            factory: Box::new(move |ctx| Box::new(factory(ctx))),
        }
    }

    /// Replace the input of this operator with one receiving from an upstream operator
    pub(crate) fn connect_input(&mut self, input: Input<KI, VI, TI>) {
        self.input = input;
    }
}

impl<KI, VI, TI, KO, VO, TO> AppendableOperator<KO, VO, TO>
    for OperatorBuilder<KI, VI, TI, KO, VO, TO>
where
    KI: MaybeKey,
    VI: Data,
    TI: MaybeTime,
    KO: MaybeKey,
    VO: Data,
    TO: MaybeTime,
{
    fn output_mut(&mut self) -> &mut Output<KO, VO, TO> {
        &mut self.output
    }

    fn into_buildable(self: Box<Self>) -> Box<dyn BuildableOperator> {
        self
    }
}

impl<KI, VI, TI, KO, VO, TO> BuildableOperator for OperatorBuilder<KI, VI, TI, KO, VO, TO>
where
    KI: MaybeKey,
    VI: Data,
    TI: MaybeTime,
    KO: MaybeKey,
    VO: Data,
    TO: MaybeTime,
{
    fn into_runnable(self: Box<Self>, context: &mut BuildContext) -> RunnableOperator {
        let Self {
            input,
            output,
            factory,
            ..
        } = *self;
        let logic = factory(context);
        RunnableOperator::new(
            StandardOperator {
                input,
                logic,
                output,
            },
            context,
        )
    }

    fn get_name(&self) -> &str {
        &self.name
    }

    fn get_id(&self) -> u64 {
        self.id
    }
}

/// Operators are identified by a hash of their name, which must be unique per worker
fn operator_id(name: &str) -> u64 {
    seahash::hash(name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::operator_id;

    #[test]
    fn id_depends_only_on_name() {
        let name = format!("{}case", "upper");
        assert_eq!(operator_id("uppercase"), operator_id(&name));
        assert_ne!(operator_id("uppercase"), operator_id("lowercase"));
        assert_ne!(operator_id("uppercase"), operator_id("Uppercase"));
    }
}
