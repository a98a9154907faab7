use crate::types::{OperatorId, WorkerId};

use super::{traits::Operator, BuildContext, OperatorContext};

/// A fully built operator, ready to be scheduled by the worker
pub(crate) struct RunnableOperator {
    worker_id: WorkerId,
    operator_id: OperatorId,
    operator: Box<dyn Operator>,
    name: String,
}

impl RunnableOperator {
    pub(crate) fn new(operator: impl Operator + 'static, context: &BuildContext) -> Self {
        RunnableOperator {
            worker_id: context.worker_id,
            operator_id: context.operator_id,
            operator: Box::new(operator),
            name: context.operator_name.clone(),
        }
    }

    pub(crate) fn step(&mut self) {
        let mut context = OperatorContext {
            worker_id: self.worker_id,
            operator_id: self.operator_id,
            operator_name: &self.name,
        };
        self.operator.step(&mut context)
    }

    pub(crate) fn has_queued_work(&self) -> bool {
        self.operator.has_queued_work()
    }

    /// check if this operator will ever emit a message again
    pub(crate) fn is_finalized(&self) -> bool {
        self.operator.is_finalized()
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.operator.is_suspended()
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}
