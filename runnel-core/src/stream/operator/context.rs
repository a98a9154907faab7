//! Build and runtime contexts used by operators
use crate::types::{OperatorId, WorkerId};

/// This is a type injected to logic function at runtime
/// and contains context, which the logic generally can not change
/// but utilize
#[derive(Debug, Clone)]
pub struct OperatorContext<'a> {
    /// Worker executing the operator
    pub worker_id: WorkerId,
    /// Unique id of the operator, derived from its name
    pub operator_id: OperatorId,
    /// Human readable operator name
    pub operator_name: &'a str,
}

/// Context given to an operator when it is built on the worker
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Worker building the operator
    pub worker_id: WorkerId,
    /// Unique id of the operator, derived from its name
    pub operator_id: OperatorId,
    /// Human readable operator name
    pub operator_name: String,
}

impl BuildContext {
    pub(crate) fn new(worker_id: WorkerId, operator_id: OperatorId, name: String) -> Self {
        Self {
            worker_id,
            operator_id,
            operator_name: name,
        }
    }
}
