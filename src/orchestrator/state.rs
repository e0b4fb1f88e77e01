//! Per-execution state: the immutable template it was instantiated from,
//! paired with its mutable, lock-guarded [`WorkflowExecution`].

use tokio::sync::Mutex;

use crate::models::{ExecutionId, TaskId, WorkflowDefinition, WorkflowExecution};

/// One entry in the ready queue. Cheap to clone; the channel carries values,
/// not references, so workers never hold a borrow across a suspension point.
#[derive(Debug, Clone)]
pub struct ReadyTask {
    pub execution_id: ExecutionId,
    pub task_id: TaskId,
}

pub struct ExecutionRecord {
    pub definition: WorkflowDefinition,
    pub state: Mutex<WorkflowExecution>,
}
