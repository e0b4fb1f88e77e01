//! Workflow executions: a single run of a definition with its own mutable
//! state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{ExecutionId, TaskId, WorkflowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Waiting,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

/// Per-task mutable state within an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub status: TaskStatus,
    pub retry_count: u32,
    pub assigned_worker: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            status: TaskStatus::Waiting,
            retry_count: 0,
            assigned_worker: None,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }
}

/// One append-only entry in an execution's log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub task_id: Option<TaskId>,
    pub worker: Option<String>,
    pub duration_ms: Option<i64>,
    pub detail: Option<String>,
}

impl LogEntry {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event: event.into(),
            task_id: None,
            worker: None,
            duration_ms: None,
            detail: None,
        }
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        self.assigned(worker);
        self
    }

    fn assigned(&mut self, worker: impl Into<String>) {
        self.worker = Some(worker.into());
    }

    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A run instance of a `WorkflowDefinition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub context: HashMap<String, Value>,
    pub task_states: HashMap<TaskId, TaskState>,
    pub execution_log: Vec<LogEntry>,
}

impl WorkflowExecution {
    pub fn new(execution_id: ExecutionId, workflow_id: WorkflowId, task_ids: impl IntoIterator<Item = TaskId>) -> Self {
        let task_states = task_ids.into_iter().map(|id| (id, TaskState::default())).collect();
        Self {
            execution_id,
            workflow_id,
            status: ExecutionStatus::Pending,
            progress: 0,
            started_at: None,
            completed_at: None,
            context: HashMap::new(),
            task_states,
            execution_log: Vec::new(),
        }
    }

    pub fn recompute_progress(&mut self) {
        let total = self.task_states.len().max(1);
        let completed = self
            .task_states
            .values()
            .filter(|s| s.status == TaskStatus::Completed)
            .count();
        self.progress = ((completed * 100) / total) as u8;
    }

    pub fn status_dto(&self) -> WorkflowStatusDto {
        let total_tasks = self.task_states.len();
        let completed_tasks = self
            .task_states
            .values()
            .filter(|s| s.status == TaskStatus::Completed)
            .count();
        let running_tasks = self
            .task_states
            .values()
            .filter(|s| s.status == TaskStatus::Running)
            .count();
        let failed_tasks = self
            .task_states
            .values()
            .filter(|s| s.status == TaskStatus::Failed)
            .count();

        WorkflowStatusDto {
            status: self.status,
            progress: self.progress,
            started_at: self.started_at,
            completed_at: self.completed_at,
            total_tasks,
            completed_tasks,
            running_tasks,
            failed_tasks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStatusDto {
    pub status: ExecutionStatus,
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub running_tasks: usize,
    pub failed_tasks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_percent_completed() {
        let mut exec = WorkflowExecution::new(
            ExecutionId::new(),
            WorkflowId::from("w1"),
            vec![TaskId::from("A"), TaskId::from("B")],
        );
        exec.task_states.get_mut(&TaskId::from("A")).unwrap().status = TaskStatus::Completed;
        exec.recompute_progress();
        assert_eq!(exec.progress, 50);
    }
}
