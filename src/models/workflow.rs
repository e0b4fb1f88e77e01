//! Workflow definitions: the immutable DAG template.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{TaskId, WorkflowId};
use super::role::AgentRole;
use crate::{OrchestratorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// One node of the DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: TaskId,
    pub agent_role: AgentRole,
    pub task_type: String,
    pub description: String,
    /// Opaque structured input; the orchestrator never inspects it.
    pub input_data: Value,
    pub dependencies: HashSet<TaskId>,
    #[serde(default)]
    pub priority: Priority,
    pub timeout_seconds: Option<u64>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Hint passed to the agent runtime's prompt builder; absent means the
    /// role falls back to its own default.
    #[serde(default)]
    pub expected_output: Option<String>,
}

fn default_max_retries() -> u32 {
    3
}

impl TaskSpec {
    pub fn new(task_id: impl Into<TaskId>, agent_role: AgentRole, task_type: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            agent_role,
            task_type: task_type.into(),
            description: String::new(),
            input_data: Value::Null,
            dependencies: HashSet::new(),
            priority: Priority::default(),
            timeout_seconds: None,
            max_retries: default_max_retries(),
            expected_output: None,
        }
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(deps);
        self
    }
}

/// Template describing a DAG of tasks. Immutable after registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub workflow_id: WorkflowId,
    pub name: String,
    pub description: String,
    pub tasks: Vec<TaskSpec>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(workflow_id: impl Into<WorkflowId>, name: impl Into<String>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            name: name.into(),
            description: String::new(),
            tasks,
            created_at: Utc::now(),
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| &t.task_id == id)
    }

    /// Rejects definitions whose dependency graph contains cycles or
    /// dangling references.
    ///
    /// Grounded on the teacher's `WorkflowDefinition::validate` (HashSet
    /// membership checks) and `find_unreachable_states` (DFS), generalized
    /// from Petri-net place reachability to DAG cycle detection via a
    /// standard white/gray/black DFS.
    pub fn validate(&self) -> Result<()> {
        let known: HashSet<&TaskId> = self.tasks.iter().map(|t| &t.task_id).collect();

        for task in &self.tasks {
            for dep in &task.dependencies {
                if !known.contains(dep) {
                    return Err(OrchestratorError::Validation(format!(
                        "task {} depends on unknown task {}",
                        task.task_id, dep
                    )));
                }
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let by_id: HashMap<&TaskId, &TaskSpec> = self.tasks.iter().map(|t| (&t.task_id, t)).collect();
        let mut marks: HashMap<&TaskId, Mark> =
            self.tasks.iter().map(|t| (&t.task_id, Mark::Unvisited)).collect();

        fn visit<'a>(
            id: &'a TaskId,
            by_id: &HashMap<&'a TaskId, &'a TaskSpec>,
            marks: &mut HashMap<&'a TaskId, Mark>,
        ) -> Result<()> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::InProgress) => {
                    return Err(OrchestratorError::Validation(format!(
                        "dependency cycle detected at task {}",
                        id
                    )))
                }
                _ => {}
            }
            marks.insert(id, Mark::InProgress);
            if let Some(task) = by_id.get(id) {
                for dep in &task.dependencies {
                    visit(dep, by_id, marks)?;
                }
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        for task in &self.tasks {
            visit(&task.task_id, &by_id, &mut marks)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, deps: &[&str]) -> TaskSpec {
        TaskSpec::new(id, AgentRole::DataExtraction, "noop")
            .depends_on(deps.iter().map(|d| TaskId::from(*d)))
    }

    #[test]
    fn accepts_linear_dag() {
        let def = WorkflowDefinition::new(
            "w1",
            "linear",
            vec![spec("A", &[]), spec("B", &["A"]), spec("C", &["B"])],
        );
        assert!(def.validate().is_ok());
    }

    #[test]
    fn rejects_self_cycle() {
        let def = WorkflowDefinition::new("w1", "self-cycle", vec![spec("A", &["A"])]);
        assert!(matches!(def.validate(), Err(OrchestratorError::Validation(_))));
    }

    #[test]
    fn rejects_longer_cycle() {
        let def = WorkflowDefinition::new(
            "w1",
            "cycle",
            vec![spec("A", &["B"]), spec("B", &["A"])],
        );
        assert!(def.validate().is_err());
    }

    #[test]
    fn rejects_dangling_dependency() {
        let def = WorkflowDefinition::new("w1", "dangling", vec![spec("A", &["ghost"])]);
        assert!(def.validate().is_err());
    }
}
