//! The agent runtime: executes one task on behalf of one role.
//!
//! Grounded on `engine/agents.rs`'s execution-contract shape (build context,
//! call provider, loop on tool calls) and on
//! `original_source/agent_orchestrator.py`'s per-role prompt construction.
//! The runtime is modeled as a trait — per the REDESIGN FLAGS note on
//! dynamic dispatch, a closed set of implementations rather than runtime
//! subclassing — so tests can substitute a canned [`MockAgentRuntime`]
//! instead of driving a real model router.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::role::role_config;
use crate::llm::{ChatMessage, ModelRequest, ModelRouter, TokenUsage};
use crate::models::{AgentRole, TaskSpec};
use crate::tools::{ToolInput, ToolRegistry};
use crate::Result;

/// Materialized context handed to a task: `execution.context` merged with
/// the task's own identity and input.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    pub workflow_id: String,
    pub agent_id: String,
    pub user_id: Option<String>,
    pub input_data: Value,
    pub execution_context: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub output: Value,
    pub model_used: Option<String>,
    pub tokens: Option<TokenUsage>,
    pub cost: Option<f64>,
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn execute_task(&self, task: &TaskSpec, context: &TaskContext) -> Result<TaskOutput>;
}

const MAX_TOOL_ITERATIONS: usize = 5;

/// Default runtime: builds a prompt from the role's backstory and the
/// task's description, calls the model router, and loops on tool-call
/// responses up to [`MAX_TOOL_ITERATIONS`].
pub struct LlmAgentRuntime {
    router: Arc<ModelRouter>,
    tools: Arc<ToolRegistry>,
    memory: Arc<crate::memory::MemoryStore>,
}

impl LlmAgentRuntime {
    pub fn new(router: Arc<ModelRouter>, tools: Arc<ToolRegistry>, memory: Arc<crate::memory::MemoryStore>) -> Self {
        Self { router, tools, memory }
    }

    fn build_prompt(&self, role: AgentRole, task: &TaskSpec) -> (String, String) {
        let cfg = role_config(role);
        let expected_output = task
            .expected_output
            .clone()
            .unwrap_or_else(|| "a concise, structured result".to_string());
        let system = format!("{}\n\nGoal: {}", cfg.backstory, cfg.goal);
        let user = format!(
            "Task: {}\nExpected output: {}\nInput: {}",
            task.description, expected_output, task.input_data
        );
        (system, user)
    }

    /// Providers don't hand back a structured tool-call field in this
    /// crate's `ModelResponse`; by convention a tool-call instruction is
    /// carried in `metadata["tool_call"]` as `{"name": ..., "arguments": {...}}`.
    /// Its absence means the model produced a final, non-tool-call answer.
    fn extract_tool_call(response: &crate::llm::ModelResponse) -> Option<(String, HashMap<String, Value>)> {
        let call = response.metadata.get("tool_call")?;
        let name = call.get("name")?.as_str()?.to_string();
        let arguments = call
            .get("arguments")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Some((name, arguments))
    }
}

#[async_trait]
impl AgentRuntime for LlmAgentRuntime {
    async fn execute_task(&self, task: &TaskSpec, context: &TaskContext) -> Result<TaskOutput> {
        let cfg = role_config(task.agent_role);
        let (system, user_prompt) = self.build_prompt(task.agent_role, task);
        let mut messages = vec![ChatMessage::user(user_prompt)];

        let mut last_model_used = None;
        let mut last_tokens = None;
        let mut last_cost = None;

        for _ in 0..MAX_TOOL_ITERATIONS {
            let request = ModelRequest {
                messages: messages.clone(),
                system_prompt: Some(system.clone()),
                ..Default::default()
            };
            let response = self.router.generate_response(request).await?;
            last_model_used = Some(response.model_used.clone());
            last_tokens = Some(response.token_usage);
            last_cost = Some(response.cost);

            match Self::extract_tool_call(&response) {
                Some((tool_name, arguments))
                    if cfg
                        .allowed_tools
                        .iter()
                        .any(|c| self.tools.get(&tool_name).map(|t| t.category() == *c).unwrap_or(false)) =>
                {
                    let tool_input = ToolInput {
                        agent_id: Some(context.agent_id.clone()),
                        workflow_id: Some(context.workflow_id.clone()),
                        user_id: context.user_id.clone(),
                        context: context.execution_context.clone(),
                        fields: arguments,
                    };
                    let result = self.tools.execute(&tool_name, tool_input, &self.memory).await;
                    messages.push(ChatMessage::assistant(response.content));
                    let tool_message = match result {
                        Some(r) => serde_json::to_string(&r).unwrap_or_default(),
                        None => format!("tool {tool_name} not found"),
                    };
                    messages.push(ChatMessage::tool(tool_message));
                }
                _ => {
                    return Ok(TaskOutput {
                        output: Value::from(response.content),
                        model_used: last_model_used,
                        tokens: last_tokens,
                        cost: last_cost,
                    });
                }
            }
        }

        Ok(TaskOutput {
            output: Value::from("max tool iterations reached"),
            model_used: last_model_used,
            tokens: last_tokens,
            cost: last_cost,
        })
    }
}

/// Canned runtime for tests and for scenarios (per spec §8) that drive the
/// orchestrator without a real model router.
pub struct MockAgentRuntime {
    pub responder: Box<dyn Fn(&TaskSpec) -> Value + Send + Sync>,
}

impl MockAgentRuntime {
    pub fn new(responder: impl Fn(&TaskSpec) -> Value + Send + Sync + 'static) -> Self {
        Self { responder: Box::new(responder) }
    }
}

#[async_trait]
impl AgentRuntime for MockAgentRuntime {
    async fn execute_task(&self, task: &TaskSpec, _context: &TaskContext) -> Result<TaskOutput> {
        Ok(TaskOutput {
            output: (self.responder)(task),
            model_used: None,
            tokens: None,
            cost: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TaskId};
    use std::collections::HashSet;

    fn task(id: &str) -> TaskSpec {
        TaskSpec {
            task_id: TaskId::from(id),
            agent_role: AgentRole::DataExtraction,
            task_type: "noop".into(),
            description: "do the thing".into(),
            input_data: Value::Null,
            dependencies: HashSet::new(),
            priority: Priority::Normal,
            timeout_seconds: None,
            max_retries: 3,
            expected_output: None,
        }
    }

    #[tokio::test]
    async fn mock_runtime_returns_canned_output_keyed_by_task_id() {
        let runtime = MockAgentRuntime::new(|t| Value::from(format!("ok-{}", t.task_id)));
        let context = TaskContext {
            task_id: "A".into(),
            workflow_id: "w1".into(),
            agent_id: "data_extraction".into(),
            user_id: None,
            input_data: Value::Null,
            execution_context: HashMap::new(),
        };
        let out = runtime.execute_task(&task("A"), &context).await.unwrap();
        assert_eq!(out.output, Value::from("ok-A"));
    }
}
