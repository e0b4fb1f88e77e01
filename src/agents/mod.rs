//! Agent Runtime (L4): per-role configuration and the stateless task
//! execution contract built on the model router, tool registry, and memory
//! store.

pub mod role;
pub mod runtime;

pub use role::{role_config, RoleConfig};
pub use runtime::{AgentRuntime, LlmAgentRuntime, MockAgentRuntime, TaskContext, TaskOutput};
