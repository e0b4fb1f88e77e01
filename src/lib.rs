// Contract Crew - Rust Edition
// Multi-agent workflow orchestration core for real-estate contract processing

//! # Contract Crew
//!
//! Library root for the workflow orchestration core: a DAG task scheduler, a
//! model router across LLM providers, a scoped memory store, and a tool
//! registry, wired together so agent roles can process contract workflows.
//!
//! ## Core Components
//!
//! - [`models`]: domain types shared by every component (workflow
//!   definitions, task specs, executions, memory entries).
//! - [`memory`]: the scoped, TTL'd memory store and its durable peer trait.
//! - [`tools`]: the tool registry and built-in tool implementations.
//! - [`llm`]: the model router and provider adapters.
//! - [`agents`]: agent roles and the stateless agent runtime.
//! - [`orchestrator`]: workflow lifecycle, scheduling, and the worker pool.
//!
//! ## Rust Learning Notes:
//!
//! ### Module System
//! Each `pub mod` below pulls in a `mod.rs` (or single file) from the
//! matching directory.
//!
//! ### Re-exports
//! `pub use` statements create shortcuts so users don't need to know the
//! internal module structure. Instead of
//! `use contract_crew::models::workflow::WorkflowDefinition`, users can write
//! `use contract_crew::WorkflowDefinition`.

pub mod agents;
pub mod config;
pub mod llm;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod tools;

pub use config::Config;
pub use models::{
    AgentRole, ExecutionId, ExecutionStatus, MemoryEntry, MemoryScope, MemoryType, SharedContext,
    TaskId, TaskSpec, TaskState, TaskStatus, WorkflowDefinition, WorkflowExecution, WorkflowId,
};
pub use orchestrator::{Orchestrator, OrchestratorHandle};

use thiserror::Error;

/// Error taxonomy for the orchestration core.
///
/// ## Rust Learning Notes:
///
/// Rust has no exceptions; fallible operations return `Result<T, E>`. The
/// `thiserror` crate derives `std::error::Error` and a `Display` impl from
/// the `#[error("...")]` attributes below, and `#[from]` wires up automatic
/// `?`-conversion from the wrapped error types.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Malformed workflow definition: cycle, dangling dependency, unknown
    /// agent role, or unknown tool.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Execution, workflow, tool, or model lookup miss.
    #[error("not found: {0}")]
    NotFound(String),

    /// Pause/resume/cancel applied in an incompatible state.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// No model available, or the durable peer is unreachable beyond
    /// fallback.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Task failed at the provider or tool level.
    #[error("execution error: {0}")]
    Execution(String),

    /// Shared context access check failed.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// JSON serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for collaborator errors (durable peer client, HTTP client).
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<std::io::Error> for OrchestratorError {
    fn from(err: std::io::Error) -> Self {
        OrchestratorError::Internal(err.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
