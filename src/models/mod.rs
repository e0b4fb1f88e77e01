//! Domain models shared by every component of the orchestration core.
//!
//! ## Rust Learning Notes:
//!
//! Each submodule owns one cluster of related types; this file just
//! declares them and re-exports the types other modules actually import, so
//! callers can write `contract_crew::models::TaskSpec` instead of
//! `contract_crew::models::workflow::TaskSpec`.

pub mod execution;
pub mod ids;
pub mod memory;
pub mod role;
pub mod workflow;

pub use execution::{ExecutionStatus, LogEntry, TaskState, TaskStatus, WorkflowExecution, WorkflowStatusDto};
pub use ids::{ExecutionId, TaskId, WorkflowId};
pub use memory::{MemoryEntry, MemoryScope, MemoryType, ModificationRecord, SharedContext};
pub use role::AgentRole;
pub use workflow::{Priority, TaskSpec, WorkflowDefinition};
