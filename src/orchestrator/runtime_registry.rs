//! Maps an agent role to the [`AgentRuntime`] that executes its tasks.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agents::AgentRuntime;
use crate::models::AgentRole;

/// A default runtime serves every role with no explicit override; tests
/// substitute a `MockAgentRuntime` for one role via [`with_override`] while
/// the rest keep running against the real model router.
///
/// [`with_override`]: RuntimeRegistry::with_override
pub struct RuntimeRegistry {
    default: Arc<dyn AgentRuntime>,
    overrides: HashMap<AgentRole, Arc<dyn AgentRuntime>>,
}

impl RuntimeRegistry {
    pub fn new(default: Arc<dyn AgentRuntime>) -> Self {
        Self { default, overrides: HashMap::new() }
    }

    pub fn with_override(mut self, role: AgentRole, runtime: Arc<dyn AgentRuntime>) -> Self {
        self.overrides.insert(role, runtime);
        self
    }

    pub fn for_role(&self, role: AgentRole) -> Arc<dyn AgentRuntime> {
        self.overrides.get(&role).cloned().unwrap_or_else(|| self.default.clone())
    }
}
