//! Memory store entities: scoped, TTL'd entries and versioned shared
//! contexts.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    ShortTerm,
    LongTerm,
    Shared,
    Workflow,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::ShortTerm => "short_term",
            MemoryType::LongTerm => "long_term",
            MemoryType::Shared => "shared",
            MemoryType::Workflow => "workflow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    Agent,
    Workflow,
    Global,
    User,
}

impl MemoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryScope::Agent => "agent",
            MemoryScope::Workflow => "workflow",
            MemoryScope::Global => "global",
            MemoryScope::User => "user",
        }
    }
}

/// A single stored memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub content: Value,
    pub memory_type: MemoryType,
    pub scope: MemoryScope,
    pub agent_id: Option<String>,
    pub workflow_id: Option<String>,
    pub user_id: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|e| now > e).unwrap_or(false)
    }
}

/// One entry in a [`SharedContext`]'s bounded modification history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationRecord {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<String>,
    pub new_version: u64,
}

/// A named, versioned map accessible by an allow-list of agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedContext {
    pub context_id: String,
    pub data: HashMap<String, Value>,
    /// Empty set means "all agents may access".
    pub access_agents: HashSet<String>,
    pub version: u64,
    pub last_modified: DateTime<Utc>,
    pub modification_history: Vec<ModificationRecord>,
}

impl SharedContext {
    pub const MAX_HISTORY: usize = 100;

    pub fn new(context_id: impl Into<String>, data: HashMap<String, Value>, access_agents: HashSet<String>) -> Self {
        Self {
            context_id: context_id.into(),
            data,
            access_agents,
            version: 1,
            last_modified: Utc::now(),
            modification_history: Vec::new(),
        }
    }

    pub fn can_access(&self, agent_id: &str) -> bool {
        self.access_agents.is_empty() || self.access_agents.contains(agent_id)
    }

    /// Merges `updates` into `data` (last-writer-wins per key), bumps the
    /// version, and appends one bounded history entry. Caller must already
    /// have checked [`SharedContext::can_access`].
    pub fn apply_update(&mut self, updates: HashMap<String, Value>, caller_agent: &str) {
        let changes: Vec<String> = updates.keys().cloned().collect();
        self.data.extend(updates);
        self.version += 1;
        self.last_modified = Utc::now();
        self.modification_history.push(ModificationRecord {
            agent_id: caller_agent.to_string(),
            timestamp: self.last_modified,
            changes,
            new_version: self.version,
        });
        if self.modification_history.len() > Self::MAX_HISTORY {
            let overflow = self.modification_history.len() - Self::MAX_HISTORY;
            self.modification_history.drain(0..overflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_check_honors_empty_allow_list() {
        let ctx = SharedContext::new("c1", HashMap::new(), HashSet::new());
        assert!(ctx.can_access("anyone"));
    }

    #[test]
    fn update_bumps_version_once_and_records_history() {
        let mut ctx = SharedContext::new(
            "c1",
            HashMap::new(),
            HashSet::from(["a1".to_string()]),
        );
        assert_eq!(ctx.version, 1);
        let mut updates = HashMap::new();
        updates.insert("k".to_string(), Value::from(2));
        ctx.apply_update(updates, "a1");
        assert_eq!(ctx.version, 2);
        assert_eq!(ctx.modification_history.len(), 1);
        assert_eq!(ctx.modification_history[0].new_version, 2);
    }

    #[test]
    fn history_is_bounded() {
        let mut ctx = SharedContext::new("c1", HashMap::new(), HashSet::new());
        for i in 0..(SharedContext::MAX_HISTORY + 10) {
            let mut updates = HashMap::new();
            updates.insert("k".to_string(), Value::from(i as i64));
            ctx.apply_update(updates, "a1");
        }
        assert_eq!(ctx.modification_history.len(), SharedContext::MAX_HISTORY);
    }
}
