//! The memory store: scoped, TTL'd storage for inter-task state.
//!
//! Grounded on the teacher's `InMemoryStorage` (`engine/storage.rs`) for the
//! concurrent-map-backed repository shape, and on
//! `original_source/agent_memory.py`'s `AgentMemoryManager` for the
//! store/retrieve/search/shared-context/workflow-state operation set and
//! default TTL table.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::events::{EventBus, EventCallback};
use super::peer::{DurablePeer, InProcessPeer};
use crate::config::Config;
use crate::models::{MemoryEntry, MemoryScope, MemoryType, SharedContext};
use crate::{OrchestratorError, Result};

fn entry_key(memory_type: MemoryType, scope: MemoryScope, identifier: &str) -> String {
    format!("agent_memory:{}:{}:{}", memory_type.as_str(), scope.as_str(), identifier)
}

fn shared_context_key(context_id: &str) -> String {
    format!("shared_context_{context_id}")
}

fn workflow_state_key(execution_id: &str) -> String {
    format!("workflow_state_{execution_id}")
}

#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub agent_id: Option<String>,
    pub workflow_id: Option<String>,
    pub user_id: Option<String>,
    pub tags: Vec<String>,
    pub ttl: Option<ChronoDuration>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub memory_type: Option<MemoryType>,
    pub scope: Option<MemoryScope>,
    pub agent_id: Option<String>,
    pub workflow_id: Option<String>,
    pub user_id: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub by_type: HashMap<String, usize>,
    pub by_scope: HashMap<String, usize>,
    pub total: usize,
    pub durable_connected: bool,
}

struct WorkflowStateEntry {
    value: Value,
    version: u64,
}

pub struct MemoryStore {
    cache: DashMap<String, MemoryEntry>,
    shared_contexts: DashMap<String, SharedContext>,
    workflow_states: DashMap<String, WorkflowStateEntry>,
    peer: Option<Arc<dyn DurablePeer>>,
    durable_connected: RwLock<bool>,
    events: EventBus,
    short_term_ttl: ChronoDuration,
    workflow_ttl: ChronoDuration,
    shared_ttl: ChronoDuration,
    long_term_ttl: ChronoDuration,
}

impl MemoryStore {
    pub fn new(config: &Config, peer: Option<Arc<dyn DurablePeer>>) -> Self {
        let durable_connected = peer.is_some();
        Self {
            cache: DashMap::new(),
            shared_contexts: DashMap::new(),
            workflow_states: DashMap::new(),
            peer,
            durable_connected: RwLock::new(durable_connected),
            events: EventBus::new(),
            short_term_ttl: ChronoDuration::seconds(config.memory_short_term_ttl_seconds),
            workflow_ttl: ChronoDuration::seconds(config.memory_workflow_ttl_seconds),
            shared_ttl: ChronoDuration::seconds(config.memory_shared_ttl_seconds),
            long_term_ttl: ChronoDuration::seconds(config.memory_long_term_ttl_seconds),
        }
    }

    /// Convenience constructor for tests and single-process deployments
    /// that don't configure a durable peer: falls back to an in-process
    /// stand-in, matching the spec's "degrades to in-memory-only" behavior.
    pub fn in_process(config: &Config) -> Self {
        Self::new(config, Some(Arc::new(InProcessPeer::new())))
    }

    fn default_ttl(&self, memory_type: MemoryType) -> ChronoDuration {
        match memory_type {
            MemoryType::ShortTerm => self.short_term_ttl,
            MemoryType::Workflow => self.workflow_ttl,
            MemoryType::Shared => self.shared_ttl,
            MemoryType::LongTerm => self.long_term_ttl,
        }
    }

    pub async fn add_event_listener(&self, event_type: impl Into<String>, callback: EventCallback) {
        self.events.add_listener(event_type, callback).await;
    }

    /// Idempotent on `(type, scope, identifier)`: a second call replaces the
    /// first.
    pub async fn store(
        &self,
        content: Value,
        memory_type: MemoryType,
        scope: MemoryScope,
        identifier: &str,
        opts: StoreOptions,
    ) -> Result<Uuid> {
        let now = Utc::now();
        let ttl = opts.ttl.unwrap_or_else(|| self.default_ttl(memory_type));
        let entry = MemoryEntry {
            id: Uuid::new_v4(),
            content,
            memory_type,
            scope,
            agent_id: opts.agent_id,
            workflow_id: opts.workflow_id,
            user_id: opts.user_id,
            tags: opts.tags,
            created_at: now,
            expires_at: Some(now + ttl),
            access_count: 0,
            last_accessed: now,
        };
        let key = entry_key(memory_type, scope, identifier);
        let id = entry.id;

        let serialized = serde_json::to_vec(&entry)?;
        self.cache.insert(key.clone(), entry);

        if let Some(peer) = &self.peer {
            match peer.setex(&key, ttl.num_seconds().max(1), serialized).await {
                Ok(()) => {
                    *self.durable_connected.write().await = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, key, "durable peer write failed, continuing in-memory-only");
                    *self.durable_connected.write().await = false;
                }
            }
        }

        tracing::debug!(key, "memory entry stored");
        Ok(id)
    }

    /// Returns the entry if present and unexpired; deletes and returns
    /// `None` on expiry detection. Increments `access_count`. On a cache
    /// miss, falls back to the durable peer and rehydrates the cache from
    /// it — this is the read-side counterpart of `store`'s write-through,
    /// and is what lets entries survive a process restart.
    pub async fn retrieve(&self, memory_type: MemoryType, scope: MemoryScope, identifier: &str) -> Option<MemoryEntry> {
        let key = entry_key(memory_type, scope, identifier);
        let now = Utc::now();

        if !self.cache.contains_key(&key) {
            if let Some(entry) = self.fetch_from_peer(&key).await {
                if entry.is_expired_at(now) {
                    return None;
                }
                self.cache.insert(key.clone(), entry);
            }
        }

        let expired = self.cache.get(&key).map(|e| e.is_expired_at(now)).unwrap_or(false);
        if expired {
            self.cache.remove(&key);
            tracing::debug!(key, "memory entry expired on read");
            return None;
        }

        self.cache.get_mut(&key).map(|mut e| {
            e.access_count += 1;
            e.last_accessed = now;
            e.value().clone()
        })
    }

    /// Most-recently-created entries matching all present criteria and
    /// intersecting `tags` if supplied. Rehydrates the cache from the
    /// durable peer first so a fresh process (empty cache) still searches
    /// over previously-stored entries.
    pub async fn search(&self, criteria: SearchCriteria, limit: usize) -> Vec<MemoryEntry> {
        self.rehydrate_from_peer().await;

        let now = Utc::now();
        let mut matches: Vec<MemoryEntry> = self
            .cache
            .iter()
            .filter(|e| !e.is_expired_at(now))
            .filter(|e| criteria.memory_type.map(|t| t == e.memory_type).unwrap_or(true))
            .filter(|e| criteria.scope.map(|s| s == e.scope).unwrap_or(true))
            .filter(|e| criteria.agent_id.as_deref().map(|a| e.agent_id.as_deref() == Some(a)).unwrap_or(true))
            .filter(|e| criteria.workflow_id.as_deref().map(|w| e.workflow_id.as_deref() == Some(w)).unwrap_or(true))
            .filter(|e| criteria.user_id.as_deref().map(|u| e.user_id.as_deref() == Some(u)).unwrap_or(true))
            .filter(|e| criteria.tags.is_empty() || criteria.tags.iter().any(|t| e.tags.contains(t)))
            .map(|e| e.value().clone())
            .collect();

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches.truncate(limit);
        matches
    }

    async fn fetch_from_peer(&self, key: &str) -> Option<MemoryEntry> {
        let peer = self.peer.as_ref()?;
        match peer.get(key).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, key, "durable peer read failed");
                None
            }
        }
    }

    /// Pulls every `agent_memory:*` key the cache doesn't already hold in
    /// from the peer. Called before a `search`, since a cache miss on one
    /// key (as `retrieve` handles) doesn't help a query over the whole set.
    async fn rehydrate_from_peer(&self) {
        let Some(peer) = &self.peer else { return };
        let Ok(keys) = peer.scan_prefix("agent_memory:").await else { return };
        let now = Utc::now();
        for key in keys {
            if self.cache.contains_key(&key) {
                continue;
            }
            if let Some(entry) = self.fetch_from_peer(&key).await {
                if !entry.is_expired_at(now) {
                    self.cache.insert(key, entry);
                }
            }
        }
    }

    pub async fn clear_workflow(&self, workflow_id: &str) {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|e| e.workflow_id.as_deref() == Some(workflow_id))
            .map(|e| e.key().clone())
            .collect();
        for key in &keys {
            self.cache.remove(key);
            if let Some(peer) = &self.peer {
                let _ = peer.delete(key).await;
            }
        }
    }

    pub async fn get_stats(&self) -> MemoryStats {
        let mut by_type = HashMap::new();
        let mut by_scope = HashMap::new();
        let now = Utc::now();
        let mut total = 0;
        for entry in self.cache.iter().filter(|e| !e.is_expired_at(now)) {
            *by_type.entry(entry.memory_type.as_str().to_string()).or_insert(0) += 1;
            *by_scope.entry(entry.scope.as_str().to_string()).or_insert(0) += 1;
            total += 1;
        }
        MemoryStats {
            by_type,
            by_scope,
            total,
            durable_connected: *self.durable_connected.read().await,
        }
    }

    // --- Shared contexts -------------------------------------------------

    pub async fn create_shared_context(
        &self,
        context_id: &str,
        data: HashMap<String, Value>,
        access_agents: std::collections::HashSet<String>,
    ) -> Result<()> {
        if self.shared_contexts.contains_key(context_id) {
            return Err(OrchestratorError::Validation(format!(
                "shared context {context_id} already exists"
            )));
        }
        let ctx = SharedContext::new(context_id, data, access_agents);
        self.persist_shared_context(&ctx).await;
        self.shared_contexts.insert(context_id.to_string(), ctx);
        Ok(())
    }

    pub async fn get_shared_context(&self, context_id: &str, caller_agent: &str) -> Option<SharedContext> {
        let ctx = match self.shared_contexts.get(context_id).map(|c| c.clone()) {
            Some(ctx) => ctx,
            None => {
                let peer = self.peer.as_ref()?;
                let bytes = peer.get(&shared_context_key(context_id)).await.ok()??;
                let ctx: SharedContext = serde_json::from_slice(&bytes).ok()?;
                self.shared_contexts.insert(context_id.to_string(), ctx.clone());
                ctx
            }
        };
        if !ctx.can_access(caller_agent) {
            tracing::warn!(context_id, caller_agent, "shared context access denied");
            return None;
        }
        Some(ctx)
    }

    pub async fn update_shared_context(
        &self,
        context_id: &str,
        updates: HashMap<String, Value>,
        caller_agent: &str,
    ) -> Option<SharedContext> {
        let mut ctx = self.shared_contexts.get_mut(context_id)?;
        if !ctx.can_access(caller_agent) {
            tracing::warn!(context_id, caller_agent, "shared context update denied");
            return None;
        }
        ctx.apply_update(updates, caller_agent);
        let snapshot = ctx.clone();
        drop(ctx);
        self.persist_shared_context(&snapshot).await;
        self.events
            .publish(&format!("shared_context_updated:{context_id}"), serde_json::json!({"version": snapshot.version}))
            .await;
        Some(snapshot)
    }

    async fn persist_shared_context(&self, ctx: &SharedContext) {
        if let Some(peer) = &self.peer {
            if let Ok(bytes) = serde_json::to_vec(ctx) {
                let _ = peer.set(&shared_context_key(&ctx.context_id), bytes).await;
            }
        }
    }

    // --- Workflow state ---------------------------------------------------

    pub async fn set_workflow_state(&self, execution_id: &str, value: Value) {
        let version = {
            let mut entry = self
                .workflow_states
                .entry(execution_id.to_string())
                .or_insert_with(|| WorkflowStateEntry { value: Value::Null, version: 0 });
            entry.value = value.clone();
            entry.version += 1;
            entry.version
        };
        if let Some(peer) = &self.peer {
            if let Ok(bytes) = serde_json::to_vec(&value) {
                let _ = peer.set(&workflow_state_key(execution_id), bytes).await;
            }
        }
        self.events
            .publish("workflow_state_changed", serde_json::json!({"execution_id": execution_id, "version": version}))
            .await;
    }

    pub async fn get_workflow_state(&self, execution_id: &str) -> Option<Value> {
        if let Some(entry) = self.workflow_states.get(execution_id) {
            return Some(entry.value.clone());
        }
        let peer = self.peer.as_ref()?;
        let bytes = peer.get(&workflow_state_key(execution_id)).await.ok()??;
        let value: Value = serde_json::from_slice(&bytes).ok()?;
        self.workflow_states.insert(execution_id.to_string(), WorkflowStateEntry { value: value.clone(), version: 1 });
        Some(value)
    }

    // --- Sweeper -----------------------------------------------------------

    /// Purges expired entries from the local cache. Intended to be called
    /// on a `tokio::time::interval` tick by [`crate::memory::spawn_sweeper`].
    pub fn sweep(&self) {
        let now = Utc::now();
        let expired: Vec<String> = self
            .cache
            .iter()
            .filter(|e| e.is_expired_at(now))
            .map(|e| e.key().clone())
            .collect();
        for key in expired {
            self.cache.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(&Config::default(), None)
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips_content() {
        let store = store();
        store
            .store(
                Value::from("hello"),
                MemoryType::ShortTerm,
                MemoryScope::Agent,
                "a1",
                StoreOptions::default(),
            )
            .await
            .unwrap();
        let entry = store.retrieve(MemoryType::ShortTerm, MemoryScope::Agent, "a1").await.unwrap();
        assert_eq!(entry.content, Value::from("hello"));
    }

    #[tokio::test]
    async fn store_is_idempotent_on_identifier() {
        let store = store();
        store
            .store(Value::from(1), MemoryType::ShortTerm, MemoryScope::Agent, "a1", StoreOptions::default())
            .await
            .unwrap();
        store
            .store(Value::from(2), MemoryType::ShortTerm, MemoryScope::Agent, "a1", StoreOptions::default())
            .await
            .unwrap();
        let entry = store.retrieve(MemoryType::ShortTerm, MemoryScope::Agent, "a1").await.unwrap();
        assert_eq!(entry.content, Value::from(2));
    }

    #[tokio::test]
    async fn expired_entry_is_unreadable() {
        let store = store();
        store
            .store(
                Value::from("x"),
                MemoryType::ShortTerm,
                MemoryScope::Agent,
                "a1",
                StoreOptions { ttl: Some(ChronoDuration::seconds(-1)), ..Default::default() },
            )
            .await
            .unwrap();
        assert!(store.retrieve(MemoryType::ShortTerm, MemoryScope::Agent, "a1").await.is_none());
    }

    #[tokio::test]
    async fn shared_context_create_then_get_returns_data_at_version_one() {
        let store = store();
        let mut data = HashMap::new();
        data.insert("k".to_string(), Value::from(1));
        store
            .create_shared_context("c1", data.clone(), std::collections::HashSet::from(["a1".to_string()]))
            .await
            .unwrap();

        let ctx = store.get_shared_context("c1", "a1").await.unwrap();
        assert_eq!(ctx.version, 1);
        assert_eq!(ctx.data.get("k"), Some(&Value::from(1)));
        assert!(store.get_shared_context("c1", "a2").await.is_none());
    }

    #[tokio::test]
    async fn shared_context_update_denied_for_unlisted_agent() {
        let store = store();
        store
            .create_shared_context("c1", HashMap::new(), std::collections::HashSet::from(["a1".to_string()]))
            .await
            .unwrap();

        let mut updates = HashMap::new();
        updates.insert("k".to_string(), Value::from(2));
        assert!(store.update_shared_context("c1", updates.clone(), "a2").await.is_none());
        let ctx = store.update_shared_context("c1", updates, "a1").await.unwrap();
        assert_eq!(ctx.version, 2);
    }

    #[tokio::test]
    async fn workflow_state_round_trips() {
        let store = store();
        store.set_workflow_state("e1", Value::from("running")).await;
        assert_eq!(store.get_workflow_state("e1").await, Some(Value::from("running")));
    }

    /// Drops the in-memory maps entirely (by constructing a fresh store
    /// against the same peer) and confirms reads still succeed — the
    /// scenario a process restart produces, since a new process starts with
    /// empty caches but the same durable peer connection.
    #[tokio::test]
    async fn reads_survive_a_cache_drop_via_the_durable_peer() {
        let peer: Arc<dyn DurablePeer> = Arc::new(InProcessPeer::new());
        let config = Config::default();
        let before_restart = MemoryStore::new(&config, Some(peer.clone()));

        before_restart
            .store(Value::from("persisted"), MemoryType::LongTerm, MemoryScope::Agent, "a1", StoreOptions::default())
            .await
            .unwrap();
        before_restart.set_workflow_state("e1", Value::from("running")).await;
        let mut data = HashMap::new();
        data.insert("k".to_string(), Value::from(1));
        before_restart
            .create_shared_context("c1", data, std::collections::HashSet::from(["a1".to_string()]))
            .await
            .unwrap();

        // Simulate a restart: a fresh store, empty caches, same peer.
        let after_restart = MemoryStore::new(&config, Some(peer));

        let entry = after_restart.retrieve(MemoryType::LongTerm, MemoryScope::Agent, "a1").await.unwrap();
        assert_eq!(entry.content, Value::from("persisted"));

        assert_eq!(after_restart.get_workflow_state("e1").await, Some(Value::from("running")));

        let ctx = after_restart.get_shared_context("c1", "a1").await.unwrap();
        assert_eq!(ctx.data.get("k"), Some(&Value::from(1)));

        let found = after_restart
            .search(SearchCriteria { memory_type: Some(MemoryType::LongTerm), ..Default::default() }, 10)
            .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, Value::from("persisted"));
    }

    #[tokio::test]
    async fn sweep_removes_expired_entries() {
        let store = store();
        store
            .store(
                Value::from("x"),
                MemoryType::ShortTerm,
                MemoryScope::Agent,
                "a1",
                StoreOptions { ttl: Some(ChronoDuration::seconds(-1)), ..Default::default() },
            )
            .await
            .unwrap();
        store.sweep();
        assert_eq!(store.get_stats().await.total, 0);
    }
}
