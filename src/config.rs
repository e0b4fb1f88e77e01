//! Startup configuration for the orchestration core.
//!
//! Replaces the "settings object with attribute access" pattern with a
//! single immutable struct, validated once at construction. Every field
//! maps to an option named in the external configuration surface; env vars
//! are prefixed `CONTRACT_CREW_` (e.g. `CONTRACT_CREW_WORKER_COUNT`).

use crate::llm::RoutingStrategy;

/// Immutable process configuration.
///
/// Constructed once via [`Config::default`] or [`Config::from_env`] and
/// handed to [`crate::orchestrator::OrchestratorHandle::init`]; nothing
/// downstream mutates it.
#[derive(Debug, Clone)]
pub struct Config {
    pub worker_count: usize,
    pub monitor_interval_seconds: u64,
    pub ready_queue_capacity: usize,
    pub default_task_max_retries: u32,

    pub model_router_strategy: RoutingStrategy,
    pub model_router_fallback_enabled: bool,
    pub model_router_max_retries: u32,
    pub model_router_health_check_interval_seconds: u64,

    pub memory_peer_url: Option<String>,
    pub memory_short_term_ttl_seconds: i64,
    pub memory_workflow_ttl_seconds: i64,
    pub memory_shared_ttl_seconds: i64,
    pub memory_long_term_ttl_seconds: i64,
    /// Ambient addition: how often the memory store's sweeper wakes to purge
    /// expired entries from the local cache. Not in the consumed-interface
    /// table because it is an implementation detail of the in-process cache.
    pub memory_sweep_interval_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: 3,
            monitor_interval_seconds: 10,
            ready_queue_capacity: 1024,
            default_task_max_retries: 3,

            model_router_strategy: RoutingStrategy::Balanced,
            model_router_fallback_enabled: true,
            model_router_max_retries: 3,
            model_router_health_check_interval_seconds: 300,

            memory_peer_url: None,
            memory_short_term_ttl_seconds: 3600,
            memory_workflow_ttl_seconds: 86_400,
            memory_shared_ttl_seconds: 604_800,
            memory_long_term_ttl_seconds: 2_592_000,
            memory_sweep_interval_seconds: 60,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment, falling back to
    /// [`Config::default`] for any variable not set. Grounded in the
    /// teacher's declared (if unused-at-runtime) dependency on the `config`
    /// crate; here it is the sole configuration surface since there is no
    /// CLI in scope.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default("worker_count", defaults.worker_count as i64)
            .and_then(|b| b.set_default("monitor_interval_seconds", defaults.monitor_interval_seconds as i64))
            .and_then(|b| b.set_default("ready_queue_capacity", defaults.ready_queue_capacity as i64))
            .and_then(|b| {
                b.set_default(
                    "default_task_max_retries",
                    defaults.default_task_max_retries as i64,
                )
            })
            .and_then(|b| b.set_default("model_router_fallback_enabled", defaults.model_router_fallback_enabled))
            .and_then(|b| b.set_default("model_router_max_retries", defaults.model_router_max_retries as i64))
            .and_then(|b| {
                b.set_default(
                    "model_router_health_check_interval_seconds",
                    defaults.model_router_health_check_interval_seconds as i64,
                )
            })
            .and_then(|b| b.set_default("memory_short_term_ttl_seconds", defaults.memory_short_term_ttl_seconds))
            .and_then(|b| b.set_default("memory_workflow_ttl_seconds", defaults.memory_workflow_ttl_seconds))
            .and_then(|b| b.set_default("memory_shared_ttl_seconds", defaults.memory_shared_ttl_seconds))
            .and_then(|b| b.set_default("memory_long_term_ttl_seconds", defaults.memory_long_term_ttl_seconds))
            .and_then(|b| b.set_default("memory_sweep_interval_seconds", defaults.memory_sweep_interval_seconds as i64))
            .and_then(|b| b.add_source(config::Environment::with_prefix("CONTRACT_CREW")).build());

        let loaded = match builder {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, "config load failed, using defaults");
                return defaults;
            }
        };

        Self {
            worker_count: loaded.get("worker_count").unwrap_or(defaults.worker_count),
            monitor_interval_seconds: loaded
                .get("monitor_interval_seconds")
                .unwrap_or(defaults.monitor_interval_seconds),
            ready_queue_capacity: loaded
                .get("ready_queue_capacity")
                .unwrap_or(defaults.ready_queue_capacity),
            default_task_max_retries: loaded
                .get("default_task_max_retries")
                .unwrap_or(defaults.default_task_max_retries),
            model_router_strategy: loaded
                .get::<String>("model_router_strategy")
                .ok()
                .and_then(|s| RoutingStrategy::parse(&s))
                .unwrap_or(defaults.model_router_strategy),
            model_router_fallback_enabled: loaded
                .get("model_router_fallback_enabled")
                .unwrap_or(defaults.model_router_fallback_enabled),
            model_router_max_retries: loaded
                .get("model_router_max_retries")
                .unwrap_or(defaults.model_router_max_retries),
            model_router_health_check_interval_seconds: loaded
                .get("model_router_health_check_interval_seconds")
                .unwrap_or(defaults.model_router_health_check_interval_seconds),
            memory_peer_url: loaded.get("memory_peer_url").ok(),
            memory_short_term_ttl_seconds: loaded
                .get("memory_short_term_ttl_seconds")
                .unwrap_or(defaults.memory_short_term_ttl_seconds),
            memory_workflow_ttl_seconds: loaded
                .get("memory_workflow_ttl_seconds")
                .unwrap_or(defaults.memory_workflow_ttl_seconds),
            memory_shared_ttl_seconds: loaded
                .get("memory_shared_ttl_seconds")
                .unwrap_or(defaults.memory_shared_ttl_seconds),
            memory_long_term_ttl_seconds: loaded
                .get("memory_long_term_ttl_seconds")
                .unwrap_or(defaults.memory_long_term_ttl_seconds),
            memory_sweep_interval_seconds: loaded
                .get("memory_sweep_interval_seconds")
                .unwrap_or(defaults.memory_sweep_interval_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.worker_count, 3);
        assert_eq!(c.monitor_interval_seconds, 10);
        assert_eq!(c.ready_queue_capacity, 1024);
        assert_eq!(c.default_task_max_retries, 3);
        assert_eq!(c.model_router_max_retries, 3);
        assert_eq!(c.model_router_health_check_interval_seconds, 300);
        assert!(c.memory_peer_url.is_none());
        assert_eq!(c.memory_short_term_ttl_seconds, 3600);
        assert_eq!(c.memory_workflow_ttl_seconds, 86_400);
        assert_eq!(c.memory_shared_ttl_seconds, 604_800);
        assert_eq!(c.memory_long_term_ttl_seconds, 2_592_000);
    }
}
