//! The model router: single entry point for all LLM calls.
//!
//! Grounded on the teacher's `LLMRouter` (`llm/router.rs`): a provider map
//! behind an `RwLock`-guarded health table, a retry-with-backoff loop, and
//! an immediate availability flip on health-check failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Duration;

use super::traits::ProviderAdapter;
use super::types::{ModelInfo, ModelRequest, ModelResponse, Provider, RoutingStrategy, TokenUsage};
use crate::config::Config;
use crate::{OrchestratorError, Result};

#[derive(Debug, Clone, Default)]
struct ProviderHealthStatus {
    is_healthy: bool,
    consecutive_failures: u32,
}

impl ProviderHealthStatus {
    fn healthy() -> Self {
        Self { is_healthy: true, consecutive_failures: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub strategy: RoutingStrategy,
    pub fallback_enabled: bool,
    pub max_retries: u32,
    pub health_check_interval_seconds: u64,
}

impl From<&Config> for RouterConfig {
    fn from(config: &Config) -> Self {
        Self {
            strategy: config.model_router_strategy,
            fallback_enabled: config.model_router_fallback_enabled,
            max_retries: config.model_router_max_retries,
            health_check_interval_seconds: config.model_router_health_check_interval_seconds,
        }
    }
}

pub struct ModelRouter {
    config: RouterConfig,
    models: RwLock<HashMap<String, ModelInfo>>,
    adapters: HashMap<Provider, Box<dyn ProviderAdapter>>,
    health: RwLock<HashMap<Provider, ProviderHealthStatus>>,
    last_health_check: RwLock<Option<Instant>>,
    total_cost: Mutex<f64>,
    total_tokens: AtomicU64,
}

impl ModelRouter {
    pub fn new(config: RouterConfig, adapters: Vec<Box<dyn ProviderAdapter>>) -> Self {
        let mut adapter_map = HashMap::new();
        let mut health = HashMap::new();
        for adapter in adapters {
            let provider = adapter.provider_type();
            health.insert(provider, ProviderHealthStatus::healthy());
            adapter_map.insert(provider, adapter);
        }
        Self {
            config,
            models: RwLock::new(HashMap::new()),
            adapters: adapter_map,
            health: RwLock::new(health),
            last_health_check: RwLock::new(None),
            total_cost: Mutex::new(0.0),
            total_tokens: AtomicU64::new(0),
        }
    }

    pub async fn register_model(&self, model: ModelInfo) {
        self.models.write().await.insert(model.id.clone(), model);
    }

    pub async fn total_cost(&self) -> f64 {
        *self.total_cost.lock().await
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens.load(Ordering::Relaxed)
    }

    /// Invocation protocol per the spec: health-check if stale, select,
    /// dispatch with retry/fallback, populate timing.
    pub async fn generate_response(&self, request: ModelRequest) -> Result<ModelResponse> {
        self.refresh_health_if_stale().await;

        let mut attempts = 0;
        let mut last_error: Option<String> = None;

        loop {
            let model = self.select_model(request.model_preference.as_deref()).await?;
            let adapter = self
                .adapters
                .get(&model.provider)
                .ok_or_else(|| OrchestratorError::ResourceUnavailable(format!("no adapter for provider {}", model.provider)))?;

            let start = Instant::now();
            match adapter.chat(&model, &request).await {
                Ok(raw) => {
                    let total = raw.prompt_tokens + raw.completion_tokens;
                    let usage = TokenUsage {
                        prompt_tokens: raw.prompt_tokens,
                        completion_tokens: raw.completion_tokens,
                        total_tokens: total,
                    };
                    *self.total_cost.lock().await += raw.cost;
                    self.total_tokens.fetch_add(total, Ordering::Relaxed);

                    return Ok(ModelResponse {
                        content: raw.content,
                        model_used: model.id.clone(),
                        provider: model.provider,
                        cost: raw.cost,
                        processing_time: start.elapsed().as_secs_f64(),
                        token_usage: usage,
                        metadata: HashMap::new(),
                    });
                }
                Err(e) => {
                    tracing::warn!(model = %model.id, error = %e, "provider adapter call failed");
                    self.mark_unavailable(&model.id).await;
                    last_error = Some(e.to_string());
                    attempts += 1;
                    if !self.config.fallback_enabled || attempts >= self.config.max_retries {
                        return Err(OrchestratorError::ResourceUnavailable(format!(
                            "no_model_available: {}",
                            last_error.unwrap_or_default()
                        )));
                    }
                }
            }
        }
    }

    async fn mark_unavailable(&self, model_id: &str) {
        let mut models = self.models.write().await;
        if let Some(m) = models.get_mut(model_id) {
            m.is_available = false;
        }
    }

    /// Selects a model id per the configured policy, honoring an explicit
    /// caller preference when the preferred model exists and is available.
    async fn select_model(&self, preference: Option<&str>) -> Result<ModelInfo> {
        let models = self.models.read().await;

        if let Some(pref) = preference {
            if let Some(m) = models.get(pref) {
                if m.is_available {
                    return Ok(m.clone());
                }
            }
        }

        let available: Vec<&ModelInfo> = models.values().filter(|m| m.is_available).collect();
        if available.is_empty() {
            return Err(OrchestratorError::ResourceUnavailable("no_model_available".into()));
        }

        let chosen = match self.config.strategy {
            RoutingStrategy::CostOptimized => available
                .into_iter()
                .min_by(|a, b| a.cost_per_token.partial_cmp(&b.cost_per_token).unwrap()),
            RoutingStrategy::Performance => available
                .into_iter()
                .max_by(|a, b| a.performance_score.partial_cmp(&b.performance_score).unwrap()),
            RoutingStrategy::Balanced => available.into_iter().min_by(|a, b| {
                let score_a = a.cost_per_token / a.performance_score.max(f64::EPSILON);
                let score_b = b.cost_per_token / b.performance_score.max(f64::EPSILON);
                score_a.partial_cmp(&score_b).unwrap()
            }),
        };

        chosen
            .cloned()
            .ok_or_else(|| OrchestratorError::ResourceUnavailable("no_model_available".into()))
    }

    async fn refresh_health_if_stale(&self) {
        let stale = {
            let last = self.last_health_check.read().await;
            match *last {
                None => true,
                Some(t) => t.elapsed() >= Duration::from_secs(self.config.health_check_interval_seconds),
            }
        };
        if stale {
            self.run_health_checks().await;
            *self.last_health_check.write().await = Some(Instant::now());
        }
    }

    /// Pings every registered provider and flips availability for all of
    /// that provider's models immediately on failure, per the spec's health
    /// contract: one failed check sets `is_available = false` for every
    /// model of that provider, no debounce window.
    pub async fn run_health_checks(&self) {
        for (provider, adapter) in &self.adapters {
            let healthy = adapter.health_check().await;
            let mut health = self.health.write().await;
            let entry = health.entry(*provider).or_default();
            if healthy {
                entry.is_healthy = true;
                entry.consecutive_failures = 0;
            } else {
                entry.consecutive_failures += 1;
                entry.is_healthy = false;
                tracing::warn!(%provider, "provider marked unhealthy after failed health check");
            }
            let is_healthy = entry.is_healthy;
            drop(health);

            let mut models = self.models.write().await;
            let now = Utc::now();
            for model in models.values_mut().filter(|m| m.provider == *provider) {
                model.is_available = is_healthy;
                model.last_health_check = Some(now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct FlakyAdapter {
        provider: Provider,
        calls: AtomicUsize,
        fail_first_n: usize,
    }

    #[async_trait]
    impl ProviderAdapter for FlakyAdapter {
        fn provider_type(&self) -> Provider {
            self.provider
        }

        async fn chat(&self, _model: &ModelInfo, _request: &ModelRequest) -> anyhow::Result<super::super::traits::AdapterResponse> {
            let n = self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if n < self.fail_first_n {
                anyhow::bail!("simulated provider failure");
            }
            Ok(super::super::traits::AdapterResponse {
                content: "ok".into(),
                prompt_tokens: 10,
                completion_tokens: 5,
                cost: 0.01,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    /// Fails for one specific model id, succeeds for every other — used to
    /// exercise router-level fallback between two registered models served
    /// by the same adapter.
    struct PerModelAdapter {
        provider: Provider,
        fails_for: String,
        calls_for_failing: AtomicUsize,
    }

    #[async_trait]
    impl ProviderAdapter for PerModelAdapter {
        fn provider_type(&self) -> Provider {
            self.provider
        }

        async fn chat(&self, model: &ModelInfo, _request: &ModelRequest) -> anyhow::Result<super::super::traits::AdapterResponse> {
            if model.id == self.fails_for {
                self.calls_for_failing.fetch_add(1, AtomicOrdering::SeqCst);
                anyhow::bail!("simulated provider failure");
            }
            Ok(super::super::traits::AdapterResponse {
                content: "ok".into(),
                prompt_tokens: 10,
                completion_tokens: 5,
                cost: 0.01,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    /// Always reports an unhealthy `health_check`, regardless of `chat`
    /// outcome — used to exercise `run_health_checks` directly.
    struct UnhealthyAdapter {
        provider: Provider,
    }

    #[async_trait]
    impl ProviderAdapter for UnhealthyAdapter {
        fn provider_type(&self) -> Provider {
            self.provider
        }

        async fn chat(&self, _model: &ModelInfo, _request: &ModelRequest) -> anyhow::Result<super::super::traits::AdapterResponse> {
            anyhow::bail!("should not be called by this test")
        }

        async fn health_check(&self) -> bool {
            false
        }
    }

    fn router_config() -> RouterConfig {
        RouterConfig {
            strategy: RoutingStrategy::CostOptimized,
            fallback_enabled: true,
            max_retries: 3,
            health_check_interval_seconds: 300,
        }
    }

    #[tokio::test]
    async fn picks_cheapest_available_model() {
        let router = ModelRouter::new(
            router_config(),
            vec![Box::new(FlakyAdapter { provider: Provider::OpenAi, calls: AtomicUsize::new(0), fail_first_n: 0 })],
        );
        router.register_model(ModelInfo::new("cheap", "Cheap", Provider::OpenAi, 0.001, 0.5)).await;
        router.register_model(ModelInfo::new("pricey", "Pricey", Provider::OpenAi, 0.01, 0.9)).await;

        let response = router
            .generate_response(ModelRequest { messages: vec![], ..Default::default() })
            .await
            .unwrap();
        assert_eq!(response.model_used, "cheap");
    }

    #[tokio::test]
    async fn fails_over_to_second_model_after_first_errors() {
        let router = ModelRouter::new(
            router_config(),
            vec![Box::new(FlakyAdapter { provider: Provider::OpenAi, calls: AtomicUsize::new(0), fail_first_n: 100 })],
        );
        router.register_model(ModelInfo::new("m1", "M1", Provider::OpenAi, 0.001, 0.5)).await;

        let err = router
            .generate_response(ModelRequest { messages: vec![], ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::ResourceUnavailable(_)));
    }

    #[tokio::test]
    async fn falls_back_to_second_model_when_cheapest_fails() {
        let router = ModelRouter::new(
            router_config(),
            vec![Box::new(PerModelAdapter {
                provider: Provider::OpenAi,
                fails_for: "m1".into(),
                calls_for_failing: AtomicUsize::new(0),
            })],
        );
        router.register_model(ModelInfo::new("m1", "M1", Provider::OpenAi, 0.001, 0.5)).await;
        router.register_model(ModelInfo::new("m2", "M2", Provider::OpenAi, 0.01, 0.9)).await;

        let response = router
            .generate_response(ModelRequest { messages: vec![], ..Default::default() })
            .await
            .unwrap();
        assert_eq!(response.model_used, "m2");
    }

    #[tokio::test]
    async fn honors_explicit_model_preference() {
        let router = ModelRouter::new(
            router_config(),
            vec![Box::new(FlakyAdapter { provider: Provider::OpenAi, calls: AtomicUsize::new(0), fail_first_n: 0 })],
        );
        router.register_model(ModelInfo::new("cheap", "Cheap", Provider::OpenAi, 0.001, 0.5)).await;
        router.register_model(ModelInfo::new("pricey", "Pricey", Provider::OpenAi, 0.01, 0.9)).await;

        let response = router
            .generate_response(ModelRequest {
                messages: vec![],
                model_preference: Some("pricey".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.model_used, "pricey");
    }

    #[tokio::test]
    async fn single_failed_health_check_marks_models_unavailable_immediately() {
        let router =
            ModelRouter::new(router_config(), vec![Box::new(UnhealthyAdapter { provider: Provider::OpenAi })]);
        router.register_model(ModelInfo::new("m1", "M1", Provider::OpenAi, 0.001, 0.5)).await;

        router.run_health_checks().await;

        let models = router.models.read().await;
        assert!(!models.get("m1").unwrap().is_available);
    }
}
