//! The adapter contract every LLM provider implementation satisfies.
//!
//! Grounded on the teacher's `LLMProviderClient` trait
//! (`llm/traits.rs`): an async trait object stored behind `Box<dyn _>` in
//! the router's provider map, so adding a fifth provider kind never touches
//! the router itself.

use async_trait::async_trait;

use super::types::{ModelInfo, ModelRequest, Provider};

/// Result of one adapter-level call, before the router stamps in
/// `model_used`/`provider`/`processing_time`.
pub struct AdapterResponse {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: f64,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_type(&self) -> Provider;

    /// Converts `request` to the provider's wire shape, issues the call,
    /// and converts the response back. Errors are adapter/network failures;
    /// the router is responsible for marking the model unavailable and
    /// retrying.
    async fn chat(&self, model: &ModelInfo, request: &ModelRequest) -> anyhow::Result<AdapterResponse>;

    /// Pings the provider's lightweight health endpoint (`/api/tags` for
    /// local, a short completion or equivalent for cloud providers).
    async fn health_check(&self) -> bool;
}
