//! Model Router: the single entry point for all LLM calls.
//!
//! Submodules mirror the teacher's `llm/` split: `traits` defines the
//! adapter contract, `providers` supplies the four concrete adapter kinds,
//! `router` owns selection/retry/health, and `types` carries the wire
//! shapes every piece shares.

pub mod providers;
pub mod router;
pub mod traits;
pub mod types;

pub use providers::{AggregatorAdapter, AnthropicNativeAdapter, LocalHttpAdapter, OpenAiNativeAdapter};
pub use router::{ModelRouter, RouterConfig};
pub use traits::{AdapterResponse, ProviderAdapter};
pub use types::{ChatMessage, ModelInfo, ModelRequest, ModelResponse, Provider, RoutingStrategy, TokenUsage};
