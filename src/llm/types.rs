//! Wire types shared by the model router and every provider adapter.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenRouter,
    OpenAi,
    Anthropic,
    Local,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "openrouter",
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Local => "local",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registry entry describing one model a provider exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: Provider,
    pub cost_per_token: f64,
    pub context_length: u32,
    pub capabilities: Vec<String>,
    /// In `[0, 1]`.
    pub performance_score: f64,
    pub is_available: bool,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider: Provider, cost_per_token: f64, performance_score: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider,
            cost_per_token,
            context_length: 8192,
            capabilities: Vec::new(),
            performance_score,
            is_available: true,
            last_health_check: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: "tool".into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRequest {
    pub messages: Vec<ChatMessage>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub tools: Vec<Value>,
    pub model_preference: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    pub model_used: String,
    pub provider: Provider,
    pub cost: f64,
    /// Seconds. Measured by the router, not the adapter.
    pub processing_time: f64,
    pub token_usage: TokenUsage,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Selection policy for the model router, chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    CostOptimized,
    Performance,
    Balanced,
}

impl RoutingStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "cost_optimized" => RoutingStrategy::CostOptimized,
            "performance" => RoutingStrategy::Performance,
            "balanced" => RoutingStrategy::Balanced,
            _ => return None,
        })
    }
}
