//! Concrete provider adapters.
//!
//! Grounded on `llm/providers/ollama/client.rs`'s `convert_request` /
//! `convert_response` / `health_check` shape, trimmed from that file's full
//! streaming/embeddings surface down to the single synchronous chat call
//! the model router needs.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::traits::{AdapterResponse, ProviderAdapter};
use super::types::{ChatMessage, ModelInfo, ModelRequest, Provider};

fn build_messages(request: &ModelRequest, system_as_message: bool) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if system_as_message {
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
    }
    messages.extend(request.messages.iter().cloned());
    messages
}

/// *aggregator*: single key, unified chat-completions protocol (OpenRouter
/// and compatible gateways).
pub struct AggregatorAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AggregatorAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("reqwest client"),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AggregatorAdapter {
    fn provider_type(&self) -> Provider {
        Provider::OpenRouter
    }

    async fn chat(&self, model: &ModelInfo, request: &ModelRequest) -> anyhow::Result<AdapterResponse> {
        let messages = build_messages(request, true);
        let body = json!({
            "model": model.id,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let resp: Value = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let prompt_tokens = resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = resp["usage"]["completion_tokens"].as_u64().unwrap_or(0);
        let total_tokens = resp["usage"]["total_tokens"]
            .as_u64()
            .unwrap_or(prompt_tokens + completion_tokens);

        Ok(AdapterResponse {
            content,
            prompt_tokens,
            completion_tokens,
            cost: total_tokens as f64 * model.cost_per_token,
        })
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// *openai_native*: same shape as the aggregator, direct endpoint.
pub struct OpenAiNativeAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiNativeAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("reqwest client"),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiNativeAdapter {
    fn provider_type(&self) -> Provider {
        Provider::OpenAi
    }

    async fn chat(&self, model: &ModelInfo, request: &ModelRequest) -> anyhow::Result<AdapterResponse> {
        let messages = build_messages(request, true);
        let body = json!({
            "model": model.id,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let resp: Value = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let prompt_tokens = resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = resp["usage"]["completion_tokens"].as_u64().unwrap_or(0);
        let total_tokens = resp["usage"]["total_tokens"]
            .as_u64()
            .unwrap_or(prompt_tokens + completion_tokens);

        Ok(AdapterResponse {
            content,
            prompt_tokens,
            completion_tokens,
            cost: total_tokens as f64 * model.cost_per_token,
        })
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// *anthropic_native*: system prompt goes in its dedicated field;
/// `input_tokens`/`output_tokens` map onto prompt/completion.
pub struct AnthropicNativeAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicNativeAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("reqwest client"),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicNativeAdapter {
    fn provider_type(&self) -> Provider {
        Provider::Anthropic
    }

    async fn chat(&self, model: &ModelInfo, request: &ModelRequest) -> anyhow::Result<AdapterResponse> {
        let messages = build_messages(request, false);
        let body = json!({
            "model": model.id,
            "system": request.system_prompt,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(1024),
            "temperature": request.temperature,
        });

        let resp: Value = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = resp["content"][0]["text"].as_str().unwrap_or_default().to_string();
        let input_tokens = resp["usage"]["input_tokens"].as_u64().unwrap_or(0);
        let output_tokens = resp["usage"]["output_tokens"].as_u64().unwrap_or(0);

        Ok(AdapterResponse {
            content,
            prompt_tokens: input_tokens,
            completion_tokens: output_tokens,
            cost: (input_tokens + output_tokens) as f64 * model.cost_per_token,
        })
    }

    async fn health_check(&self) -> bool {
        // Anthropic has no free-standing health endpoint; a HEAD against
        // the messages endpoint without a body is enough to see the
        // service respond (it 4xxs on missing auth/body, not on being down).
        self.client
            .get(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .is_ok()
    }
}

/// *local_http*: Ollama-shaped local runtime.
pub struct LocalHttpAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl LocalHttpAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("reqwest client"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for LocalHttpAdapter {
    fn provider_type(&self) -> Provider {
        Provider::Local
    }

    async fn chat(&self, model: &ModelInfo, request: &ModelRequest) -> anyhow::Result<AdapterResponse> {
        let messages = build_messages(request, true);
        let body = json!({
            "model": model.id,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });

        let resp: Value = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = resp["message"]["content"].as_str().unwrap_or_default().to_string();
        let word_count = content.split_whitespace().count() as f64;
        let approx_total = (word_count * 1.3).round() as u64;
        let prompt_tokens = (approx_total as f64 * 0.7).round() as u64;
        let completion_tokens = approx_total.saturating_sub(prompt_tokens);

        Ok(AdapterResponse {
            content,
            prompt_tokens,
            completion_tokens,
            cost: 0.0,
        })
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
