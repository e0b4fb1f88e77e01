//! The tool registry: a declarative catalog of named, typed capabilities.
//!
//! Grounded on the teacher's `AgentStorage` trait shape (`engine/agents.rs`:
//! an async `Send + Sync` trait with `register`/`get`/list-by-filter CRUD)
//! and the uniform tool contract in the spec's §4.2.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::{MemoryStore, StoreOptions};
use crate::models::{MemoryScope, MemoryType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    DocumentProcessing,
    DataExtraction,
    ContractGeneration,
    ComplianceChecking,
    SignatureTracking,
    Summarization,
    KnowledgeBase,
    WorkflowManagement,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::DocumentProcessing => "document_processing",
            ToolCategory::DataExtraction => "data_extraction",
            ToolCategory::ContractGeneration => "contract_generation",
            ToolCategory::ComplianceChecking => "compliance_checking",
            ToolCategory::SignatureTracking => "signature_tracking",
            ToolCategory::Summarization => "summarization",
            ToolCategory::KnowledgeBase => "knowledge_base",
            ToolCategory::WorkflowManagement => "workflow_management",
        }
    }
}

/// Carries the actor identity and free-form context every tool receives as
/// a superset of its specific fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    pub agent_id: Option<String>,
    pub workflow_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub context: HashMap<String, Value>,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl ToolInput {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: HashMap<String, Value>,
    pub metadata: HashMap<String, Value>,
    pub errors: Vec<String>,
    pub execution_time: f64,
    pub tool_name: String,
    pub timestamp: DateTime<Utc>,
}

impl ToolResult {
    pub fn ok(tool_name: impl Into<String>, data: HashMap<String, Value>) -> Self {
        Self {
            success: true,
            data,
            metadata: HashMap::new(),
            errors: Vec::new(),
            execution_time: 0.0,
            tool_name: tool_name.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: HashMap::new(),
            metadata: HashMap::new(),
            errors: vec![message.into()],
            execution_time: 0.0,
            tool_name: tool_name.into(),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn category(&self) -> ToolCategory;
    async fn execute(&self, input: ToolInput) -> anyhow::Result<ToolResult>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duplicate names replace the prior registration.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            tracing::warn!(tool = name, "replacing existing tool registration");
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    pub fn by_category(&self, category: ToolCategory) -> Vec<Arc<dyn Tool>> {
        self.tools
            .iter()
            .filter(|entry| entry.value().category() == category)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn list(&self) -> Vec<ToolSummary> {
        self.tools
            .iter()
            .map(|entry| ToolSummary {
                name: entry.value().name().to_string(),
                description: entry.value().description().to_string(),
                category: entry.value().category(),
            })
            .collect()
    }

    /// Wrapped execution: times the call, logs start/end, converts a raised
    /// failure into a `ToolResult{success=false}` instead of propagating,
    /// and writes one audit `MemoryEntry` summarizing the call (never the
    /// raw content, to bound memory).
    pub async fn execute(&self, name: &str, input: ToolInput, memory: &MemoryStore) -> Option<ToolResult> {
        let tool = self.get(name)?;
        let workflow_id = input.workflow_id.clone();

        tracing::info!(tool = name, "tool execution started");
        let start = Instant::now();
        let mut result = match tool.execute(input).await {
            Ok(result) => result,
            Err(e) => ToolResult::failed(name, e.to_string()),
        };
        result.execution_time = start.elapsed().as_secs_f64();
        tracing::info!(tool = name, success = result.success, duration = result.execution_time, "tool execution finished");

        if let Some(workflow_id) = workflow_id {
            let summary = serde_json::json!({
                "tool_name": result.tool_name,
                "category": tool.category().as_str(),
                "result_keys": result.data.keys().collect::<Vec<_>>(),
                "error_count": result.errors.len(),
                "duration": result.execution_time,
            });
            let _ = memory
                .store(
                    summary,
                    MemoryType::Workflow,
                    MemoryScope::Workflow,
                    &format!("tool_audit_{}_{}", workflow_id, Utc::now().timestamp_nanos_opt().unwrap_or_default()),
                    StoreOptions { workflow_id: Some(workflow_id), ..Default::default() },
                )
                .await;
        }

        Some(result)
    }
}
