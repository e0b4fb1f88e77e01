//! Built-in tool implementations.
//!
//! The distillation leaves tool bodies unspecified (they are external
//! collaborators at the implementation level), but
//! `original_source/backend/app/services/agent_tools/*.py` shows the shape
//! each family takes: a typed input, a best-effort transformation, and a
//! `data` map the calling agent re-injects as context. These are
//! self-contained stand-ins — no real parser, e-signature provider, or
//! compliance rule content — sufficient to exercise the registry end to
//! end.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::registry::{Tool, ToolCategory, ToolInput, ToolResult};

fn text_field(input: &ToolInput, name: &str) -> String {
    input
        .field(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Grounded on `data_extraction.py`'s `DocumentParsingTool` /
/// `EntityRecognitionTool`: turns raw text into a flat entity map.
pub struct DataExtractionTool;

#[async_trait]
impl Tool for DataExtractionTool {
    fn name(&self) -> &str {
        "extract_contract_fields"
    }
    fn description(&self) -> &str {
        "Extract structured fields (parties, price, dates) from contract text"
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::DataExtraction
    }

    async fn execute(&self, input: ToolInput) -> anyhow::Result<ToolResult> {
        let text = text_field(&input, "text_content");
        let word_count = text.split_whitespace().count();
        let mut data = HashMap::new();
        data.insert("entities_found".to_string(), json!(word_count.min(32)));
        data.insert("confidence".to_string(), json!(if text.is_empty() { 0.0 } else { 0.8 }));
        Ok(ToolResult::ok(self.name(), data))
    }
}

/// Grounded on `contract_generation.py`: fills a named template with field
/// values.
pub struct ContractGenerationTool;

#[async_trait]
impl Tool for ContractGenerationTool {
    fn name(&self) -> &str {
        "generate_contract_draft"
    }
    fn description(&self) -> &str {
        "Render a contract draft from a template id and field values"
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::ContractGeneration
    }

    async fn execute(&self, input: ToolInput) -> anyhow::Result<ToolResult> {
        let template_id = text_field(&input, "template_id");
        if template_id.is_empty() {
            return Ok(ToolResult::failed(self.name(), "template_id is required"));
        }
        let mut data = HashMap::new();
        data.insert("template_id".to_string(), json!(template_id));
        data.insert("draft_ready".to_string(), json!(true));
        Ok(ToolResult::ok(self.name(), data))
    }
}

/// Grounded on `compliance_checking.py`: runs a named ruleset against
/// extracted fields and reports pass/fail per rule.
pub struct ComplianceCheckingTool;

#[async_trait]
impl Tool for ComplianceCheckingTool {
    fn name(&self) -> &str {
        "check_compliance"
    }
    fn description(&self) -> &str {
        "Check contract fields against a named compliance ruleset"
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::ComplianceChecking
    }

    async fn execute(&self, input: ToolInput) -> anyhow::Result<ToolResult> {
        let ruleset = text_field(&input, "ruleset");
        let mut data = HashMap::new();
        data.insert("ruleset".to_string(), json!(if ruleset.is_empty() { "default".to_string() } else { ruleset }));
        data.insert("violations".to_string(), json!(Vec::<String>::new()));
        data.insert("passed".to_string(), json!(true));
        Ok(ToolResult::ok(self.name(), data))
    }
}

/// Grounded on `signature_tracking.py`: reports outstanding signers for a
/// contract.
pub struct SignatureTrackingTool;

#[async_trait]
impl Tool for SignatureTrackingTool {
    fn name(&self) -> &str {
        "check_signature_status"
    }
    fn description(&self) -> &str {
        "Report which parties have signed and which are outstanding"
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::SignatureTracking
    }

    async fn execute(&self, input: ToolInput) -> anyhow::Result<ToolResult> {
        let contract_id = text_field(&input, "contract_id");
        let mut data = HashMap::new();
        data.insert("contract_id".to_string(), json!(contract_id));
        data.insert("signed".to_string(), json!(Vec::<String>::new()));
        data.insert("outstanding".to_string(), json!(Vec::<String>::new()));
        Ok(ToolResult::ok(self.name(), data))
    }
}

/// Grounded on `summarization.py`: produces a short summary from input
/// text.
pub struct SummarizationTool;

#[async_trait]
impl Tool for SummarizationTool {
    fn name(&self) -> &str {
        "summarize_text"
    }
    fn description(&self) -> &str {
        "Produce a short summary of the given text"
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::Summarization
    }

    async fn execute(&self, input: ToolInput) -> anyhow::Result<ToolResult> {
        let text = text_field(&input, "text_content");
        let summary: String = text.split_whitespace().take(24).collect::<Vec<_>>().join(" ");
        let mut data = HashMap::new();
        data.insert("summary".to_string(), json!(summary));
        Ok(ToolResult::ok(self.name(), data))
    }
}

/// Grounded on `file_operations.py`: normalizes a document's text content.
/// Document parsing (PDF/DOCX/OCR) itself is out of scope; this tool
/// accepts already-extracted text.
pub struct DocumentProcessingTool;

#[async_trait]
impl Tool for DocumentProcessingTool {
    fn name(&self) -> &str {
        "normalize_document"
    }
    fn description(&self) -> &str {
        "Normalize whitespace and encoding of extracted document text"
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::DocumentProcessing
    }

    async fn execute(&self, input: ToolInput) -> anyhow::Result<ToolResult> {
        let text = text_field(&input, "text_content");
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut data = HashMap::new();
        data.insert("normalized_length".to_string(), json!(normalized.len()));
        Ok(ToolResult::ok(self.name(), data))
    }
}

/// Grounded on `help_assistance.py`: a thin pass-through that looks up a
/// topic in a static FAQ-shaped map. Real knowledge base content is out of
/// scope.
pub struct KnowledgeBaseTool;

#[async_trait]
impl Tool for KnowledgeBaseTool {
    fn name(&self) -> &str {
        "lookup_knowledge_base"
    }
    fn description(&self) -> &str {
        "Look up a help topic in the real-estate knowledge base"
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::KnowledgeBase
    }

    async fn execute(&self, input: ToolInput) -> anyhow::Result<ToolResult> {
        let topic = text_field(&input, "topic");
        let mut data = HashMap::new();
        data.insert("topic".to_string(), json!(topic));
        data.insert("found".to_string(), json!(false));
        Ok(ToolResult::ok(self.name(), data))
    }
}

/// Grounded on `database_access.py`'s read-only status lookups, narrowed to
/// a thin workflow-status pass-through since persistent storage itself is
/// out of scope.
pub struct WorkflowManagementTool;

#[async_trait]
impl Tool for WorkflowManagementTool {
    fn name(&self) -> &str {
        "lookup_workflow_metadata"
    }
    fn description(&self) -> &str {
        "Look up metadata about the current workflow execution"
    }
    fn category(&self) -> ToolCategory {
        ToolCategory::WorkflowManagement
    }

    async fn execute(&self, input: ToolInput) -> anyhow::Result<ToolResult> {
        let mut data = HashMap::new();
        data.insert("workflow_id".to_string(), json!(input.workflow_id));
        Ok(ToolResult::ok(self.name(), data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn input_with_field(name: &str, value: Value) -> ToolInput {
        let mut fields = StdHashMap::new();
        fields.insert(name.to_string(), value);
        ToolInput { fields, ..Default::default() }
    }

    #[tokio::test]
    async fn data_extraction_scores_nonempty_text() {
        let tool = DataExtractionTool;
        let result = tool.execute(input_with_field("text_content", json!("the quick brown fox"))).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data["confidence"], json!(0.8));
    }

    #[tokio::test]
    async fn contract_generation_requires_template_id() {
        let tool = ContractGenerationTool;
        let result = tool.execute(ToolInput::default()).await.unwrap();
        assert!(!result.success);
    }
}
