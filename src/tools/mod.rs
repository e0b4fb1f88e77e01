//! Tool Registry (L2): declarative catalog of named tools, each with a
//! typed input, a category, and a uniform `execute` contract.

pub mod builtin;
pub mod registry;

pub use registry::{Tool, ToolCategory, ToolInput, ToolRegistry, ToolResult, ToolSummary};

use std::sync::Arc;

/// Registers every built-in tool. Concrete deployments may register
/// additional tools (or replace these) before the orchestrator starts.
pub fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(builtin::DocumentProcessingTool));
    registry.register(Arc::new(builtin::DataExtractionTool));
    registry.register(Arc::new(builtin::ContractGenerationTool));
    registry.register(Arc::new(builtin::ComplianceCheckingTool));
    registry.register(Arc::new(builtin::SignatureTrackingTool));
    registry.register(Arc::new(builtin::SummarizationTool));
    registry.register(Arc::new(builtin::KnowledgeBaseTool));
    registry.register(Arc::new(builtin::WorkflowManagementTool));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_eight_builtins() {
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry);
        assert_eq!(registry.list().len(), 8);
    }

    #[test]
    fn by_category_filters_correctly() {
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry);
        let tools = registry.by_category(ToolCategory::Summarization);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "summarize_text");
    }
}
