//! Concrete configuration for each of the six fixed agent roles.
//!
//! Goal/backstory strings are condensed from the original source's
//! CrewAI-style agent definitions (`agent_orchestrator.py`); tool allow-lists
//! follow the §4.2 role-to-tool mapping, one tool per category the role is
//! permitted to reach.

use crate::models::AgentRole;
use crate::tools::ToolCategory;

pub struct RoleConfig {
    pub role: AgentRole,
    pub goal: &'static str,
    pub backstory: &'static str,
    pub allowed_tools: &'static [ToolCategory],
}

pub fn role_config(role: AgentRole) -> RoleConfig {
    match role {
        AgentRole::DataExtraction => RoleConfig {
            role,
            goal: "Extract and normalize data from real estate documents with high accuracy and confidence scoring",
            backstory: "An expert data extraction specialist with deep knowledge of real estate documents, \
                contracts, and legal terminology, who parses complex documents and produces structured output \
                with confidence scores.",
            allowed_tools: &[ToolCategory::DataExtraction, ToolCategory::DocumentProcessing],
        },
        AgentRole::ContractGenerator => RoleConfig {
            role,
            goal: "Generate comprehensive real estate contracts from templates and extracted data",
            backstory: "A seasoned contract specialist who fills complex templates accurately and ensures \
                generated contracts reflect the supplied fields.",
            allowed_tools: &[ToolCategory::ContractGeneration, ToolCategory::DataExtraction],
        },
        AgentRole::ComplianceChecker => RoleConfig {
            role,
            goal: "Validate contracts against legal requirements and industry regulations",
            backstory: "A meticulous compliance expert who identifies potential issues and validates contract \
                terms against a named ruleset.",
            allowed_tools: &[ToolCategory::ComplianceChecking],
        },
        AgentRole::SignatureTracker => RoleConfig {
            role,
            goal: "Monitor and coordinate e-signature workflows with multi-party tracking",
            backstory: "An efficient workflow coordinator who tracks signature status and coordinates \
                multi-party signing processes.",
            allowed_tools: &[ToolCategory::SignatureTracking],
        },
        AgentRole::SummaryAgent => RoleConfig {
            role,
            goal: "Create comprehensive summaries and executive reports for contracts and documents",
            backstory: "A skilled analyst who distills complex information into clear, actionable summaries.",
            allowed_tools: &[ToolCategory::Summarization],
        },
        AgentRole::HelpAgent => RoleConfig {
            role,
            goal: "Provide contextual assistance and guide users through real estate workflows",
            backstory: "A knowledgeable assistant with comprehensive understanding of the platform and its \
                workflows, who answers questions and points users to relevant help content.",
            allowed_tools: &[ToolCategory::KnowledgeBase, ToolCategory::WorkflowManagement],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_has_a_config() {
        for role in AgentRole::ALL {
            let cfg = role_config(role);
            assert_eq!(cfg.role, role);
            assert!(!cfg.allowed_tools.is_empty());
        }
    }
}
