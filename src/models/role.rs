//! The six fixed agent roles.
//!
//! Concrete role configuration (goal/backstory strings, tool allow-lists,
//! delegation flags) lives in [`crate::agents`], which is allowed to depend
//! on the tool registry; this module only carries the closed set of role
//! identifiers so [`crate::models::TaskSpec`] can reference one without
//! models depending upward on tools or agents.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    DataExtraction,
    ContractGenerator,
    ComplianceChecker,
    SignatureTracker,
    SummaryAgent,
    HelpAgent,
}

impl AgentRole {
    pub const ALL: [AgentRole; 6] = [
        AgentRole::DataExtraction,
        AgentRole::ContractGenerator,
        AgentRole::ComplianceChecker,
        AgentRole::SignatureTracker,
        AgentRole::SummaryAgent,
        AgentRole::HelpAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::DataExtraction => "data_extraction",
            AgentRole::ContractGenerator => "contract_generator",
            AgentRole::ComplianceChecker => "compliance_checker",
            AgentRole::SignatureTracker => "signature_tracker",
            AgentRole::SummaryAgent => "summary_agent",
            AgentRole::HelpAgent => "help_agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "data_extraction" => AgentRole::DataExtraction,
            "contract_generator" => AgentRole::ContractGenerator,
            "compliance_checker" => AgentRole::ComplianceChecker,
            "signature_tracker" => AgentRole::SignatureTracker,
            "summary_agent" => AgentRole::SummaryAgent,
            "help_agent" => AgentRole::HelpAgent,
            _ => return None,
        })
    }

    /// The source allows `help_agent`, `contract_generator`, and
    /// `signature_tracker` to delegate to other roles; the rest may not.
    pub fn delegation_allowed(&self) -> bool {
        matches!(
            self,
            AgentRole::HelpAgent | AgentRole::ContractGenerator | AgentRole::SignatureTracker
        )
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for role in AgentRole::ALL {
            assert_eq!(AgentRole::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn delegation_matches_spec() {
        assert!(AgentRole::HelpAgent.delegation_allowed());
        assert!(AgentRole::ContractGenerator.delegation_allowed());
        assert!(AgentRole::SignatureTracker.delegation_allowed());
        assert!(!AgentRole::DataExtraction.delegation_allowed());
        assert!(!AgentRole::ComplianceChecker.delegation_allowed());
        assert!(!AgentRole::SummaryAgent.delegation_allowed());
    }
}
