//! Template type: the structural category of a disclosure document.

use serde::{Deserialize, Serialize};

/// Structural category of a disclosure document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    /// Periodic transaction report (securities trades).
    TransactionReport,
    /// Annual financial disclosure statement.
    AnnualDisclosure,
    /// Candidate financial disclosure statement.
    CandidateDisclosure,
    /// Request for a filing deadline extension.
    ExtensionRequest,
    /// Termination report / notice of leaving office.
    TerminationNotice,
    /// Gift and privately-sponsored travel report.
    GiftTravelReport,
    /// Nothing matched; no template-specific extraction is possible.
    Unknown,
}

impl TemplateType {
    /// All concrete template types, in registry order.
    pub const ALL: [TemplateType; 6] = [
        TemplateType::TransactionReport,
        TemplateType::AnnualDisclosure,
        TemplateType::CandidateDisclosure,
        TemplateType::ExtensionRequest,
        TemplateType::TerminationNotice,
        TemplateType::GiftTravelReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::TransactionReport => "transaction_report",
            TemplateType::AnnualDisclosure => "annual_disclosure",
            TemplateType::CandidateDisclosure => "candidate_disclosure",
            TemplateType::ExtensionRequest => "extension_request",
            TemplateType::TerminationNotice => "termination_notice",
            TemplateType::GiftTravelReport => "gift_travel_report",
            TemplateType::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "transaction_report" | "ptr" | "periodic_transaction_report" => {
                Some(TemplateType::TransactionReport)
            }
            "annual_disclosure" | "annual" | "fd" => Some(TemplateType::AnnualDisclosure),
            "candidate_disclosure" | "candidate" => Some(TemplateType::CandidateDisclosure),
            "extension_request" | "extension" => Some(TemplateType::ExtensionRequest),
            "termination_notice" | "termination" => Some(TemplateType::TerminationNotice),
            "gift_travel_report" | "gift_travel" | "travel" | "gift" => {
                Some(TemplateType::GiftTravelReport)
            }
            "unknown" => Some(TemplateType::Unknown),
            _ => None,
        }
    }

    /// Whether this template carries a repeated row structure.
    pub fn has_rows(&self) -> bool {
        matches!(
            self,
            TemplateType::TransactionReport
                | TemplateType::AnnualDisclosure
                | TemplateType::CandidateDisclosure
                | TemplateType::GiftTravelReport
        )
    }
}

impl std::fmt::Display for TemplateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
