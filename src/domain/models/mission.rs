//! Mission and verification-result models.
//!
//! A mission batches every claim that references one source page into a
//! single vision-agent instruction, so vision calls are bounded by the
//! number of distinct pages rather than the number of claims.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One unit of vision re-verification, covering all claims on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    /// Unique within one run (`m_001`, `m_002`, ...).
    pub id: String,
    /// Claims this mission verifies. All share `target_page`.
    pub claim_ids: Vec<String>,
    pub target_page: String,
    /// Natural-language instruction synthesized from the claim texts.
    pub instruction: String,
    /// Claim id -> the value the claim asserts.
    pub expected_values: BTreeMap<String, String>,
}

impl Mission {
    pub fn new(id: impl Into<String>, target_page: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            claim_ids: Vec::new(),
            target_page: target_page.into(),
            instruction: String::new(),
            expected_values: BTreeMap::new(),
        }
    }
}

/// One intermediate artifact from the vision agent (a zoom, crop, or
/// annotation step). Kept verbatim so a verification can be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub step: String,
    #[serde(default)]
    pub detail: serde_json::Value,
}

/// Whether a mission's vision call completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Ok,
    Failed,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
        }
    }
}

/// The vision agent's response to one mission, persisted verbatim in the
/// entry's terminal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub mission_id: String,
    pub claim_ids: Vec<String>,
    pub target_page: String,
    pub status: VerificationStatus,
    /// Free-text findings: evidence quotes, values found, conflicts seen.
    pub findings: String,
    pub trace: Vec<TraceStep>,
    /// Populated when `status` is `Failed`.
    pub error: Option<String>,
}

impl VerificationResult {
    /// Successful verification with findings.
    pub fn ok(mission: &Mission, findings: impl Into<String>, trace: Vec<TraceStep>) -> Self {
        Self {
            mission_id: mission.id.clone(),
            claim_ids: mission.claim_ids.clone(),
            target_page: mission.target_page.clone(),
            status: VerificationStatus::Ok,
            findings: findings.into(),
            trace,
            error: None,
        }
    }

    /// Verification that could not complete. The claims it covered will
    /// be scored ungrounded; the run continues.
    pub fn failed(mission: &Mission, error: impl Into<String>) -> Self {
        Self {
            mission_id: mission.id.clone(),
            claim_ids: mission.claim_ids.clone(),
            target_page: mission.target_page.clone(),
            status: VerificationStatus::Failed,
            findings: String::new(),
            trace: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == VerificationStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_carries_claims() {
        let mut mission = Mission::new("m_001", "K-601");
        mission.claim_ids = vec!["c_001".to_string(), "c_002".to_string()];

        let result = VerificationResult::failed(&mission, "vision call exhausted retries");
        assert!(result.is_failed());
        assert_eq!(result.claim_ids.len(), 2);
        assert!(result.findings.is_empty());
        assert!(result.error.as_deref().unwrap().contains("exhausted"));
    }
}
