use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::models::{Claim, EntryPayload, VerificationResult};

/// External agent call errors, classified for retry decisions.
///
/// Transient failures (rate limits, 5xx, network, timeout) are retried
/// with bounded backoff; permanent failures fail fast.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("transient agent failure: {0}")]
    Transient(String),

    #[error("permanent agent failure: {0}")]
    Permanent(String),

    #[error("agent call timed out after {0}s")]
    Timeout(u64),

    #[error("agent returned malformed output: {0}")]
    MalformedOutput(String),
}

impl AgentError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

/// Unvalidated claim as emitted by the reasoning agent. The extractor
/// normalizes these into domain [`Claim`]s and filters the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawClaim {
    #[serde(default)]
    pub claim_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source_page: String,
    #[serde(default)]
    pub claim_type: String,
    #[serde(default)]
    pub verification_priority: String,
    #[serde(default)]
    pub source_anchor: String,
}

/// Unvalidated mission as planned by the reasoning agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMission {
    #[serde(default)]
    pub mission_id: String,
    #[serde(default)]
    pub claim_ids: Vec<String>,
    #[serde(default)]
    pub target_page: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub expected_values: std::collections::BTreeMap<String, String>,
}

/// One disagreeing source reported by the scoring agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConflictCandidate {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub value: Value,
}

/// Unvalidated score judgment from the reasoning agent. Conflict
/// resolution is never delegated to the agent; the scorer resolves
/// candidates deterministically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawScore {
    #[serde(default)]
    pub claim_id: String,
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub vision_found: String,
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub conflict_candidates: Vec<RawConflictCandidate>,
}

/// Unvalidated patch proposal from the reasoning agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPatch {
    #[serde(default)]
    pub patch_id: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub claim_id: String,
}

/// Port for the text-reasoning agent.
///
/// Used at three pipeline stages: claim extraction, mission planning,
/// and scoring/patch proposal. All outputs are raw and re-validated by
/// the consuming service; a malformed response is recoverable because
/// every stage has a deterministic fallback.
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// Read a trigger payload and emit discrete verifiable assertions.
    async fn extract_claims(&self, payload: &EntryPayload) -> Result<Vec<RawClaim>, AgentError>;

    /// Group claims into one mission per distinct source page.
    async fn plan_missions(&self, claims: &[Claim]) -> Result<Vec<RawMission>, AgentError>;

    /// Compare vision findings to each claim and classify the outcome.
    async fn score_claims(
        &self,
        claims: &[Claim],
        results: &[VerificationResult],
    ) -> Result<Vec<RawScore>, AgentError>;

    /// Propose state patches from scored outcomes.
    async fn propose_patches(
        &self,
        claims: &[Claim],
        results: &[VerificationResult],
        scores: &[crate::domain::models::Score],
    ) -> Result<Vec<RawPatch>, AgentError>;
}
