//! Queue entry domain model.
//!
//! One entry per trigger occurrence: either a workspace mutation or an
//! explicit user correction. Entries move through a strict lifecycle and
//! are never deleted; terminal entries keep their full run outcome for
//! audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::claim::Claim;
use super::mission::{Mission, VerificationResult};
use super::patch::Patch;
use super::score::Score;

/// Lifecycle state of a queue entry.
///
/// Transitions are monotonic: `Pending` -> `Processing` -> `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Waiting to be picked up by the worker.
    Pending,
    /// Claimed by the single active worker.
    Processing,
    /// Terminal. Outcome attached, entry retained for audit.
    Done,
}

impl Default for EntryState {
    fn default() -> Self {
        Self::Pending
    }
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> Vec<EntryState> {
        match self {
            Self::Pending => vec![Self::Processing],
            Self::Processing => vec![Self::Done, Self::Pending],
            Self::Done => vec![],
        }
    }

    /// `Processing -> Pending` is only legal through crash recovery.
    pub fn can_transition_to(&self, new_state: Self) -> bool {
        self.valid_transitions().contains(&new_state)
    }
}

/// What kind of trigger produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A workspace mutated (page added/removed, note added).
    Workspace,
    /// A user issued an explicit correction.
    Feedback,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Feedback => "feedback",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "workspace" => Some(Self::Workspace),
            "feedback" => Some(Self::Feedback),
            _ => None,
        }
    }
}

/// A recorded tool invocation from the conversation that triggered the
/// entry. Consumed to derive the relevant page set for feedback jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub result: Value,
}

/// Trigger payload. Typed per kind rather than opaque JSON so the
/// extractor does not have to re-validate shape downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryPayload {
    Workspace {
        workspace_slug: String,
        /// Page list + notes as captured at trigger time.
        snapshot: Value,
        user_message: String,
        assistant_response: String,
        tool_calls: Vec<ToolCall>,
    },
    Feedback {
        user_text: String,
        prior_answer_context: String,
        prior_tool_calls: Vec<ToolCall>,
        relevant_pages: Vec<String>,
    },
}

impl EntryPayload {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Workspace { .. } => EntryKind::Workspace,
            Self::Feedback { .. } => EntryKind::Feedback,
        }
    }

    /// Short label used in the entry id.
    pub fn label(&self) -> &str {
        match self {
            Self::Workspace { workspace_slug, .. } => workspace_slug,
            Self::Feedback { .. } => "feedback",
        }
    }
}

/// Terminal summary attached to a `Done` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub claims: Vec<Claim>,
    pub mission_plan: Vec<Mission>,
    pub mission_results: Vec<VerificationResult>,
    pub scores: Vec<Score>,
    pub patches_proposed: Vec<Patch>,
    pub patches_applied: Vec<Patch>,
    /// Stage-local failures accumulated over the run. Non-empty does not
    /// imply the run failed.
    pub errors: Vec<String>,
}

impl RunOutcome {
    /// Count scores per category for the final status line.
    pub fn score_counts(&self) -> ScoreCounts {
        use super::score::ScoreCategory;
        let mut counts = ScoreCounts::default();
        for score in &self.scores {
            match score.category {
                ScoreCategory::Verified => counts.verified += 1,
                ScoreCategory::Corrected => counts.corrected += 1,
                ScoreCategory::Enriched => counts.enriched += 1,
                ScoreCategory::Ungrounded => counts.ungrounded += 1,
                ScoreCategory::Conflict => counts.conflict += 1,
            }
        }
        counts
    }
}

/// Per-category score tallies for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCounts {
    pub verified: usize,
    pub corrected: usize,
    pub enriched: usize,
    pub ungrounded: usize,
    pub conflict: usize,
}

impl std::fmt::Display for ScoreCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} verified | {} corrected | {} enriched | {} conflict | {} ungrounded",
            self.verified, self.corrected, self.enriched, self.conflict, self.ungrounded
        )
    }
}

/// One trigger occurrence in the durable queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Time-ordered unique identifier. Lexical order is chronological.
    pub id: String,
    pub kind: EntryKind,
    pub payload: EntryPayload,
    pub state: EntryState,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_finished_at: Option<DateTime<Utc>>,
    /// Attached when the entry reaches `Done`.
    pub outcome: Option<RunOutcome>,
}

impl QueueEntry {
    pub fn new(payload: EntryPayload) -> Self {
        let now = Utc::now();
        let kind = payload.kind();
        let id = build_entry_id(kind, payload.label(), now);
        Self {
            id,
            kind,
            payload,
            state: EntryState::Pending,
            created_at: now,
            processing_started_at: None,
            processing_finished_at: None,
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn can_transition_to(&self, new_state: EntryState) -> bool {
        self.state.can_transition_to(new_state)
    }
}

/// Build a time-ordered entry id: `{utc-stamp}_{kind}_{label}_{suffix}`.
///
/// The timestamp prefix makes lexical order match creation order; the
/// short uuid suffix keeps ids unique within one second.
pub fn build_entry_id(kind: EntryKind, label: &str, created_at: DateTime<Utc>) -> String {
    let stamp = created_at.format("%Y%m%dT%H%M%SZ");
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    format!("{stamp}_{}_{}_{suffix}", kind.as_str(), slug_token(label, "item"))
}

/// Lowercase a label and collapse non-alphanumeric runs to `_`.
fn slug_token(value: &str, fallback: &str) -> String {
    let mut token = String::with_capacity(value.len());
    let mut last_underscore = true;
    for c in value.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            token.push(c);
            last_underscore = false;
        } else if !last_underscore {
            token.push('_');
            last_underscore = true;
        }
    }
    let token = token.trim_matches('_').to_string();
    if token.is_empty() {
        fallback.to_string()
    } else {
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback_payload() -> EntryPayload {
        EntryPayload::Feedback {
            user_text: "no, that's wrong".to_string(),
            prior_answer_context: "the hood mounts at 60 AFF".to_string(),
            prior_tool_calls: vec![],
            relevant_pages: vec!["K-501".to_string()],
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        assert!(EntryState::Pending.can_transition_to(EntryState::Processing));
        assert!(EntryState::Processing.can_transition_to(EntryState::Done));
        // Recovery path only.
        assert!(EntryState::Processing.can_transition_to(EntryState::Pending));
        // Monotonic otherwise.
        assert!(!EntryState::Pending.can_transition_to(EntryState::Done));
        assert!(!EntryState::Done.can_transition_to(EntryState::Pending));
        assert!(!EntryState::Done.can_transition_to(EntryState::Processing));
    }

    #[test]
    fn test_entry_creation() {
        let entry = QueueEntry::new(feedback_payload());
        assert_eq!(entry.kind, EntryKind::Feedback);
        assert_eq!(entry.state, EntryState::Pending);
        assert!(entry.id.contains("_feedback_"));
        assert!(entry.outcome.is_none());
    }

    #[test]
    fn test_entry_ids_are_time_ordered() {
        let early = build_entry_id(
            EntryKind::Workspace,
            "kitchen",
            Utc::now() - chrono::Duration::seconds(5),
        );
        let late = build_entry_id(EntryKind::Workspace, "kitchen", Utc::now());
        assert!(early < late);
    }

    #[test]
    fn test_slug_token() {
        assert_eq!(slug_token("Kitchen Hood / L2", "item"), "kitchen_hood_l2");
        assert_eq!(slug_token("  ", "item"), "item");
        assert_eq!(slug_token("--a--b--", "item"), "a_b");
    }

    #[test]
    fn test_score_counts_display() {
        let outcome = RunOutcome::default();
        assert_eq!(
            outcome.score_counts().to_string(),
            "0 verified | 0 corrected | 0 enriched | 0 conflict | 0 ungrounded"
        );
    }
}
