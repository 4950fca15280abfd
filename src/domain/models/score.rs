//! Score model and the source-authority hierarchy.
//!
//! The scorer compares vision findings against each claim and classifies
//! the outcome. When two sources disagree on the same fact, the fixed
//! authority ranking below decides which value wins; equal ranks are left
//! unresolved and surfaced rather than silently broken.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Verification outcome for one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    /// Vision findings match the claim exactly or semantically.
    Verified,
    /// A different concrete value was found; it becomes the patch value.
    Corrected,
    /// Additional true detail beyond the claim; patch is an addition.
    Enriched,
    /// No supporting evidence on the page. Never produces a knowledge patch.
    Ungrounded,
    /// Two sources disagree on the same fact.
    Conflict,
}

impl ScoreCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Corrected => "corrected",
            Self::Enriched => "enriched",
            Self::Ungrounded => "ungrounded",
            Self::Conflict => "conflict",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "verified" => Some(Self::Verified),
            "corrected" => Some(Self::Corrected),
            "enriched" => Some(Self::Enriched),
            "ungrounded" => Some(Self::Ungrounded),
            "conflict" => Some(Self::Conflict),
            _ => None,
        }
    }

    /// Whether this outcome is expected to produce a downstream patch.
    pub fn produces_patch(&self) -> bool {
        matches!(self, Self::Corrected | Self::Enriched | Self::Conflict)
    }
}

/// Scorer confidence in an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Unknown values normalize to `Medium`.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// The fixed authority ranking of source-document types.
///
/// Detail/fabrication drawings outrank enlarged dimensioned views, which
/// outrank tabular schedules, general notes, and written specifications,
/// in that order. The ranking is manually authored; any refinement must
/// arrive as an explicit, audited experience patch, never as a silent
/// precedence change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Detail,
    EnlargedPlan,
    Schedule,
    GeneralNotes,
    Spec,
    Unknown,
}

impl SourceKind {
    /// Higher rank wins a conflict.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Detail => 5,
            Self::EnlargedPlan => 4,
            Self::Schedule => 3,
            Self::GeneralNotes => 2,
            Self::Spec => 1,
            Self::Unknown => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::EnlargedPlan => "enlarged_plan",
            Self::Schedule => "schedule",
            Self::GeneralNotes => "general_notes",
            Self::Spec => "spec",
            Self::Unknown => "unknown",
        }
    }

    /// Normalize a free-text source description to a kind.
    ///
    /// Substring matching, most-authoritative token first, so strings
    /// like "detail sheet K-601" or "hood schedule" resolve correctly.
    pub fn normalize(raw: &str) -> Self {
        let token: String = raw
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' || c == '/' { '_' } else { c })
            .collect();
        let token = token.trim_matches('_');
        if token.contains("detail") {
            Self::Detail
        } else if token.contains("enlarged") {
            Self::EnlargedPlan
        } else if token.contains("schedule") {
            Self::Schedule
        } else if token.contains("general_note") || token.contains("generalnotes") {
            Self::GeneralNotes
        } else if token.contains("spec") {
            Self::Spec
        } else {
            Self::Unknown
        }
    }
}

/// One side of a multi-source disagreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictCandidate {
    /// Raw source description as reported ("detail 3/K-601").
    pub source: String,
    pub kind: SourceKind,
    pub value: Value,
}

impl ConflictCandidate {
    pub fn new(source: impl Into<String>, value: Value) -> Self {
        let source = source.into();
        let kind = SourceKind::normalize(&source);
        Self { source, kind, value }
    }
}

/// How a conflict was decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Always `source_hierarchy` for automatic resolutions.
    pub method: String,
    pub winning_kind: SourceKind,
    pub winning_value: Value,
    /// The sources whose values lost, recorded for the audit trail.
    pub losing_sources: Vec<String>,
}

/// One claim's verification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub claim_id: String,
    pub category: ScoreCategory,
    /// What the vision agent actually found on the page.
    pub vision_found: String,
    pub confidence: Confidence,
    pub rationale: String,
    /// Present for resolved conflicts only.
    pub resolution: Option<Resolution>,
    /// `None` means no action (verified, ungrounded, or an unresolved
    /// conflict awaiting human/experience review).
    pub action_taken: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflict_candidates: Vec<ConflictCandidate>,
}

impl Score {
    pub fn new(claim_id: impl Into<String>, category: ScoreCategory) -> Self {
        Self {
            claim_id: claim_id.into(),
            category,
            vision_found: String::new(),
            confidence: Confidence::Medium,
            rationale: String::new(),
            resolution: None,
            action_taken: None,
            conflict_candidates: Vec::new(),
        }
    }

    pub fn with_found(mut self, found: impl Into<String>) -> Self {
        self.vision_found = found.into();
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// A conflict that was scored but not auto-resolved.
    pub fn is_unresolved_conflict(&self) -> bool {
        self.category == ScoreCategory::Conflict && self.resolution.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_authority_ranking_order() {
        assert!(SourceKind::Detail.rank() > SourceKind::EnlargedPlan.rank());
        assert!(SourceKind::EnlargedPlan.rank() > SourceKind::Schedule.rank());
        assert!(SourceKind::Schedule.rank() > SourceKind::GeneralNotes.rank());
        assert!(SourceKind::GeneralNotes.rank() > SourceKind::Spec.rank());
        assert!(SourceKind::Spec.rank() > SourceKind::Unknown.rank());
    }

    #[test]
    fn test_source_kind_normalization() {
        assert_eq!(SourceKind::normalize("Detail Sheet 3/K-601"), SourceKind::Detail);
        assert_eq!(SourceKind::normalize("enlarged plan"), SourceKind::EnlargedPlan);
        assert_eq!(SourceKind::normalize("hood schedule"), SourceKind::Schedule);
        assert_eq!(SourceKind::normalize("General Notes"), SourceKind::GeneralNotes);
        assert_eq!(SourceKind::normalize("written spec section 23"), SourceKind::Spec);
        assert_eq!(SourceKind::normalize("napkin sketch"), SourceKind::Unknown);
    }

    #[test]
    fn test_conflict_candidate_normalizes_kind() {
        let candidate = ConflictCandidate::new("detail 3/K-601", json!("14x8"));
        assert_eq!(candidate.kind, SourceKind::Detail);
    }

    #[test]
    fn test_unresolved_conflict_has_no_action() {
        let score = Score::new("c_001", ScoreCategory::Conflict);
        assert!(score.is_unresolved_conflict());
        assert!(score.action_taken.is_none());
    }

    #[test]
    fn test_produces_patch() {
        assert!(ScoreCategory::Corrected.produces_patch());
        assert!(ScoreCategory::Enriched.produces_patch());
        assert!(ScoreCategory::Conflict.produces_patch());
        assert!(!ScoreCategory::Verified.produces_patch());
        assert!(!ScoreCategory::Ungrounded.produces_patch());
    }
}
