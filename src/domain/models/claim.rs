//! Claim domain model.
//!
//! A claim is one discrete, independently verifiable factual assertion
//! about source-document content. Claims are produced by the extractor
//! and immutable thereafter.

use serde::{Deserialize, Serialize};

/// Taxonomy of verifiable claim categories.
///
/// Subjective, general, or purely procedural statements do not fit any
/// category and are filtered during extraction rather than scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimCategory {
    /// A measurement or dimension (e.g. "mounts at 64 AFF").
    Dimensional,
    /// Material or finish callout.
    Material,
    /// Equipment model or part number.
    ModelPart,
    /// Written specification reference.
    Specification,
    /// Cross-trade coordination fact.
    Coordination,
    /// Physical placement on the plan.
    Location,
}

impl ClaimCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dimensional => "dimensional",
            Self::Material => "material",
            Self::ModelPart => "model_part",
            Self::Specification => "specification",
            Self::Coordination => "coordination",
            Self::Location => "location",
        }
    }

    /// Parse a category from free-form agent output. Returns `None` for
    /// anything outside the taxonomy so the caller can filter it.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dimensional" => Some(Self::Dimensional),
            "material" => Some(Self::Material),
            "model_part" | "model" | "part" => Some(Self::ModelPart),
            "specification" | "spec" => Some(Self::Specification),
            "coordination" => Some(Self::Coordination),
            "location" => Some(Self::Location),
            _ => None,
        }
    }
}

/// How urgently a claim should be re-verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPriority {
    Low,
    Medium,
    High,
}

impl Default for ClaimPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl ClaimPriority {
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

/// One verifiable assertion tied to exactly one source page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Unique within one extraction run (`c_001`, `c_002`, ...).
    pub id: String,
    pub text: String,
    /// The page the claim references. Every claim has exactly one.
    pub source_page: String,
    pub category: ClaimCategory,
    pub priority: ClaimPriority,
    /// Where on the page the assertion was anchored (detail bubble,
    /// schedule row, note number). Free text, may be empty.
    #[serde(default)]
    pub source_anchor: String,
}

impl Claim {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        source_page: impl Into<String>,
        category: ClaimCategory,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_page: source_page.into(),
            category,
            priority: ClaimPriority::default(),
            source_anchor: String::new(),
        }
    }

    pub fn with_priority(mut self, priority: ClaimPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.source_anchor = anchor.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parsing() {
        assert_eq!(ClaimCategory::from_str("Dimensional"), Some(ClaimCategory::Dimensional));
        assert_eq!(ClaimCategory::from_str("model_part"), Some(ClaimCategory::ModelPart));
        assert_eq!(ClaimCategory::from_str("spec"), Some(ClaimCategory::Specification));
        // Out-of-taxonomy values are filtered, not coerced.
        assert_eq!(ClaimCategory::from_str("opinion"), None);
        assert_eq!(ClaimCategory::from_str(""), None);
    }

    #[test]
    fn test_priority_normalization() {
        assert_eq!(ClaimPriority::parse_or_default("HIGH"), ClaimPriority::High);
        assert_eq!(ClaimPriority::parse_or_default("nonsense"), ClaimPriority::Medium);
    }

    #[test]
    fn test_claim_builder() {
        let claim = Claim::new("c_001", "collar 14x10", "K-601", ClaimCategory::Dimensional)
            .with_priority(ClaimPriority::High)
            .with_anchor("hood schedule row 3");
        assert_eq!(claim.priority, ClaimPriority::High);
        assert_eq!(claim.source_anchor, "hood schedule row 3");
    }
}
