//! Patch domain model.
//!
//! A patch is one reversible mutation to a single field of one state
//! document. Patches are created by the patcher, never mutated, and each
//! application is followed by an append to the immutable audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three ordered state layers a patch may target.
///
/// Application order within a run is always knowledge, then tool hints,
/// then experience: hint and lesson writes must reflect the corrected
/// knowledge, not the stale version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchLayer {
    /// Raw knowledge extracted from the documents.
    Knowledge,
    /// Behavioral hints for tool usage.
    ToolHint,
    /// Distilled long-term lessons.
    Experience,
}

impl PatchLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::ToolHint => "tool_hint",
            Self::Experience => "experience",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "knowledge" => Some(Self::Knowledge),
            "tool_hint" => Some(Self::ToolHint),
            "experience" => Some(Self::Experience),
            _ => None,
        }
    }
}

/// Supported field mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOperation {
    /// Replace the value at the field path. Prior value is recorded.
    Set,
    /// Append to a list at the field path if not already present.
    /// A pure addition, so the prior value may be omitted.
    AppendUnique,
}

impl PatchOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::AppendUnique => "append_unique",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "set" => Some(Self::Set),
            "append_unique" | "append" => Some(Self::AppendUnique),
            _ => None,
        }
    }

    /// Pure appends never replace existing data.
    pub fn is_pure_append(&self) -> bool {
        matches!(self, Self::AppendUnique)
    }
}

/// Whether patches are applied or only proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchMode {
    /// Propose and audit, but write nothing. The safe default.
    Shadow,
    /// Apply writes to the state layers.
    Live,
}

impl Default for PatchMode {
    fn default() -> Self {
        Self::Shadow
    }
}

impl PatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shadow => "shadow",
            Self::Live => "live",
        }
    }

    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "live" => Self::Live,
            _ => Self::Shadow,
        }
    }
}

/// One reversible state mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Unique patch identifier; also the idempotency key.
    pub id: String,
    pub layer: PatchLayer,
    /// Document path relative to the state root.
    pub target: String,
    pub operation: PatchOperation,
    /// Dotted path within the document ("pages.k_601.collar_size").
    pub field_path: String,
    /// Value before the write. `None` only for pure appends or fields
    /// that did not exist.
    pub prior_value: Option<Value>,
    pub new_value: Value,
    pub reason: String,
    /// The claim whose score produced this patch.
    pub claim_id: String,
    pub created_at: DateTime<Utc>,
}

impl Patch {
    pub fn new(
        id: impl Into<String>,
        layer: PatchLayer,
        target: impl Into<String>,
        operation: PatchOperation,
        field_path: impl Into<String>,
        new_value: Value,
    ) -> Self {
        Self {
            id: id.into(),
            layer,
            target: target.into(),
            operation,
            field_path: field_path.into(),
            prior_value: None,
            new_value,
            reason: String::new(),
            claim_id: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_claim(mut self, claim_id: impl Into<String>) -> Self {
        self.claim_id = claim_id.into();
        self
    }

    pub fn with_prior_value(mut self, prior: Option<Value>) -> Self {
        self.prior_value = prior;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layer_ordering() {
        // Ord derives from declaration order; the patcher relies on it.
        assert!(PatchLayer::Knowledge < PatchLayer::ToolHint);
        assert!(PatchLayer::ToolHint < PatchLayer::Experience);
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!(PatchOperation::from_str("set"), Some(PatchOperation::Set));
        assert_eq!(PatchOperation::from_str("append_unique"), Some(PatchOperation::AppendUnique));
        assert_eq!(PatchOperation::from_str("delete"), None);
    }

    #[test]
    fn test_patch_mode_defaults_shadow() {
        assert_eq!(PatchMode::default(), PatchMode::Shadow);
        assert_eq!(PatchMode::parse_or_default("LIVE"), PatchMode::Live);
        assert_eq!(PatchMode::parse_or_default("anything"), PatchMode::Shadow);
    }

    #[test]
    fn test_patch_builder() {
        let patch = Patch::new(
            "p_001",
            PatchLayer::Knowledge,
            "knowledge_store/k_601/pass1.json",
            PatchOperation::Set,
            "index.hood_collar",
            json!("14x8"),
        )
        .with_reason("detail sheet overrides schedule")
        .with_claim("c_001")
        .with_prior_value(Some(json!("14x10")));

        assert_eq!(patch.prior_value, Some(json!("14x10")));
        assert_eq!(patch.claim_id, "c_001");
    }
}
