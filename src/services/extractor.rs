use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::models::{Claim, ClaimCategory, ClaimPriority, EntryPayload};
use crate::domain::ports::reasoning_agent::{RawClaim, ReasoningAgent};

/// Turns a trigger payload into validated, deduplicated claims.
///
/// The reasoning agent proposes raw claims; everything out of taxonomy,
/// missing a source page, or duplicated is dropped here. An agent
/// failure degrades to an empty claim list, which the worker treats as
/// a no-op run.
pub struct ClaimExtractor {
    agent: Arc<dyn ReasoningAgent>,
}

impl ClaimExtractor {
    pub fn new(agent: Arc<dyn ReasoningAgent>) -> Self {
        Self { agent }
    }

    #[instrument(skip_all)]
    pub async fn extract(&self, payload: &EntryPayload) -> Vec<Claim> {
        let raw = match self.agent.extract_claims(payload).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "claim extraction failed, treating run as no-op");
                return Vec::new();
            }
        };

        let claims = normalize_claims(raw);
        debug!(count = claims.len(), "extraction produced claims");
        claims
    }
}

/// Validate and normalize raw agent output into domain claims.
pub fn normalize_claims(raw: Vec<RawClaim>) -> Vec<Claim> {
    let mut claims: Vec<Claim> = Vec::new();

    for (index, raw_claim) in raw.into_iter().enumerate() {
        let text = raw_claim.text.trim();
        let source_page = raw_claim.source_page.trim();
        if text.is_empty() || source_page.is_empty() {
            continue;
        }

        // Out-of-taxonomy categories mark unverifiable statements.
        let Some(category) = ClaimCategory::from_str(&raw_claim.claim_type) else {
            debug!(claim_type = %raw_claim.claim_type, "dropping out-of-taxonomy claim");
            continue;
        };

        let duplicate = claims
            .iter()
            .any(|c| c.text == text && c.source_page == source_page);
        if duplicate {
            continue;
        }

        let id = if raw_claim.claim_id.trim().is_empty() {
            format!("c_{:03}", index + 1)
        } else {
            raw_claim.claim_id.trim().to_string()
        };

        claims.push(
            Claim::new(id, text, source_page, category)
                .with_priority(ClaimPriority::parse_or_default(
                    &raw_claim.verification_priority,
                ))
                .with_anchor(raw_claim.source_anchor.trim()),
        );
    }

    claims
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, text: &str, page: &str, claim_type: &str) -> RawClaim {
        RawClaim {
            claim_id: id.to_string(),
            text: text.to_string(),
            source_page: page.to_string(),
            claim_type: claim_type.to_string(),
            verification_priority: "high".to_string(),
            source_anchor: String::new(),
        }
    }

    #[test]
    fn test_normalize_filters_invalid() {
        let claims = normalize_claims(vec![
            raw("c_001", "collar is 14x10", "K-601", "dimensional"),
            raw("c_002", "", "K-601", "dimensional"),
            raw("c_003", "no page", "", "dimensional"),
            raw("c_004", "nice drawing", "K-601", "opinion"),
        ]);

        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].id, "c_001");
        assert_eq!(claims[0].priority, ClaimPriority::High);
    }

    #[test]
    fn test_normalize_deduplicates() {
        let claims = normalize_claims(vec![
            raw("c_001", "collar is 14x10", "K-601", "dimensional"),
            raw("c_002", "collar is 14x10", "K-601", "dimensional"),
            raw("c_003", "collar is 14x10", "M-401", "dimensional"),
        ]);

        // Same text on a different page is a distinct claim.
        assert_eq!(claims.len(), 2);
    }

    #[test]
    fn test_normalize_assigns_missing_ids() {
        let claims = normalize_claims(vec![raw("", "hood model 5424", "K-601", "model_part")]);
        assert_eq!(claims[0].id, "c_001");
    }
}
