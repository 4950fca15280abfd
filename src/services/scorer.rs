use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::models::{
    Claim, Confidence, ConflictCandidate, Resolution, Score, ScoreCategory, VerificationResult,
};
use crate::domain::ports::reasoning_agent::{RawScore, ReasoningAgent};

/// Classifies each claim's verification outcome.
///
/// The reasoning agent judges verified/corrected/enriched/ungrounded/
/// conflict, but conflict resolution is never delegated to it: the
/// fixed source-authority hierarchy decides the winner here, and an
/// equal-rank tie stays unresolved rather than being broken by
/// first-seen order or any other accident of iteration.
pub struct Scorer {
    agent: Arc<dyn ReasoningAgent>,
}

impl Scorer {
    pub fn new(agent: Arc<dyn ReasoningAgent>) -> Self {
        Self { agent }
    }

    #[instrument(skip_all, fields(claims = claims.len()))]
    pub async fn score(&self, claims: &[Claim], results: &[VerificationResult]) -> Vec<Score> {
        if claims.is_empty() {
            return Vec::new();
        }

        let raw = match self.agent.score_claims(claims, results).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "scoring agent failed, using fallback scores");
                Vec::new()
            }
        };

        let scores = assemble_scores(claims, results, raw);
        debug!(scores = scores.len(), "scoring finished");
        scores
    }
}

/// Build exactly one score per claim: the agent's judgment where valid,
/// the deterministic fallback otherwise.
fn assemble_scores(
    claims: &[Claim],
    results: &[VerificationResult],
    raw: Vec<RawScore>,
) -> Vec<Score> {
    claims
        .iter()
        .map(|claim| {
            let raw_score = raw.iter().find(|r| r.claim_id == claim.id);
            match raw_score.and_then(|r| validate_score(claim, r)) {
                Some(score) => resolve_conflict(score),
                None => fallback_score(claim, results),
            }
        })
        .collect()
}

fn validate_score(claim: &Claim, raw: &RawScore) -> Option<Score> {
    let category = ScoreCategory::from_str(&raw.score)?;

    let mut score = Score::new(&claim.id, category)
        .with_found(raw.vision_found.trim())
        .with_confidence(Confidence::parse_or_default(&raw.confidence))
        .with_rationale(raw.rationale.trim());

    score.conflict_candidates = raw
        .conflict_candidates
        .iter()
        .filter(|c| !c.source.trim().is_empty())
        .map(|c| ConflictCandidate::new(c.source.trim(), c.value.clone()))
        .collect();

    // A conflict claim needs at least two disagreeing sources.
    if category == ScoreCategory::Conflict && score.conflict_candidates.len() < 2 {
        return None;
    }

    Some(score)
}

/// Fallback when the agent gave no usable judgment for a claim: a claim
/// whose mission failed is ungrounded, an unverifiable claim (no mission
/// covered it) is ungrounded, and anything with successful findings is
/// provisionally verified at low confidence.
fn fallback_score(claim: &Claim, results: &[VerificationResult]) -> Score {
    let result = results
        .iter()
        .find(|r| r.claim_ids.iter().any(|id| id == &claim.id));

    match result {
        Some(result) if !result.is_failed() => Score::new(&claim.id, ScoreCategory::Verified)
            .with_found(result.findings.clone())
            .with_confidence(Confidence::Low)
            .with_rationale("no agent judgment; findings present"),
        Some(result) => Score::new(&claim.id, ScoreCategory::Ungrounded)
            .with_confidence(Confidence::Low)
            .with_rationale(format!(
                "verification unavailable: {}",
                result.error.as_deref().unwrap_or("mission failed")
            )),
        None => Score::new(&claim.id, ScoreCategory::Ungrounded)
            .with_confidence(Confidence::Low)
            .with_rationale("no mission covered this claim"),
    }
}

/// Apply the source-authority hierarchy to a conflict score.
///
/// A unique highest-rank candidate wins and the losers are recorded.
/// Equal ranks at the top leave the conflict unresolved: no resolution,
/// no action taken, surfaced for review.
pub fn resolve_conflict(mut score: Score) -> Score {
    if score.category != ScoreCategory::Conflict {
        return score;
    }

    let Some(best_rank) = score
        .conflict_candidates
        .iter()
        .map(|c| c.kind.rank())
        .max()
    else {
        return score;
    };

    let top: Vec<&ConflictCandidate> = score
        .conflict_candidates
        .iter()
        .filter(|c| c.kind.rank() == best_rank)
        .collect();

    if top.len() == 1 {
        let winner = top[0];
        let losing_sources = score
            .conflict_candidates
            .iter()
            .filter(|c| c.source != winner.source)
            .map(|c| c.source.clone())
            .collect();

        score.resolution = Some(Resolution {
            method: "source_hierarchy".to_string(),
            winning_kind: winner.kind,
            winning_value: winner.value.clone(),
            losing_sources,
        });
        score.action_taken = Some("resolved_by_source_hierarchy".to_string());
    } else {
        debug!(claim_id = %score.claim_id, "equal-rank conflict left unresolved");
        score.resolution = None;
        score.action_taken = None;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ClaimCategory, Mission};
    use crate::domain::ports::reasoning_agent::RawConflictCandidate;
    use serde_json::json;

    fn claim(id: &str, page: &str) -> Claim {
        Claim::new(id, "collar is 14x10", page, ClaimCategory::Dimensional)
    }

    fn ok_result(mission_id: &str, claim_ids: &[&str], page: &str) -> VerificationResult {
        let mut mission = Mission::new(mission_id, page);
        mission.claim_ids = claim_ids.iter().map(|s| (*s).to_string()).collect();
        VerificationResult::ok(&mission, "collar reads 14x10 at detail 3", Vec::new())
    }

    fn failed_result(mission_id: &str, claim_ids: &[&str], page: &str) -> VerificationResult {
        let mut mission = Mission::new(mission_id, page);
        mission.claim_ids = claim_ids.iter().map(|s| (*s).to_string()).collect();
        VerificationResult::failed(&mission, "vision call exhausted retries")
    }

    fn conflict_raw(claim_id: &str, candidates: Vec<(&str, serde_json::Value)>) -> RawScore {
        RawScore {
            claim_id: claim_id.to_string(),
            score: "conflict".to_string(),
            vision_found: "two different values".to_string(),
            confidence: "high".to_string(),
            rationale: "schedule and detail disagree".to_string(),
            conflict_candidates: candidates
                .into_iter()
                .map(|(source, value)| RawConflictCandidate {
                    source: source.to_string(),
                    value,
                })
                .collect(),
        }
    }

    #[test]
    fn test_hierarchy_picks_detail_over_schedule() {
        let raw = conflict_raw(
            "c_001",
            vec![
                ("hood schedule K-601", json!("14x8")),
                ("detail 3/K-601", json!("14x10")),
            ],
        );
        let score = validate_score(&claim("c_001", "K-601"), &raw).unwrap();
        let score = resolve_conflict(score);

        let resolution = score.resolution.unwrap();
        assert_eq!(resolution.method, "source_hierarchy");
        assert_eq!(resolution.winning_value, json!("14x10"));
        assert_eq!(resolution.losing_sources, vec!["hood schedule K-601"]);
        assert_eq!(
            score.action_taken.as_deref(),
            Some("resolved_by_source_hierarchy")
        );
    }

    #[test]
    fn test_equal_rank_conflict_stays_unresolved() {
        let raw = conflict_raw(
            "c_001",
            vec![
                ("hood schedule K-601", json!("14x8")),
                ("equipment schedule K-602", json!("14x10")),
            ],
        );
        let score = validate_score(&claim("c_001", "K-601"), &raw).unwrap();
        let score = resolve_conflict(score);

        assert!(score.is_unresolved_conflict());
        assert!(score.action_taken.is_none());
    }

    #[test]
    fn test_conflict_with_one_candidate_rejected() {
        let raw = conflict_raw("c_001", vec![("detail 3", json!("14x10"))]);
        assert!(validate_score(&claim("c_001", "K-601"), &raw).is_none());
    }

    #[test]
    fn test_fallback_failed_mission_is_ungrounded() {
        let claims = vec![claim("c_001", "K-601")];
        let results = vec![failed_result("m_001", &["c_001"], "K-601")];

        let scores = assemble_scores(&claims, &results, Vec::new());

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].category, ScoreCategory::Ungrounded);
        assert_eq!(scores[0].confidence, Confidence::Low);
        assert!(scores[0].rationale.contains("exhausted retries"));
    }

    #[test]
    fn test_fallback_ok_mission_is_low_confidence_verified() {
        let claims = vec![claim("c_001", "K-601")];
        let results = vec![ok_result("m_001", &["c_001"], "K-601")];

        let scores = assemble_scores(&claims, &results, Vec::new());

        assert_eq!(scores[0].category, ScoreCategory::Verified);
        assert_eq!(scores[0].confidence, Confidence::Low);
    }

    #[test]
    fn test_one_score_per_claim_even_with_garbage_agent_output() {
        let claims = vec![claim("c_001", "K-601"), claim("c_002", "K-601")];
        let results = vec![ok_result("m_001", &["c_001", "c_002"], "K-601")];
        let raw = vec![RawScore {
            claim_id: "c_001".to_string(),
            score: "amazing".to_string(),
            ..RawScore::default()
        }];

        let scores = assemble_scores(&claims, &results, raw);

        assert_eq!(scores.len(), 2);
        // Invalid category falls back rather than being coerced.
        assert_eq!(scores[0].category, ScoreCategory::Verified);
    }
}
