//! Property tests for the source-authority conflict resolver.

use proptest::prelude::*;
use serde_json::json;

use redline::domain::models::{ConflictCandidate, Score, ScoreCategory};
use redline::services::scorer::resolve_conflict;

const SOURCE_LABELS: &[&str] = &[
    "detail 3/A-501",
    "enlarged plan 2/A-402",
    "door schedule on A-601",
    "general notes sheet G-001",
    "spec section 051200",
];

fn conflict_score(candidates: Vec<ConflictCandidate>) -> Score {
    let mut score = Score::new("c_001", ScoreCategory::Conflict);
    score.conflict_candidates = candidates;
    score
}

fn candidate_strategy() -> impl Strategy<Value = ConflictCandidate> {
    (0..SOURCE_LABELS.len(), 0u32..1000).prop_map(|(kind_idx, value)| {
        ConflictCandidate::new(SOURCE_LABELS[kind_idx], json!(format!("value-{value}")))
    })
}

proptest! {
    /// The resolution outcome does not depend on candidate order.
    #[test]
    fn prop_resolution_is_order_invariant(
        candidates in proptest::collection::vec(candidate_strategy(), 2..6)
    ) {
        let forward = resolve_conflict(conflict_score(candidates.clone()));

        let mut reversed_candidates = candidates;
        reversed_candidates.reverse();
        let reversed = resolve_conflict(conflict_score(reversed_candidates));

        prop_assert_eq!(
            forward.resolution.is_some(),
            reversed.resolution.is_some()
        );
        if let (Some(f), Some(r)) = (&forward.resolution, &reversed.resolution) {
            prop_assert_eq!(&f.winning_kind, &r.winning_kind);
            prop_assert_eq!(&f.winning_value, &r.winning_value);
        }
    }

    /// When a resolution exists, the winner strictly outranks every
    /// other candidate; ties at the top rank never resolve.
    #[test]
    fn prop_winner_strictly_outranks_losers(
        candidates in proptest::collection::vec(candidate_strategy(), 2..6)
    ) {
        let top_rank = candidates.iter().map(|c| c.kind.rank()).max().unwrap();
        let top_count = candidates
            .iter()
            .filter(|c| c.kind.rank() == top_rank)
            .count();

        let score = resolve_conflict(conflict_score(candidates));

        match &score.resolution {
            Some(resolution) => {
                prop_assert_eq!(top_count, 1);
                prop_assert_eq!(resolution.winning_kind.rank(), top_rank);
                prop_assert_eq!(
                    score.action_taken.as_deref(),
                    Some("resolved_by_source_hierarchy")
                );
            }
            None => {
                prop_assert!(top_count > 1);
                prop_assert!(score.action_taken.is_none());
            }
        }
    }

    /// Resolution never touches non-conflict scores.
    #[test]
    fn prop_non_conflict_scores_pass_through(
        candidates in proptest::collection::vec(candidate_strategy(), 0..4)
    ) {
        let mut score = Score::new("c_001", ScoreCategory::Verified);
        score.conflict_candidates = candidates;
        let resolved = resolve_conflict(score.clone());
        prop_assert_eq!(resolved, score);
    }
}
