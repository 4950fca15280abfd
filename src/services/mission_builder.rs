use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::models::{Claim, Mission};
use crate::domain::ports::reasoning_agent::{RawMission, ReasoningAgent};

/// Batches claims into at most one vision mission per distinct page.
///
/// The reasoning agent drafts the plan and writes the per-page
/// instructions; if its plan is unusable, the deterministic grouping
/// below produces the same mission structure with synthesized
/// instructions. Either way the invariant holds: mission count never
/// exceeds the number of distinct source pages.
pub struct MissionBuilder {
    agent: Arc<dyn ReasoningAgent>,
}

impl MissionBuilder {
    pub fn new(agent: Arc<dyn ReasoningAgent>) -> Self {
        Self { agent }
    }

    #[instrument(skip_all, fields(claims = claims.len()))]
    pub async fn build(&self, claims: &[Claim]) -> Vec<Mission> {
        if claims.is_empty() {
            return Vec::new();
        }

        match self.agent.plan_missions(claims).await {
            Ok(raw) => match validate_plan(claims, raw) {
                Some(missions) => {
                    debug!(missions = missions.len(), "using agent mission plan");
                    missions
                }
                None => {
                    warn!("agent mission plan invalid, falling back to per-page grouping");
                    group_by_page(claims)
                }
            },
            Err(err) => {
                warn!(%err, "mission planning failed, falling back to per-page grouping");
                group_by_page(claims)
            }
        }
    }
}

/// Accept the agent plan only if it covers every claim exactly once,
/// keeps claims on their own pages, and stays within one mission per page.
fn validate_plan(claims: &[Claim], raw: Vec<RawMission>) -> Option<Vec<Mission>> {
    let pages: std::collections::BTreeSet<&str> =
        claims.iter().map(|c| c.source_page.as_str()).collect();
    if raw.is_empty() || raw.len() > pages.len() {
        return None;
    }

    let mut seen_claims = std::collections::BTreeSet::new();
    let mut seen_pages = std::collections::BTreeSet::new();
    let mut missions = Vec::new();

    for (index, raw_mission) in raw.into_iter().enumerate() {
        let target = raw_mission.target_page.trim();
        if !pages.contains(target) || !seen_pages.insert(target.to_string()) {
            return None;
        }
        if raw_mission.claim_ids.is_empty() || raw_mission.instruction.trim().is_empty() {
            return None;
        }

        for claim_id in &raw_mission.claim_ids {
            let claim = claims.iter().find(|c| &c.id == claim_id)?;
            if claim.source_page != target || !seen_claims.insert(claim_id.clone()) {
                return None;
            }
        }

        let id = if raw_mission.mission_id.trim().is_empty() {
            format!("m_{:03}", index + 1)
        } else {
            raw_mission.mission_id.trim().to_string()
        };

        missions.push(Mission {
            id,
            claim_ids: raw_mission.claim_ids,
            target_page: target.to_string(),
            instruction: raw_mission.instruction.trim().to_string(),
            expected_values: raw_mission.expected_values,
        });
    }

    if seen_claims.len() != claims.len() {
        return None;
    }

    Some(missions)
}

/// Deterministic fallback: one mission per page, instruction synthesized
/// from the claim texts.
fn group_by_page(claims: &[Claim]) -> Vec<Mission> {
    let mut by_page: BTreeMap<&str, Vec<&Claim>> = BTreeMap::new();
    for claim in claims {
        by_page.entry(claim.source_page.as_str()).or_default().push(claim);
    }

    by_page
        .into_iter()
        .enumerate()
        .map(|(index, (page, page_claims))| {
            let mut instruction = format!(
                "Verify the following assertions against page {page}. For each, report the actual value shown:"
            );
            let mut expected_values = BTreeMap::new();
            for claim in &page_claims {
                instruction.push_str(&format!("\n- [{}] {}", claim.id, claim.text));
                if !claim.source_anchor.is_empty() {
                    instruction.push_str(&format!(" (look near: {})", claim.source_anchor));
                }
                expected_values.insert(claim.id.clone(), claim.text.clone());
            }

            Mission {
                id: format!("m_{:03}", index + 1),
                claim_ids: page_claims.iter().map(|c| c.id.clone()).collect(),
                target_page: page.to_string(),
                instruction,
                expected_values,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ClaimCategory;

    fn claims() -> Vec<Claim> {
        vec![
            Claim::new("c_001", "collar is 14x10", "K-601", ClaimCategory::Dimensional),
            Claim::new("c_002", "hood model 5424", "K-601", ClaimCategory::ModelPart),
            Claim::new("c_003", "duct is stainless", "M-401", ClaimCategory::Material),
        ]
    }

    #[test]
    fn test_group_by_page_one_mission_per_page() {
        let missions = group_by_page(&claims());

        assert_eq!(missions.len(), 2);
        assert_eq!(missions[0].target_page, "K-601");
        assert_eq!(missions[0].claim_ids, vec!["c_001", "c_002"]);
        assert_eq!(missions[1].target_page, "M-401");
        assert!(missions[0].instruction.contains("collar is 14x10"));
        assert_eq!(missions[0].expected_values["c_002"], "hood model 5424");
    }

    #[test]
    fn test_validate_plan_accepts_good_plan() {
        let raw = vec![
            RawMission {
                mission_id: "m_001".to_string(),
                claim_ids: vec!["c_001".to_string(), "c_002".to_string()],
                target_page: "K-601".to_string(),
                instruction: "check the hood schedule".to_string(),
                expected_values: BTreeMap::new(),
            },
            RawMission {
                mission_id: "m_002".to_string(),
                claim_ids: vec!["c_003".to_string()],
                target_page: "M-401".to_string(),
                instruction: "check duct material".to_string(),
                expected_values: BTreeMap::new(),
            },
        ];

        let missions = validate_plan(&claims(), raw).unwrap();
        assert_eq!(missions.len(), 2);
    }

    #[test]
    fn test_validate_plan_rejects_claim_on_wrong_page() {
        let raw = vec![RawMission {
            mission_id: "m_001".to_string(),
            claim_ids: vec!["c_001".to_string(), "c_002".to_string(), "c_003".to_string()],
            target_page: "K-601".to_string(),
            instruction: "check everything".to_string(),
            expected_values: BTreeMap::new(),
        }];

        assert!(validate_plan(&claims(), raw).is_none());
    }

    #[test]
    fn test_validate_plan_rejects_missing_claims() {
        let raw = vec![RawMission {
            mission_id: "m_001".to_string(),
            claim_ids: vec!["c_001".to_string()],
            target_page: "K-601".to_string(),
            instruction: "partial check".to_string(),
            expected_values: BTreeMap::new(),
        }];

        assert!(validate_plan(&claims(), raw).is_none());
    }

    #[test]
    fn test_validate_plan_rejects_too_many_missions() {
        let raw = vec![
            RawMission {
                mission_id: "m_001".to_string(),
                claim_ids: vec!["c_001".to_string()],
                target_page: "K-601".to_string(),
                instruction: "first".to_string(),
                expected_values: BTreeMap::new(),
            },
            RawMission {
                mission_id: "m_002".to_string(),
                claim_ids: vec!["c_002".to_string()],
                target_page: "K-601".to_string(),
                instruction: "second on same page".to_string(),
                expected_values: BTreeMap::new(),
            },
            RawMission {
                mission_id: "m_003".to_string(),
                claim_ids: vec!["c_003".to_string()],
                target_page: "M-401".to_string(),
                instruction: "third".to_string(),
                expected_values: BTreeMap::new(),
            },
        ];

        assert!(validate_plan(&claims(), raw).is_none());
    }
}
