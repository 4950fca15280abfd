use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::error::PipelineError;
use crate::domain::models::config::WorkerConfig;
use crate::domain::models::{EntryPayload, QueueEntry, RunOutcome, ToolCall};
use crate::domain::ports::queue_repository::QueueRepository;
use crate::domain::ports::reasoning_agent::ReasoningAgent;
use crate::domain::ports::status_reporter::StatusReporter;
use crate::services::dispatcher::VisionDispatcher;
use crate::services::extractor::ClaimExtractor;
use crate::services::mission_builder::MissionBuilder;
use crate::services::patcher::Patcher;
use crate::services::scorer::Scorer;

/// Phrases that mark a user message as an explicit correction rather
/// than a new question. Matched case-insensitively on whole words.
const CORRECTION_MARKERS: &[&str] = &[
    "that's wrong",
    "thats wrong",
    "that is wrong",
    "that's incorrect",
    "that is incorrect",
    "not correct",
    "no, it",
    "no, that",
    "no it's",
    "no that's",
    "actually it",
    "actually the",
    "actually no",
    "should be",
    "it's actually",
    "you're wrong",
    "wrong page",
    "wrong value",
];

/// Whether a feedback message explicitly corrects a prior answer.
///
/// Only explicit corrections trigger an audit run; ordinary follow-up
/// questions do not.
pub fn is_explicit_correction(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CORRECTION_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Pull page references out of recorded tool calls: the page a tool was
/// asked about, and the page its result named.
pub fn relevant_pages_from_tool_calls(tool_calls: &[ToolCall]) -> Vec<String> {
    let mut pages = Vec::new();
    let mut push = |value: Option<&Value>| {
        if let Some(page) = value.and_then(Value::as_str) {
            let page = page.trim();
            if !page.is_empty() && !pages.iter().any(|p| p == page) {
                pages.push(page.to_string());
            }
        }
    };

    for call in tool_calls {
        push(call.args.get("page_name"));
        push(call.args.get("source_page"));
        push(call.result.get("page_name"));
    }

    pages
}

/// The single queue consumer: claims entries one at a time and runs the
/// full audit pipeline over each.
pub struct Worker {
    queue: Arc<dyn QueueRepository>,
    agent: Arc<dyn ReasoningAgent>,
    status: Arc<dyn StatusReporter>,
    extractor: ClaimExtractor,
    mission_builder: MissionBuilder,
    dispatcher: VisionDispatcher,
    scorer: Scorer,
    patcher: Patcher,
    config: WorkerConfig,
    cancel: Arc<AtomicBool>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<dyn QueueRepository>,
        agent: Arc<dyn ReasoningAgent>,
        status: Arc<dyn StatusReporter>,
        extractor: ClaimExtractor,
        mission_builder: MissionBuilder,
        dispatcher: VisionDispatcher,
        scorer: Scorer,
        patcher: Patcher,
        config: WorkerConfig,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            queue,
            agent,
            status,
            extractor,
            mission_builder,
            dispatcher,
            scorer,
            patcher,
            config,
            cancel,
        }
    }

    /// Enqueue a workspace-activity trigger.
    pub async fn submit_workspace_trigger(
        queue: &dyn QueueRepository,
        workspace_slug: impl Into<String>,
        snapshot: Value,
        user_message: impl Into<String>,
        assistant_response: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Result<QueueEntry, PipelineError> {
        let entry = QueueEntry::new(EntryPayload::Workspace {
            workspace_slug: workspace_slug.into(),
            snapshot,
            user_message: user_message.into(),
            assistant_response: assistant_response.into(),
            tool_calls,
        });
        queue.enqueue(&entry).await?;
        info!(entry_id = %entry.id, "workspace trigger enqueued");
        Ok(entry)
    }

    /// Enqueue a feedback trigger if the message is an explicit
    /// correction. Returns `None` for ordinary follow-ups.
    pub async fn submit_feedback_trigger(
        queue: &dyn QueueRepository,
        user_text: impl Into<String>,
        prior_answer_context: impl Into<String>,
        prior_tool_calls: Vec<ToolCall>,
    ) -> Result<Option<QueueEntry>, PipelineError> {
        let user_text = user_text.into();
        if !is_explicit_correction(&user_text) {
            debug!("feedback is not an explicit correction, not enqueued");
            return Ok(None);
        }

        let relevant_pages = relevant_pages_from_tool_calls(&prior_tool_calls);
        let entry = QueueEntry::new(EntryPayload::Feedback {
            user_text,
            prior_answer_context: prior_answer_context.into(),
            prior_tool_calls,
            relevant_pages,
        });
        queue.enqueue(&entry).await?;
        info!(entry_id = %entry.id, "feedback trigger enqueued");
        Ok(Some(entry))
    }

    /// Claim and process at most one entry. Returns whether an entry
    /// was processed.
    #[instrument(skip_all)]
    pub async fn run_once(&self) -> Result<bool, PipelineError> {
        let Some(entry) = self.queue.claim_next().await? else {
            return Ok(false);
        };

        info!(entry_id = %entry.id, kind = entry.kind.as_str(), "processing entry");
        self.status
            .publish(
                "auditing recent activity",
                Some(json!({"entry_id": entry.id, "stage": "extract"})),
            )
            .await?;

        let outcome = match self.run_pipeline(&entry).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                // Finalize rather than leaving the entry processing until
                // stall recovery; the failure is preserved in the outcome.
                warn!(entry_id = %entry.id, %err, "pipeline failed, completing with error");
                RunOutcome {
                    errors: vec![err.to_string()],
                    ..RunOutcome::default()
                }
            }
        };
        self.queue.complete(&entry.id, &outcome).await?;

        let counts = outcome.score_counts();
        info!(entry_id = %entry.id, %counts, "entry finished");
        self.status
            .publish(
                &format!("audit complete: {counts}"),
                Some(json!({
                    "entry_id": entry.id,
                    "stage": "done",
                    "patches_applied": outcome.patches_applied.len(),
                })),
            )
            .await?;

        Ok(true)
    }

    async fn run_pipeline(&self, entry: &QueueEntry) -> Result<RunOutcome, PipelineError> {
        let claims = self.extractor.extract(&entry.payload).await;
        if claims.is_empty() {
            // Nothing verifiable in the trigger; the run is a no-op.
            debug!(entry_id = %entry.id, "no verifiable claims, completing as no-op");
            return Ok(RunOutcome::default());
        }

        let mut errors = Vec::new();

        let mission_plan = self.mission_builder.build(&claims).await;
        self.status
            .publish(
                &format!("verifying {} pages", mission_plan.len()),
                Some(json!({"entry_id": entry.id, "stage": "dispatch"})),
            )
            .await?;

        let mission_results = self.dispatcher.dispatch(&mission_plan).await;
        for result in mission_results.iter().filter(|r| r.is_failed()) {
            errors.push(format!(
                "mission {} failed: {}",
                result.mission_id,
                result.error.as_deref().unwrap_or("unknown")
            ));
        }

        self.status
            .publish(
                &format!("scoring {} claims", claims.len()),
                Some(json!({"entry_id": entry.id, "stage": "score"})),
            )
            .await?;
        let scores = self.scorer.score(&claims, &mission_results).await;

        self.patcher
            .record_unresolved_conflicts(&entry.id, &scores)
            .await?;

        let raw_patches = match self
            .agent
            .propose_patches(&claims, &mission_results, &scores)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "patch proposal failed, no patches this run");
                errors.push(format!("patch proposal failed: {err}"));
                Vec::new()
            }
        };

        let patches = self.patcher.prepare(raw_patches, &scores);
        if !patches.is_empty() {
            self.status
                .publish(
                    &format!("applying {} patches", patches.len()),
                    Some(json!({"entry_id": entry.id, "stage": "patch"})),
                )
                .await?;
        }
        let report = self.patcher.apply(&entry.id, patches).await?;
        errors.extend(report.errors);

        Ok(RunOutcome {
            claims,
            mission_plan,
            mission_results,
            scores,
            patches_proposed: report.proposed,
            patches_applied: report.applied,
            errors,
        })
    }

    /// Run until cancelled: recover stalled entries, then poll the
    /// queue, sleeping when idle.
    pub async fn run_forever(&self) -> Result<(), PipelineError> {
        let recovered = self.queue.recover(self.config.stall_minutes).await?;
        if recovered > 0 {
            info!(recovered, "recovered stalled entries at startup");
        }

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                info!("worker cancelled, shutting down");
                break;
            }

            match self.run_once().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::time::sleep(Duration::from_secs(self.config.poll_seconds)).await;
                }
                Err(err) if err.is_fatal() => {
                    error!(%err, "fatal pipeline error, stopping worker");
                    self.status.clear().await?;
                    return Err(err);
                }
                Err(err) => {
                    warn!(%err, "run failed, continuing");
                    tokio::time::sleep(Duration::from_secs(self.config.poll_seconds)).await;
                }
            }
        }

        self.status.clear().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explicit_corrections_detected() {
        assert!(is_explicit_correction("No, that's wrong, the collar is 14x10"));
        assert!(is_explicit_correction("Actually the hood mounts at 64 AFF"));
        assert!(is_explicit_correction("It should be 16 gauge per the detail"));
        assert!(is_explicit_correction("THAT IS INCORRECT"));
    }

    #[test]
    fn test_followup_questions_not_corrections() {
        assert!(!is_explicit_correction("What about the exhaust duct?"));
        assert!(!is_explicit_correction("Can you check K-601 again?"));
        assert!(!is_explicit_correction("Thanks, looks right"));
    }

    #[test]
    fn test_relevant_pages_from_tool_calls() {
        let calls = vec![
            ToolCall {
                name: "get_summary".to_string(),
                args: json!({"page_name": "K-601"}),
                result: json!({"page_name": "K-601", "summary": "..."}),
            },
            ToolCall {
                name: "search".to_string(),
                args: json!({"query": "hood collar"}),
                result: json!({"page_name": "M-401"}),
            },
            ToolCall {
                name: "get_region".to_string(),
                args: json!({"source_page": "K-601", "region_id": "r3"}),
                result: json!(null),
            },
        ];

        let pages = relevant_pages_from_tool_calls(&calls);
        assert_eq!(pages, vec!["K-601".to_string(), "M-401".to_string()]);
    }

    #[test]
    fn test_relevant_pages_empty_calls() {
        assert!(relevant_pages_from_tool_calls(&[]).is_empty());
    }
}
