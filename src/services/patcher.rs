use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::error::PipelineError;
use crate::domain::models::config::{KnowledgeConfig, PatcherConfig};
use crate::domain::models::{Patch, PatchLayer, PatchMode, PatchOperation, Score};
use crate::domain::ports::audit_log::{AuditEvent, AuditLogRepository, AuditRecord};
use crate::domain::ports::reasoning_agent::RawPatch;
use crate::infrastructure::state::DocumentStore;
use crate::infrastructure::state::field_path;

/// File extensions a patch must never touch.
const PROTECTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "pdf", "db", "sqlite"];

/// Exact relative paths a patch must never touch.
const PROTECTED_PATHS: &[&str] = &["identity/persona.json"];

/// What one patch cycle did.
#[derive(Debug, Default)]
pub struct PatchReport {
    pub proposed: Vec<Patch>,
    pub applied: Vec<Patch>,
    pub errors: Vec<String>,
}

/// Applies validated patches to the state layers, audited and idempotent.
///
/// Every application appends to the audit log; a patch id already in
/// the log is skipped. Writes happen only in live mode; shadow mode
/// audits the proposal and leaves the documents alone. An audit append
/// failure aborts the cycle, the one fatal condition in the pipeline.
pub struct Patcher {
    store: DocumentStore,
    audit: Arc<dyn AuditLogRepository>,
    mode: PatchMode,
    knowledge_root: String,
    experience_root: String,
}

impl Patcher {
    pub fn new(
        store: DocumentStore,
        audit: Arc<dyn AuditLogRepository>,
        patcher_config: &PatcherConfig,
        knowledge_config: &KnowledgeConfig,
    ) -> Self {
        Self {
            store,
            audit,
            mode: patcher_config.mode,
            knowledge_root: knowledge_config.root.trim_end_matches('/').to_string(),
            experience_root: patcher_config
                .experience_root
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Validate raw agent proposals into ordered, applicable patches.
    ///
    /// Proposals tied to an unresolved conflict are dropped; proposals
    /// tied to a resolved conflict take the hierarchy winner's value
    /// regardless of what the agent proposed.
    pub fn prepare(&self, raw: Vec<RawPatch>, scores: &[Score]) -> Vec<Patch> {
        let mut patches = Vec::new();

        for (index, raw_patch) in raw.into_iter().enumerate() {
            let target = raw_patch.target.trim();
            let path = raw_patch.path.trim();
            if target.is_empty() || path.is_empty() {
                continue;
            }
            let Some(operation) = PatchOperation::from_str(&raw_patch.operation) else {
                debug!(operation = %raw_patch.operation, "dropping patch with unknown operation");
                continue;
            };
            if field_path::parse_path(path).is_err() {
                debug!(path, "dropping patch with unparseable field path");
                continue;
            }

            let score = scores.iter().find(|s| s.claim_id == raw_patch.claim_id);
            if score.is_some_and(Score::is_unresolved_conflict) {
                debug!(claim_id = %raw_patch.claim_id, "dropping patch for unresolved conflict");
                continue;
            }
            let new_value = score
                .and_then(|s| s.resolution.as_ref())
                .map_or(raw_patch.value, |r| r.winning_value.clone());

            let id = if raw_patch.patch_id.trim().is_empty() {
                format!("p_{:03}_{}", index + 1, raw_patch.claim_id.trim())
            } else {
                raw_patch.patch_id.trim().to_string()
            };

            patches.push(
                Patch::new(
                    id,
                    self.infer_layer(target),
                    target,
                    operation,
                    path,
                    new_value,
                )
                .with_reason(raw_patch.reason.trim())
                .with_claim(raw_patch.claim_id.trim()),
            );
        }

        // Knowledge first, then tool hints, then experience; stable
        // within a layer.
        patches.sort_by_key(|p| p.layer);
        patches
    }

    /// Apply prepared patches for one entry. Non-fatal problems are
    /// collected in the report; only an audit append failure errors out.
    #[instrument(skip_all, fields(entry_id, patches = patches.len()))]
    pub async fn apply(
        &self,
        entry_id: &str,
        patches: Vec<Patch>,
    ) -> Result<PatchReport, PipelineError> {
        let mut report = PatchReport::default();

        for mut patch in patches {
            // Idempotence: a patch id already in the log was handled by
            // an earlier run of this entry.
            if self.audit.contains(&patch.id).await? {
                debug!(patch_id = %patch.id, "patch already audited, skipping");
                continue;
            }

            if let Err(err) = self.check_target(&patch) {
                warn!(patch_id = %patch.id, %err, "patch rejected");
                self.audit_event(entry_id, AuditEvent::PatchRejected, &patch)
                    .await?;
                report.errors.push(err.to_string());
                continue;
            }

            match self.apply_one(entry_id, &mut patch).await {
                Ok(applied) => {
                    if applied {
                        report.applied.push(patch.clone());
                    }
                    report.proposed.push(patch);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(patch_id = %patch.id, %err, "patch failed");
                    report.errors.push(err.to_string());
                }
            }
        }

        info!(
            proposed = report.proposed.len(),
            applied = report.applied.len(),
            rejected = report.errors.len(),
            mode = self.mode.as_str(),
            "patch cycle finished"
        );
        Ok(report)
    }

    /// Record an unresolved conflict for each tied score, keyed so a
    /// replayed entry does not duplicate the record.
    pub async fn record_unresolved_conflicts(
        &self,
        entry_id: &str,
        scores: &[Score],
    ) -> Result<u64, PipelineError> {
        let mut recorded = 0;
        for score in scores.iter().filter(|s| s.is_unresolved_conflict()) {
            let record = AuditRecord {
                seq: 0,
                patch_id: format!("conflict_{entry_id}_{}", score.claim_id),
                entry_id: entry_id.to_string(),
                event: AuditEvent::ConflictUnresolved,
                layer: None,
                detail: serde_json::to_value(score)?,
                recorded_at: chrono::Utc::now(),
            };
            if self.audit.append(&record).await? {
                recorded += 1;
            }
        }
        Ok(recorded)
    }

    fn infer_layer(&self, target: &str) -> PatchLayer {
        if target.starts_with(&self.knowledge_root) {
            PatchLayer::Knowledge
        } else if target.starts_with(&self.experience_root) && target.contains("tool_hint") {
            PatchLayer::ToolHint
        } else {
            PatchLayer::Experience
        }
    }

    fn check_target(&self, patch: &Patch) -> Result<(), PipelineError> {
        let target = patch.target.as_str();

        if PROTECTED_PATHS.contains(&target) {
            return Err(PipelineError::ProtectedTarget {
                patch_id: patch.id.clone(),
                target: target.to_string(),
            });
        }
        let extension = target.rsplit('.').next().unwrap_or_default().to_lowercase();
        if PROTECTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(PipelineError::ProtectedTarget {
                patch_id: patch.id.clone(),
                target: target.to_string(),
            });
        }

        let in_knowledge = target.starts_with(&self.knowledge_root);
        let in_experience = target.starts_with(&self.experience_root);
        if !in_knowledge && !in_experience {
            return Err(PipelineError::DisallowedTarget {
                patch_id: patch.id.clone(),
                target: target.to_string(),
            });
        }

        Ok(())
    }

    async fn apply_one(&self, entry_id: &str, patch: &mut Patch) -> Result<bool, PipelineError> {
        let mut doc = self
            .store
            .read(&patch.target)
            .await?
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));

        let segments = field_path::parse_path(&patch.field_path)?;

        // Capture the prior value before any mutation so the patch is
        // reversible from its audit record alone.
        patch.prior_value = field_path::get_path(&doc, &segments).cloned();

        if self.mode == PatchMode::Shadow {
            self.audit_event(entry_id, AuditEvent::PatchProposed, patch)
                .await?;
            return Ok(false);
        }

        let changed = match patch.operation {
            PatchOperation::Set => {
                field_path::set_path(
                    &mut doc,
                    &patch.field_path,
                    &segments,
                    patch.new_value.clone(),
                )?;
                true
            }
            PatchOperation::AppendUnique => field_path::append_unique(
                &mut doc,
                &patch.field_path,
                &segments,
                patch.new_value.clone(),
            )?,
        };

        if changed {
            self.store.write_atomic(&patch.target, &doc).await?;
        }
        self.audit_event(entry_id, AuditEvent::PatchApplied, patch)
            .await?;
        Ok(changed)
    }

    async fn audit_event(
        &self,
        entry_id: &str,
        event: AuditEvent,
        patch: &Patch,
    ) -> Result<(), PipelineError> {
        let record = AuditRecord::for_patch(entry_id, event, patch);
        self.audit.append(&record).await?;
        Ok(())
    }
}
