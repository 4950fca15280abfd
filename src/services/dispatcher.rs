use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{info, instrument, warn};

use crate::domain::models::config::WorkerConfig;
use crate::domain::models::{Mission, VerificationResult};
use crate::domain::ports::knowledge_reader::KnowledgeReader;
use crate::domain::ports::vision_agent::VisionAgent;

/// Fans missions out to the vision agent.
///
/// Concurrency is bounded, every call carries its own timeout, and the
/// whole dispatch phase runs under a run deadline. A mission failure is
/// never fatal: it becomes a failed `VerificationResult` whose claims
/// score ungrounded downstream. Exactly one result comes back per
/// mission, in mission order.
pub struct VisionDispatcher {
    vision: Arc<dyn VisionAgent>,
    knowledge: Arc<dyn KnowledgeReader>,
    concurrency: usize,
    mission_timeout: Duration,
    run_deadline: Duration,
    cancel: Arc<AtomicBool>,
}

impl VisionDispatcher {
    pub fn new(
        vision: Arc<dyn VisionAgent>,
        knowledge: Arc<dyn KnowledgeReader>,
        config: &WorkerConfig,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            vision,
            knowledge,
            concurrency: config.mission_concurrency,
            mission_timeout: Duration::from_secs(config.mission_timeout_seconds),
            run_deadline: Duration::from_secs(config.run_deadline_seconds),
            cancel,
        }
    }

    #[instrument(skip_all, fields(missions = missions.len()))]
    pub async fn dispatch(&self, missions: &[Mission]) -> Vec<VerificationResult> {
        if missions.is_empty() {
            return Vec::new();
        }

        let deadline = Instant::now() + self.run_deadline;

        let mut finished: BTreeMap<String, VerificationResult> = BTreeMap::new();
        let mut stream = futures::stream::iter(missions.iter().map(|m| self.run_mission(m, deadline)))
            .buffer_unordered(self.concurrency);

        // Results past the run deadline are synthesized as failures for
        // whatever is still in flight.
        loop {
            match timeout_at(deadline, stream.next()).await {
                Ok(Some(result)) => {
                    finished.insert(result.mission_id.clone(), result);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("run deadline reached with missions still in flight");
                    break;
                }
            }
        }
        drop(stream);

        let results: Vec<VerificationResult> = missions
            .iter()
            .map(|mission| {
                finished.remove(&mission.id).unwrap_or_else(|| {
                    VerificationResult::failed(mission, "run deadline exceeded")
                })
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_failed()).count();
        info!(
            total = results.len(),
            failed, "vision dispatch finished"
        );
        results
    }

    async fn run_mission(&self, mission: &Mission, deadline: Instant) -> VerificationResult {
        if self.cancel.load(Ordering::SeqCst) {
            return VerificationResult::failed(mission, "run cancelled");
        }
        if Instant::now() >= deadline {
            return VerificationResult::failed(mission, "run deadline exceeded");
        }

        let page = match self.knowledge.resolve_page(&mission.target_page).await {
            Ok(Some(page)) => page,
            Ok(None) => {
                return VerificationResult::failed(
                    mission,
                    format!("page not found: {}", mission.target_page),
                );
            }
            Err(err) => {
                return VerificationResult::failed(
                    mission,
                    format!("page lookup failed: {err}"),
                );
            }
        };

        let image = match self.knowledge.page_image(&page).await {
            Ok(Some(image)) => image,
            Ok(None) => {
                return VerificationResult::failed(
                    mission,
                    format!("no rendered image for page: {page}"),
                );
            }
            Err(err) => {
                return VerificationResult::failed(mission, format!("image load failed: {err}"));
            }
        };

        let call = self
            .vision
            .verify(&image, &mission.instruction, &mission.expected_values);

        match timeout(self.mission_timeout, call).await {
            Ok(Ok(findings)) => VerificationResult::ok(mission, findings.findings, findings.trace),
            Ok(Err(err)) => {
                warn!(mission_id = %mission.id, %err, "vision verification failed");
                VerificationResult::failed(mission, err.to_string())
            }
            Err(_) => {
                warn!(mission_id = %mission.id, "vision call timed out");
                VerificationResult::failed(
                    mission,
                    format!(
                        "vision call timed out after {}s",
                        self.mission_timeout.as_secs()
                    ),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    use crate::domain::ports::errors::StoreError;
    use crate::domain::ports::knowledge_reader::{PageInfo, SearchHit};
    use crate::domain::ports::reasoning_agent::AgentError;
    use crate::domain::ports::vision_agent::{PageImage, VisionFindings};

    struct StubKnowledge;

    #[async_trait]
    impl KnowledgeReader for StubKnowledge {
        async fn list_pages(&self) -> Result<Vec<PageInfo>, StoreError> {
            Ok(Vec::new())
        }

        async fn resolve_page(&self, reference: &str) -> Result<Option<String>, StoreError> {
            if reference == "MISSING" {
                Ok(None)
            } else {
                Ok(Some(reference.to_string()))
            }
        }

        async fn get_summary(&self, _page: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        async fn get_index(&self, _page: &str) -> Result<Option<serde_json::Value>, StoreError> {
            Ok(None)
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, StoreError> {
            Ok(Vec::new())
        }

        async fn get_region(
            &self,
            _page: &str,
            _region_id: &str,
        ) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        async fn page_image(&self, page: &str) -> Result<Option<PageImage>, StoreError> {
            Ok(Some(PageImage {
                page_name: page.to_string(),
                bytes: vec![1, 2, 3],
                mime: "image/png".to_string(),
            }))
        }
    }

    struct CountingVision {
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
        fail_pages: Vec<String>,
    }

    #[async_trait]
    impl VisionAgent for CountingVision {
        async fn verify(
            &self,
            image: &PageImage,
            _instruction: &str,
            _expected_values: &BTreeMap<String, String>,
        ) -> Result<VisionFindings, AgentError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_pages.contains(&image.page_name) {
                return Err(AgentError::Permanent("unreadable page".to_string()));
            }
            Ok(VisionFindings {
                findings: format!("verified content on {}", image.page_name),
                trace: Vec::new(),
            })
        }
    }

    fn dispatcher(
        vision: Arc<dyn VisionAgent>,
        concurrency: usize,
        cancel: Arc<AtomicBool>,
    ) -> VisionDispatcher {
        let config = WorkerConfig {
            mission_concurrency: concurrency,
            mission_timeout_seconds: 5,
            run_deadline_seconds: 30,
            ..WorkerConfig::default()
        };
        VisionDispatcher::new(vision, Arc::new(StubKnowledge), &config, cancel)
    }

    fn missions(pages: &[&str]) -> Vec<Mission> {
        pages
            .iter()
            .enumerate()
            .map(|(i, page)| {
                let mut mission = Mission::new(format!("m_{:03}", i + 1), *page);
                mission.claim_ids = vec![format!("c_{:03}", i + 1)];
                mission.instruction = "verify".to_string();
                mission
            })
            .collect()
    }

    #[tokio::test]
    async fn test_one_result_per_mission_in_order() {
        let vision = Arc::new(CountingVision {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            fail_pages: vec!["M-401".to_string()],
        });
        let dispatcher = dispatcher(vision, 3, Arc::new(AtomicBool::new(false)));

        let missions = missions(&["K-601", "M-401", "S-201"]);
        let results = dispatcher.dispatch(&missions).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].mission_id, "m_001");
        assert!(!results[0].is_failed());
        assert!(results[1].is_failed());
        assert!(results[1].error.as_deref().unwrap().contains("unreadable"));
        assert!(!results[2].is_failed());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let vision = Arc::new(CountingVision {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            fail_pages: Vec::new(),
        });
        let dispatcher = dispatcher(vision.clone(), 2, Arc::new(AtomicBool::new(false)));

        let missions = missions(&["P-1", "P-2", "P-3", "P-4", "P-5", "P-6"]);
        dispatcher.dispatch(&missions).await;

        assert!(vision.max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_unknown_page_fails_mission_not_run() {
        let vision = Arc::new(CountingVision {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            fail_pages: Vec::new(),
        });
        let dispatcher = dispatcher(vision, 2, Arc::new(AtomicBool::new(false)));

        let missions = missions(&["MISSING", "K-601"]);
        let results = dispatcher.dispatch(&missions).await;

        assert!(results[0].is_failed());
        assert!(results[0].error.as_deref().unwrap().contains("page not found"));
        assert!(!results[1].is_failed());
    }

    #[tokio::test]
    async fn test_cancelled_run_fails_missions() {
        let vision = Arc::new(CountingVision {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            fail_pages: Vec::new(),
        });
        let cancel = Arc::new(AtomicBool::new(true));
        let dispatcher = dispatcher(vision, 2, cancel);

        let results = dispatcher.dispatch(&missions(&["K-601"])).await;
        assert!(results[0].is_failed());
        assert!(results[0].error.as_deref().unwrap().contains("cancelled"));
    }
}
