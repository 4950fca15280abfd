use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::domain::models::TraceStep;
use crate::domain::ports::reasoning_agent::AgentError;

/// A rendered source page handed to the vision agent.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_name: String,
    pub bytes: Vec<u8>,
    /// image/png or image/jpeg.
    pub mime: String,
}

/// What the vision agent found while working one mission.
#[derive(Debug, Clone, Default)]
pub struct VisionFindings {
    /// Free-text findings: evidence quotes, values read, conflicts seen.
    pub findings: String,
    /// Replayable intermediate steps (zooms, crops, annotations).
    pub trace: Vec<TraceStep>,
}

/// Port for the vision-capable agent.
///
/// The sole cost-bearing external call in the pipeline. Implementations
/// are expected to apply whatever visual-reasoning capability they have
/// (zoom, crop, annotate) to locate evidence on the page.
#[async_trait]
pub trait VisionAgent: Send + Sync {
    /// Verify the mission instruction against a rendered page image.
    async fn verify(
        &self,
        image: &PageImage,
        instruction: &str,
        expected_values: &BTreeMap<String, String>,
    ) -> Result<VisionFindings, AgentError>;
}
