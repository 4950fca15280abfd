use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::models::TraceStep;
use crate::domain::models::config::{RetryConfig, VisionAgentConfig};
use crate::domain::ports::reasoning_agent::AgentError;
use crate::domain::ports::vision_agent::{PageImage, VisionAgent, VisionFindings};
use crate::infrastructure::agents::retry::RetryPolicy;

const VERIFY_PROMPT_PREFIX: &str = "You are verifying claims against this construction drawing. \
Work the instruction below step by step: locate the relevant region, read the actual values, \
and quote exactly what the drawing shows. Note every step you take (zoom, region, read) as a \
numbered trace line starting with 'TRACE:'. End with a 'FINDINGS:' paragraph.";

/// HTTP client for the vision-capable agent.
///
/// Sends the rendered page inline as base64 alongside the mission
/// instruction, and splits the reply into findings and a replayable
/// trace of intermediate steps.
pub struct GenerateContentVisionAgent {
    http_client: ReqwestClient,
    api_key: String,
    base_url: String,
    model: String,
    retry_policy: RetryPolicy,
}

impl GenerateContentVisionAgent {
    pub fn from_config(config: &VisionAgentConfig, retry: &RetryConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("missing API key env var {}", config.api_key_env))?;

        Self::new(
            config.base_url.clone(),
            config.model.clone(),
            api_key,
            config.timeout_seconds,
            RetryPolicy::from_config(retry),
        )
    }

    pub fn new(
        base_url: String,
        model: String,
        api_key: String,
        timeout_seconds: u64,
        retry_policy: RetryPolicy,
    ) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            api_key,
            base_url,
            model,
            retry_policy,
        })
    }

    async fn send_request(
        &self,
        image: &PageImage,
        prompt: &str,
    ) -> Result<String, AgentError> {
        let body = json!({
            "contents": [{
                "parts": [
                    {"text": prompt},
                    {"inline_data": {
                        "mime_type": image.mime,
                        "data": BASE64.encode(&image.bytes),
                    }},
                ],
            }],
            "generationConfig": {"temperature": 0.0},
        });

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout(0)
                } else {
                    AgentError::Transient(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 | 500 | 502 | 503 | 504 => {
                    AgentError::Transient(format!("HTTP {status}: {body}"))
                }
                _ => AgentError::Permanent(format!("HTTP {status}: {body}")),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedOutput(format!("invalid response body: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| AgentError::MalformedOutput("empty candidates".to_string()))?;

        Ok(text)
    }
}

/// Split model text into findings and trace steps. Lines prefixed with
/// `TRACE:` become trace steps; everything after `FINDINGS:` (or the
/// whole remainder) becomes the findings text.
fn split_findings(text: &str) -> VisionFindings {
    let mut trace = Vec::new();
    let mut findings_lines = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(step) = trimmed.strip_prefix("TRACE:") {
            trace.push(TraceStep {
                step: format!("trace_{}", trace.len() + 1),
                detail: serde_json::Value::String(step.trim().to_string()),
            });
        } else if let Some(rest) = trimmed.strip_prefix("FINDINGS:") {
            findings_lines.push(rest.trim().to_string());
        } else if !trimmed.is_empty() {
            findings_lines.push(trimmed.to_string());
        }
    }

    VisionFindings {
        findings: findings_lines.join("\n"),
        trace,
    }
}

#[async_trait]
impl VisionAgent for GenerateContentVisionAgent {
    #[instrument(skip_all, fields(page = %image.page_name))]
    async fn verify(
        &self,
        image: &PageImage,
        instruction: &str,
        expected_values: &BTreeMap<String, String>,
    ) -> Result<VisionFindings, AgentError> {
        let mut prompt = format!("{VERIFY_PROMPT_PREFIX}\n\nInstruction: {instruction}");
        if !expected_values.is_empty() {
            prompt.push_str("\n\nExpected values to check:");
            for (claim_id, value) in expected_values {
                prompt.push_str(&format!("\n- {claim_id}: {value}"));
            }
        }

        let text = self
            .retry_policy
            .execute(|| async { self.send_request(image, &prompt).await })
            .await?;

        let findings = split_findings(&text);
        debug!(
            trace_steps = findings.trace.len(),
            "vision verification finished"
        );
        Ok(findings)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}
