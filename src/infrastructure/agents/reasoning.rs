use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::domain::models::config::{ReasoningAgentConfig, RetryConfig};
use crate::domain::models::{Claim, EntryPayload, Score, VerificationResult};
use crate::domain::ports::reasoning_agent::{
    AgentError, RawClaim, RawMission, RawPatch, RawScore, ReasoningAgent,
};
use crate::infrastructure::agents::retry::RetryPolicy;

const EXTRACT_SYSTEM_PROMPT: &str = "You audit assertions made about construction drawings. \
Given a conversation transcript, list every discrete factual claim about drawing content \
(dimensions, materials, model parts, specifications, coordination, locations). \
Respond with a JSON array of objects with keys: claim_id, text, source_page, claim_type, \
verification_priority, source_anchor. Use claim_type values: dimensional, material, \
model_part, specification, coordination, location. Use priority values: low, medium, high. \
Respond with JSON only.";

const PLAN_SYSTEM_PROMPT: &str = "You plan verification missions over construction drawings. \
Group the given claims by their source page, one mission per distinct page. For each mission \
write one instruction telling a vision agent exactly what to check on that page. \
Respond with a JSON array of objects with keys: mission_id, claim_ids, target_page, \
instruction, expected_values (object mapping claim_id to the expected value as a string). \
Respond with JSON only.";

const SCORE_SYSTEM_PROMPT: &str = "You compare verification findings to the original claims. \
For each claim, classify the outcome as one of: verified, corrected, enriched, ungrounded, \
conflict. Quote what the vision agent found. When sources disagree, list each source and its \
value under conflict_candidates; do NOT pick a winner. \
Respond with a JSON array of objects with keys: claim_id, score, vision_found, confidence \
(low, medium, high), rationale, conflict_candidates (array of {source, value}). \
Respond with JSON only.";

const PATCH_SYSTEM_PROMPT: &str = "You turn audit scores into knowledge-state patch proposals. \
Only corrected, enriched, and conflict scores produce patches. Each patch targets a JSON \
document and a dotted field path within it. \
Respond with a JSON array of objects with keys: patch_id, target (relative file path), \
operation (set or append_unique), path (dotted field path), value, reason, claim_id. \
Respond with JSON only.";

/// Chat-completions HTTP client for the reasoning agent.
///
/// Connection pooling via reqwest, exponential-backoff retry for
/// transient failures, and lenient JSON extraction from the model's
/// text output. Every caller has a deterministic fallback, so parse
/// failures surface as `MalformedOutput` rather than panics.
pub struct ChatReasoningAgent {
    http_client: ReqwestClient,
    api_key: String,
    base_url: String,
    model: String,
    retry_policy: RetryPolicy,
}

impl ChatReasoningAgent {
    /// Build a client from configuration, reading the API key from the
    /// environment variable the config names.
    pub fn from_config(config: &ReasoningAgentConfig, retry: &RetryConfig) -> Result<Self> {
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

    /// One retried chat-completion round trip, returning the model text.
    #[instrument(skip_all)]
    async fn complete(&self, system: &str, user: &str) -> Result<String, AgentError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.0,
        };

        self.retry_policy
            .execute(|| async { self.send_request(&request).await })
            .await
    }

    async fn send_request(&self, request: &ChatRequest) -> Result<String, AgentError> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
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
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedOutput(format!("invalid response body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AgentError::MalformedOutput("empty choices".to_string()))
    }

    /// Run one stage: prompt, complete, extract the JSON array, and
    /// deserialize into the stage's raw output type.
    async fn stage<T: for<'de> Deserialize<'de>>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<Vec<T>, AgentError> {
        let text = self.complete(system, user).await?;
        let value = extract_json_array(&text)?;
        serde_json::from_value(value)
            .map_err(|e| AgentError::MalformedOutput(format!("unexpected shape: {e}")))
    }
}

/// Map an HTTP status to a retry class. Rate limits and server errors
/// are transient; client errors are permanent.
fn classify_status(status: u16, body: &str) -> AgentError {
    match status {
        429 | 500 | 502 | 503 | 504 | 529 => {
            AgentError::Transient(format!("HTTP {status}: {body}"))
        }
        _ => AgentError::Permanent(format!("HTTP {status}: {body}")),
    }
}

/// Pull the first JSON array out of model text, tolerating code fences
/// and surrounding prose.
fn extract_json_array(text: &str) -> Result<Value, AgentError> {
    let trimmed = text.trim();

    // Fast path: the whole response is the array.
    if let Ok(value @ Value::Array(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let start = trimmed
        .find('[')
        .ok_or_else(|| AgentError::MalformedOutput("no JSON array in response".to_string()))?;
    let end = trimmed
        .rfind(']')
        .ok_or_else(|| AgentError::MalformedOutput("unterminated JSON array".to_string()))?;
    if end <= start {
        return Err(AgentError::MalformedOutput(
            "unterminated JSON array".to_string(),
        ));
    }

    serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| AgentError::MalformedOutput(format!("invalid JSON array: {e}")))
}

#[async_trait]
impl ReasoningAgent for ChatReasoningAgent {
    async fn extract_claims(&self, payload: &EntryPayload) -> Result<Vec<RawClaim>, AgentError> {
        let user = serde_json::to_string_pretty(payload)
            .map_err(|e| AgentError::MalformedOutput(e.to_string()))?;
        let claims: Vec<RawClaim> = self.stage(EXTRACT_SYSTEM_PROMPT, &user).await?;
        debug!(count = claims.len(), "extracted raw claims");
        Ok(claims)
    }

    async fn plan_missions(&self, claims: &[Claim]) -> Result<Vec<RawMission>, AgentError> {
        let user = serde_json::to_string_pretty(claims)
            .map_err(|e| AgentError::MalformedOutput(e.to_string()))?;
        self.stage(PLAN_SYSTEM_PROMPT, &user).await
    }

    async fn score_claims(
        &self,
        claims: &[Claim],
        results: &[VerificationResult],
    ) -> Result<Vec<RawScore>, AgentError> {
        let user = serde_json::to_string_pretty(&serde_json::json!({
            "claims": claims,
            "mission_results": results,
        }))
        .map_err(|e| AgentError::MalformedOutput(e.to_string()))?;
        self.stage(SCORE_SYSTEM_PROMPT, &user).await
    }

    async fn propose_patches(
        &self,
        claims: &[Claim],
        results: &[VerificationResult],
        scores: &[Score],
    ) -> Result<Vec<RawPatch>, AgentError> {
        let actionable: Vec<&Score> = scores
            .iter()
            .filter(|s| s.category.produces_patch())
            .collect();
        if actionable.is_empty() {
            return Ok(Vec::new());
        }

        let user = serde_json::to_string_pretty(&serde_json::json!({
            "claims": claims,
            "mission_results": results,
            "scores": actionable,
        }))
        .map_err(|e| AgentError::MalformedOutput(e.to_string()))?;

        let patches = self.stage(PATCH_SYSTEM_PROMPT, &user).await;
        if let Err(err) = &patches {
            warn!(%err, "patch proposal stage failed");
        }
        patches
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_agent(base_url: String) -> ChatReasoningAgent {
        ChatReasoningAgent::new(
            base_url,
            "test-model".to_string(),
            "test-key".to_string(),
            5,
            RetryPolicy::new(1, 1, 10),
        )
        .unwrap()
    }

    #[test]
    fn test_extract_json_array_plain() {
        let value = extract_json_array(r#"[{"claim_id": "c_001"}]"#).unwrap();
        assert_eq!(value[0]["claim_id"], "c_001");
    }

    #[test]
    fn test_extract_json_array_fenced() {
        let text = "Here are the claims:\n```json\n[{\"claim_id\": \"c_001\"}]\n```\nDone.";
        let value = extract_json_array(text).unwrap();
        assert_eq!(value[0]["claim_id"], "c_001");
    }

    #[test]
    fn test_extract_json_array_rejects_prose() {
        assert!(extract_json_array("no structured output here").is_err());
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(429, "").is_transient());
        assert!(classify_status(503, "").is_transient());
        assert!(!classify_status(400, "").is_transient());
        assert!(!classify_status(401, "").is_transient());
    }

    #[tokio::test]
    async fn test_extract_claims_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "[{\"claim_id\": \"c_001\", \"text\": \"beam depth is 600mm\", \"source_page\": \"S-201\", \"claim_type\": \"dimensional\", \"verification_priority\": \"high\", \"source_anchor\": \"beam schedule\"}]"
                }
            }]
        });
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let agent = test_agent(server.url());
        let payload = EntryPayload::Feedback {
            user_text: "the beam is 600 deep".to_string(),
            prior_answer_context: String::new(),
            prior_tool_calls: vec![],
            relevant_pages: vec!["S-201".to_string()],
        };

        let claims = agent.extract_claims(&payload).await.unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].claim_id, "c_001");
        assert_eq!(claims[0].source_page, "S-201");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let agent = test_agent(server.url());
        let err = agent.plan_missions(&[]).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
