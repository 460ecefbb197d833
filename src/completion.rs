//! Text completion provider.
//!
//! The retriever (for query refinement) and the conversation loop (for the
//! final answer) both go through [`CompletionProvider`]. [`AnthropicClient`]
//! implements it against the Anthropic text-completion endpoint, where a
//! prompt alternates [`HUMAN_PROMPT`] and [`AI_PROMPT`] turns.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::config::{CompletionConfig, Credentials};
use crate::http;

/// Marks the start of a human turn in a completion prompt.
pub const HUMAN_PROMPT: &str = "\n\nHuman:";
/// Marks the start of the assistant turn the model should complete.
pub const AI_PROMPT: &str = "\n\nAssistant:";

const API_VERSION: &str = "2023-06-01";

/// A single completion call.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub stop_sequences: Vec<String>,
    pub model: String,
    pub max_tokens_to_sample: usize,
    pub temperature: f32,
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// One of the request's stop sequences was produced.
    StopSequence(String),
    MaxTokens,
    /// Provider-specific or missing reason.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub stop_reason: StopReason,
}

impl Completion {
    /// True if generation ended on exactly `sequence`.
    pub fn stopped_on(&self, sequence: &str) -> bool {
        matches!(&self.stop_reason, StopReason::StopSequence(s) if s == sequence)
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

/// Anthropic text-completion client (`POST /v1/complete`).
pub struct AnthropicClient {
    api_key: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: &CompletionConfig, credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            api_key: credentials.api_key.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let endpoint = format!("{}/v1/complete", self.url);

        let json = http::post_json_with_retry("Anthropic", self.max_retries, || {
            self.client
                .post(&endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .header("Content-Type", "application/json")
                .json(request)
        })
        .await?;

        parse_completion_response(&json)
    }
}

fn parse_completion_response(json: &serde_json::Value) -> Result<Completion> {
    let text = json
        .get("completion")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing completion"))?
        .to_string();

    let reason = json.get("stop_reason").and_then(|r| r.as_str()).unwrap_or("");
    let stop_reason = match reason {
        "stop_sequence" => StopReason::StopSequence(
            json.get("stop")
                .and_then(|s| s.as_str())
                .unwrap_or_default()
                .to_string(),
        ),
        "max_tokens" => StopReason::MaxTokens,
        other => StopReason::Other(other.to_string()),
    };

    Ok(Completion { text, stop_reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stop_sequence() {
        let json = serde_json::json!({
            "completion": " <search_query>MudTable paging",
            "stop_reason": "stop_sequence",
            "stop": "</search_query>",
        });
        let c = parse_completion_response(&json).unwrap();
        assert_eq!(c.text, " <search_query>MudTable paging");
        assert!(c.stopped_on("</search_query>"));
        assert!(!c.stopped_on(HUMAN_PROMPT));
    }

    #[test]
    fn test_parse_max_tokens() {
        let json = serde_json::json!({"completion": "partial", "stop_reason": "max_tokens"});
        let c = parse_completion_response(&json).unwrap();
        assert_eq!(c.stop_reason, StopReason::MaxTokens);
    }

    #[test]
    fn test_parse_missing_completion() {
        let json = serde_json::json!({"type": "error", "error": {"message": "bad"}});
        assert!(parse_completion_response(&json).is_err());
    }

    #[test]
    fn test_request_wire_shape() {
        let req = CompletionRequest {
            prompt: format!("{} hi{}", HUMAN_PROMPT, AI_PROMPT),
            stop_sequences: vec![HUMAN_PROMPT.to_string()],
            model: "claude-2".to_string(),
            max_tokens_to_sample: 4000,
            temperature: 0.8,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "claude-2");
        assert_eq!(v["max_tokens_to_sample"], 4000);
        assert_eq!(v["stop_sequences"][0], "\n\nHuman:");
    }
}
