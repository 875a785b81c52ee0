/// LLM client: the single point of entry for text-generation calls.
///
/// No other module talks to the provider directly. The client is built from an
/// explicit `AiSettings` value, so tests and multiple providers can coexist in
/// one process.
///
/// One request per call, bounded by the configured timeout. Nothing is retried
/// here: a failed call is reported to the caller, which decides what to do.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1200;

/// Provider configuration. Passed in at construction, never read from globals.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(30),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

impl AiSettings {
    /// Both a credential and a model name are required to make a call.
    pub fn is_configured(&self) -> bool {
        let has_key = self
            .api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        has_key && !self.model.trim().is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("AI provider is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("AI provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unreadable provider response: {0}")]
    Envelope(String),

    #[error("AI provider returned empty content")]
    EmptyContent,
}

/// A system instruction plus one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system: String,
    pub user: String,
}

/// Anything that can turn a prompt into the provider's raw text payload.
///
/// Carried by the match analyzer as `Arc<dyn ScoringClient>`.
#[async_trait]
pub trait ScoringClient: Send + Sync {
    async fn score(&self, prompt: &PromptPayload) -> Result<String, ScoringError>;
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: &'a str,
    temperature: f32,
    max_output_tokens: u32,
    text: TextOptions,
}

#[derive(Debug, Serialize)]
struct TextOptions {
    format: TextFormat,
}

#[derive(Debug, Serialize)]
struct TextFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// The parts of a Responses API envelope this service reads.
#[derive(Debug, Default, Deserialize)]
pub struct ResponsesEnvelope {
    #[serde(default)]
    pub output_text: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ResponsesEnvelope {
    /// Returns the textual payload.
    ///
    /// The `output_text` convenience field wins; otherwise the `output_text`
    /// parts of every output item are concatenated in order.
    pub fn text(&self) -> Option<String> {
        if let Some(text) = self.output_text.as_deref() {
            if !text.trim().is_empty() {
                return Some(text.to_string());
            }
        }

        let assembled: String = self
            .output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|part| part.part_type == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect();

        if assembled.trim().is_empty() {
            None
        } else {
            Some(assembled)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// HTTP client for an OpenAI-compatible Responses endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: AiSettings,
}

impl LlmClient {
    pub fn new(settings: AiSettings) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(ScoringError::Http)?;
        Ok(Self { client, settings })
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.settings.base_url.trim_end_matches('/'))
    }

    /// Makes one call to the provider and returns the decoded envelope.
    pub async fn call(&self, prompt: &PromptPayload) -> Result<ResponsesEnvelope, ScoringError> {
        let api_key = match self.settings.api_key.as_deref() {
            Some(key) if self.is_configured() => key,
            _ => return Err(ScoringError::NotConfigured),
        };

        let request_body = ResponsesRequest {
            model: &self.settings.model,
            instructions: &prompt.system,
            input: &prompt.user,
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
            text: TextOptions {
                format: TextFormat {
                    kind: "json_object",
                },
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ProviderError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ScoringError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ResponsesEnvelope =
            serde_json::from_str(&body).map_err(|e| ScoringError::Envelope(e.to_string()))?;

        if let Some(usage) = &envelope.usage {
            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }

        Ok(envelope)
    }

    fn transport_error(&self, error: reqwest::Error) -> ScoringError {
        if error.is_timeout() {
            ScoringError::Timeout(self.settings.timeout)
        } else {
            ScoringError::Http(error)
        }
    }
}

#[async_trait]
impl ScoringClient for LlmClient {
    async fn score(&self, prompt: &PromptPayload) -> Result<String, ScoringError> {
        let envelope = self.call(prompt).await?;
        envelope.text().ok_or(ScoringError::EmptyContent)
    }
}
