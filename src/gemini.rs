//! Minimal Google Gemini client for our use-cases.
//!
//! We only call `models/{model}:generateContent` with a single user turn and read back
//! the first text part. Calls are instrumented and log model names, latencies, and
//! token usage (not contents).
//!
//! NOTE: The API key travels as a query parameter; reqwest errors are stripped of
//! their URL before they are logged or returned.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::LlmSettings;
use crate::error::{AppResult, Failure};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Something that can turn a generation request into the provider's structured reply.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
  fn name(&self) -> &'static str;

  async fn generate_content(&self, model: &str, request: &GeminiRequest) -> AppResult<GeminiResponse>;
}

// --- Wire DTOs ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
  pub contents: Vec<Content>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub generation_config: Option<GenerationConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Content {
  #[serde(default)]
  pub parts: Vec<Part>,
  #[serde(default = "default_role")]
  pub role: String,
}

fn default_role() -> String { "user".into() }

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Part {
  #[serde(default)]
  pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
  pub temperature: f32,
  pub max_output_tokens: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
  #[serde(default)] pub candidates: Option<Vec<Candidate>>,
  #[serde(default)] pub prompt_feedback: Option<PromptFeedback>,
  #[serde(default)] pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
  #[serde(default)] pub content: Option<Content>,
  #[serde(default)] pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
  #[serde(default)] pub block_reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
  #[serde(default)] pub prompt_token_count: Option<u32>,
  #[serde(default)] pub candidates_token_count: Option<u32>,
  #[serde(default)] pub total_token_count: Option<u32>,
}

impl GeminiRequest {
  /// One user turn carrying `prompt`, tuned by `settings`.
  pub fn from_prompt(prompt: &str, settings: &LlmSettings) -> Self {
    Self {
      contents: vec![Content { parts: vec![Part { text: prompt.to_string() }], role: default_role() }],
      generation_config: Some(GenerationConfig {
        temperature: settings.temperature,
        max_output_tokens: settings.max_tokens,
      }),
    }
  }
}

impl GeminiResponse {
  /// Reply carrying one candidate with `text`.
  pub fn with_text(text: impl Into<String>) -> Self {
    Self {
      candidates: Some(vec![Candidate {
        content: Some(Content { parts: vec![Part { text: text.into() }], role: "model".into() }),
        finish_reason: Some("STOP".into()),
      }]),
      ..Self::default()
    }
  }

  /// Text of the first part of the first candidate, if any.
  pub fn first_text(&self) -> Option<&str> {
    self
      .candidates
      .as_ref()?
      .first()?
      .content
      .as_ref()?
      .parts
      .first()
      .map(|p| p.text.as_str())
  }

  pub fn block_reason(&self) -> Option<&str> {
    self.prompt_feedback.as_ref()?.block_reason.as_deref()
  }
}

// --- Client ---

#[derive(Clone)]
pub struct GeminiClient {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
}

impl GeminiClient {
  pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Failure::Unknown(format!("HTTP client init failed: {e}")))?;
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Ok(Self { client, api_key: api_key.into(), base_url })
  }

  /// Construct the client if we find GEMINI_API_KEY; otherwise return None.
  pub fn from_env(settings: &LlmSettings) -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    match Self::new(api_key, base_url, Duration::from_secs(settings.timeout_secs)) {
      Ok(c) => Some(c),
      Err(e) => {
        error!(target: "devlanguages_backend", error = %e, "Gemini client unavailable");
        None
      }
    }
  }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
  fn name(&self) -> &'static str { "gemini" }

  #[instrument(level = "info", skip(self, request), fields(model = %model))]
  async fn generate_content(&self, model: &str, request: &GeminiRequest) -> AppResult<GeminiResponse> {
    let url = format!("{}/models/{}:generateContent", self.base_url, model);
    let start = Instant::now();

    let res = self.client.post(&url)
      .query(&[("key", self.api_key.as_str())])
      .header(USER_AGENT, "devlanguages-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(request).send().await.map_err(transport_failure)?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or(body);
      error!(status = status.as_u16(), elapsed = ?start.elapsed(), message = %msg, "Gemini HTTP error");
      return Err(failure_for_status(status.as_u16(), &msg));
    }

    let body: GeminiResponse = res.json().await
      .map_err(|e| Failure::Parse(format!("invalid provider reply: {}", e.without_url())))?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    info!(elapsed = ?start.elapsed(), "Gemini response received");
    Ok(body)
  }
}

fn transport_failure(e: reqwest::Error) -> Failure {
  if e.is_timeout() {
    Failure::Timeout
  } else if e.is_connect() {
    Failure::NoConnection
  } else {
    Failure::Unknown(e.without_url().to_string())
  }
}

/// Map a non-success HTTP status (plus the provider's message) onto a failure category.
pub fn failure_for_status(code: u16, message: &str) -> Failure {
  match code {
    400 if message.to_lowercase().contains("api key") => Failure::InvalidApiKey,
    401 => Failure::Unauthorized,
    403 => Failure::InvalidApiKey,
    404 => Failure::NotFound,
    429 => Failure::RateLimitExceeded,
    500..=599 => Failure::ServerError { code },
    _ => Failure::ClientError { code },
  }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::LlmPreset;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new("test-key", server.uri(), Duration::from_secs(5)).expect("client")
  }

  fn request() -> GeminiRequest {
    GeminiRequest::from_prompt("Create 2 exercises", &LlmPreset::Default.settings("gemini-test"))
  }

  #[tokio::test]
  async fn posts_prompt_and_reads_first_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/models/gemini-test:generateContent"))
      .and(query_param("key", "test-key"))
      .and(body_partial_json(json!({
        "contents": [{ "parts": [{ "text": "Create 2 exercises" }], "role": "user" }],
        "generationConfig": { "maxOutputTokens": 2000 }
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "parts": [{ "text": "topic: Verbs" }], "role": "model" }, "finishReason": "STOP" }],
        "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 4, "totalTokenCount": 16 }
      })))
      .mount(&server)
      .await;

    let reply = client(&server).generate_content("gemini-test", &request()).await.expect("reply");
    assert_eq!(reply.first_text(), Some("topic: Verbs"));
    assert_eq!(reply.usage_metadata.and_then(|u| u.total_token_count), Some(16));
  }

  #[tokio::test]
  async fn maps_http_statuses_to_failures() {
    let cases = [
      (429_u16, json!({ "error": { "message": "Resource has been exhausted" } }), Failure::RateLimitExceeded),
      (400, json!({ "error": { "message": "API key not valid. Please pass a valid API key." } }), Failure::InvalidApiKey),
      (400, json!({ "error": { "message": "Invalid JSON payload" } }), Failure::ClientError { code: 400 }),
      (503, json!({ "error": { "message": "The model is overloaded" } }), Failure::ServerError { code: 503 }),
    ];

    for (status, body, expected) in cases {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;

      let err = client(&server).generate_content("gemini-test", &request()).await.unwrap_err();
      assert_eq!(err, expected, "status {status}");
    }
  }

  #[tokio::test]
  async fn undecodable_reply_is_a_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
      .mount(&server)
      .await;

    let err = client(&server).generate_content("gemini-test", &request()).await.unwrap_err();
    assert!(matches!(err, Failure::Parse(_)), "got {err:?}");
  }

  #[tokio::test]
  async fn unreachable_host_is_no_connection() {
    let c = GeminiClient::new("k", "http://127.0.0.1:1", Duration::from_secs(2)).expect("client");
    let err = c.generate_content("m", &request()).await.unwrap_err();
    assert!(matches!(err, Failure::NoConnection | Failure::Timeout), "got {err:?}");
    assert!(err.is_retryable());
  }

  #[test]
  fn reply_helpers_handle_missing_pieces() {
    assert_eq!(GeminiResponse::default().first_text(), None);
    let blocked: GeminiResponse = serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).expect("json");
    assert_eq!(blocked.block_reason(), Some("SAFETY"));
    assert_eq!(blocked.first_text(), None);
    assert_eq!(GeminiResponse::with_text("hi").first_text(), Some("hi"));
    assert_eq!(failure_for_status(404, ""), Failure::NotFound);
    assert_eq!(failure_for_status(401, ""), Failure::Unauthorized);
  }
}
