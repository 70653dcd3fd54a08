//! Generation orchestrator: prompt -> provider -> TOON parser -> typed result.
//!
//! Failure taxonomy:
//!   - provider/transport faults pass through unchanged
//!   - no text in the reply              -> `Failure::Parse("empty response")`
//!   - the parser rejects the document   -> `Failure::Parse("unparseable")`
//!
//! No retries here; `Failure::is_retryable` tells the caller whether one makes sense.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::config::{Limits, LlmSettings, Prompts};
use crate::domain::{Feedback, GenerationRequest, GenerationResponse};
use crate::error::{AppResult, Failure};
use crate::gemini::{GeminiRequest, GeminiResponse, GenerationProvider};
use crate::ids::IdGenerator;
use crate::prompt::{build_feedback_prompt, build_games_prompt};
use crate::toon::{parse_document, ToonGrammar};
use crate::util::trunc_for_log;

pub struct Generator {
  provider: Arc<dyn GenerationProvider>,
  llm: LlmSettings,
  grammar: ToonGrammar,
  limits: Limits,
  prompts: Prompts,
  ids: Arc<dyn IdGenerator>,
}

impl Generator {
  pub fn new(
    provider: Arc<dyn GenerationProvider>,
    llm: LlmSettings,
    grammar: ToonGrammar,
    limits: Limits,
    prompts: Prompts,
    ids: Arc<dyn IdGenerator>,
  ) -> Self {
    Self { provider, llm, grammar, limits, prompts, ids }
  }

  pub fn provider_name(&self) -> &'static str {
    self.provider.name()
  }

  pub fn grammar(&self) -> &ToonGrammar {
    &self.grammar
  }

  pub fn llm(&self) -> &LlmSettings {
    &self.llm
  }

  /// Check a request against the configured limits before spending tokens on it.
  pub fn validate(&self, request: &GenerationRequest) -> AppResult<()> {
    let prompt_len = request.prompt.trim().chars().count();
    if prompt_len == 0 {
      return Err(Failure::Validation("Tell us what you want to learn".into()));
    }
    if prompt_len < self.limits.prompt_min_chars {
      return Err(Failure::Validation(format!(
        "Be more specific (at least {} characters)",
        self.limits.prompt_min_chars
      )));
    }
    if prompt_len > self.limits.prompt_max_chars {
      return Err(Failure::Validation(format!(
        "Prompt too long (at most {} characters)",
        self.limits.prompt_max_chars
      )));
    }
    if request.language.trim().is_empty() {
      return Err(Failure::Validation("Choose a language".into()));
    }
    if request.count == 0 || request.count > self.limits.max_exercises {
      return Err(Failure::Validation(format!(
        "Exercise count must be between 1 and {}",
        self.limits.max_exercises
      )));
    }
    Ok(())
  }

  #[instrument(
    level = "info",
    skip(self, request),
    fields(provider = self.provider.name(), language = %request.language, difficulty = request.difficulty.as_str(), count = request.count, prompt_len = request.prompt.len())
  )]
  pub async fn generate(&self, request: &GenerationRequest) -> AppResult<GenerationResponse> {
    self.validate(request)?;

    let prompt = build_games_prompt(&self.prompts, &self.grammar, request);
    let reply = self
      .provider
      .generate_content(&self.llm.model, &GeminiRequest::from_prompt(&prompt, &self.llm))
      .await
      .map_err(|e| {
        error!(target: "generation", error = %e, retryable = e.is_retryable(), "Provider call failed");
        e
      })?;

    let text = reply_text(&reply)?;
    debug!(target: "generation", raw = %trunc_for_log(text, 2000), "TOON reply");

    let report = parse_document(text, &self.grammar, self.ids.as_ref()).map_err(|e| {
      error!(target: "generation", error = %e, "TOON reply could not be parsed");
      Failure::Parse("unparseable".into())
    })?;

    if !report.warnings.is_empty() {
      warn!(target: "generation", warnings = report.warnings.len(), skipped_rows = report.skipped_rows(), "Partial parse");
    }
    info!(target: "generation", topic = %report.response.topic, exercises = report.response.games.len(), "Exercises generated");
    Ok(report.response)
  }

  /// Ask the model whether `user_answer` matches `correct_answer`.
  #[instrument(level = "info", skip_all, fields(answer_len = user_answer.len(), has_context = context.is_some()))]
  pub async fn feedback(&self, user_answer: &str, correct_answer: &str, context: Option<&str>) -> AppResult<Feedback> {
    if user_answer.trim().is_empty() {
      return Err(Failure::Validation("Answer cannot be empty".into()));
    }

    let prompt = build_feedback_prompt(&self.prompts, user_answer, correct_answer, context);
    let settings = self.llm.for_feedback();
    let reply = self
      .provider
      .generate_content(&settings.model, &GeminiRequest::from_prompt(&prompt, &settings))
      .await?;

    let feedback = parse_feedback(reply_text(&reply)?);
    info!(target: "generation", correct = feedback.correct, "Feedback generated");
    Ok(feedback)
  }
}

/// First text payload of the reply, or the matching parse failure.
fn reply_text(reply: &GeminiResponse) -> AppResult<&str> {
  match reply.first_text().map(str::trim).filter(|t| !t.is_empty()) {
    Some(text) => Ok(text),
    None => {
      if let Some(reason) = reply.block_reason() {
        error!(target: "generation", %reason, "Prompt blocked by provider");
        return Err(Failure::Parse(format!("blocked: {reason}")));
      }
      error!(target: "generation", "Provider returned an empty response");
      Err(Failure::Parse("empty response".into()))
    }
  }
}

/// `CORRECT|text` / `INCORRECT|text`. Without a `|` the whole reply is the feedback
/// and the answer counts as incorrect.
pub fn parse_feedback(text: &str) -> Feedback {
  let text = text.trim().trim_matches('"').trim();
  match text.split_once('|') {
    Some((verdict, feedback)) => Feedback {
      correct: verdict.trim().eq_ignore_ascii_case("CORRECT"),
      feedback: feedback.trim().to_string(),
    },
    None => Feedback { correct: false, feedback: text.to_string() },
  }
}
