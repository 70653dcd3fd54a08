//! Built-in content that keeps the service useful without an API key.

use async_trait::async_trait;
use tracing::warn;

use crate::error::AppResult;
use crate::gemini::{GeminiRequest, GeminiResponse, GenerationProvider};
use crate::toon::ToonGrammar;

/// Answers every generation request with the worked example document, and every
/// other request (feedback) with a neutral verdict.
pub struct SeedProvider {
  grammar: ToonGrammar,
}

impl SeedProvider {
  pub fn new(grammar: ToonGrammar) -> Self {
    Self { grammar }
  }
}

#[async_trait]
impl GenerationProvider for SeedProvider {
  fn name(&self) -> &'static str { "seed" }

  async fn generate_content(&self, model: &str, request: &GeminiRequest) -> AppResult<GeminiResponse> {
    let prompt = request
      .contents
      .first()
      .and_then(|c| c.parts.first())
      .map(|p| p.text.as_str())
      .unwrap_or_default();
    warn!(target: "generation", %model, "No GEMINI_API_KEY; serving built-in seed content");

    let header = self.grammar.header_prefix();
    if prompt.contains(header.as_str()) {
      Ok(GeminiResponse::with_text(self.grammar.example_document()))
    } else {
      Ok(GeminiResponse::with_text("INCORRECT|Automatic feedback is unavailable offline. Compare your answer with the expected one."))
    }
  }
}
