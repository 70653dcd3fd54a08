//! Prompt text for the model. No parsing happens here.

use crate::config::Prompts;
use crate::domain::{language_name, GenerationRequest};
use crate::toon::{ToonGrammar, PROMPT_FIELDS};
use crate::util::fill_template;

/// Instructions asking for `request.count` exercises as a TOON document.
pub fn build_games_prompt(prompts: &Prompts, grammar: &ToonGrammar, request: &GenerationRequest) -> String {
  let count = request.count.to_string();
  let language = language_name(&request.language);
  let header = grammar.header_line(request.count as usize, &PROMPT_FIELDS);
  let example = grammar.example_document();

  fill_template(
    &prompts.games_template,
    &[
      ("count", count.as_str()),
      ("language", language.as_str()),
      ("difficulty", request.difficulty.as_str()),
      ("header", header.as_str()),
      ("example", example.as_str()),
      // user text last so it cannot smuggle in placeholders
      ("prompt", request.prompt.trim()),
    ],
  )
}

pub fn build_feedback_prompt(prompts: &Prompts, user_answer: &str, correct_answer: &str, context: Option<&str>) -> String {
  let context = context
    .map(str::trim)
    .filter(|c| !c.is_empty())
    .map(|c| format!("Context: {c}"))
    .unwrap_or_default();

  fill_template(
    &prompts.feedback_template,
    &[("user_answer", user_answer.trim()), ("correct_answer", correct_answer.trim()), ("context", context.as_str())],
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Difficulty;

  #[test]
  fn games_prompt_embeds_request_and_format() {
    let request = GenerationRequest {
      prompt: "  irregular verbs in the past  ".into(),
      language: "es".into(),
      difficulty: Difficulty::Advanced,
      count: 4,
    };
    let p = build_games_prompt(&Prompts::default(), &ToonGrammar::default(), &request);

    assert!(p.contains("Create 4 exercises about \"irregular verbs in the past\" in Spanish."));
    assert!(p.contains("difficulty: advanced"));
    assert!(p.contains("games[4]{type,question,answer,options,pairs,explanation}:"));
    assert!(p.contains("games[3]{type,question,answer,options,pairs,explanation}:"), "worked example missing");
    assert!(!p.contains("{example}") && !p.contains("{header}"));
  }

  #[test]
  fn feedback_prompt_omits_empty_context() {
    let prompts = Prompts::default();
    let with = build_feedback_prompt(&prompts, "fui", "fui", Some("past of ir"));
    assert!(with.contains("Context: past of ir"));
    let without = build_feedback_prompt(&prompts, "fui", "fui", Some("  "));
    assert!(!without.contains("Context:"));
    assert!(without.contains("User answer: \"fui\""));
  }
}
