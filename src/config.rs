//! Loading service configuration (LLM tuning, TOON grammar, limits, prompts) from TOML.
//!
//! See `GamesConfig` for the expected schema. Every section is optional; missing
//! values fall back to the defaults below.

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::toon::{ToonGrammar, DEFAULT_SECTION};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GamesConfig {
  #[serde(default)]
  pub llm: LlmOverrides,
  #[serde(default)]
  pub toon: ToonCfg,
  #[serde(default)]
  pub limits: Limits,
  #[serde(default)]
  pub prompts: Prompts,
}

/// Per-field overrides on top of the selected `LLM_PRESET`.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct LlmOverrides {
  #[serde(default)] pub model: Option<String>,
  #[serde(default)] pub temperature: Option<f32>,
  #[serde(default)] pub max_tokens: Option<u32>,
  #[serde(default)] pub timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ToonCfg {
  pub section_name: String,
}

impl Default for ToonCfg {
  fn default() -> Self {
    Self { section_name: DEFAULT_SECTION.into() }
  }
}

impl ToonCfg {
  /// A blank section name would make the header prefix a bare `[`.
  pub fn grammar(&self) -> ToonGrammar {
    let section = self.section_name.trim();
    if section.is_empty() {
      warn!(target: "devlanguages_backend", default = DEFAULT_SECTION, "Blank [toon] section_name; using default");
      return ToonGrammar::default();
    }
    ToonGrammar::new(section)
  }
}

/// Bounds applied to generation requests before anything is sent to the model.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Limits {
  pub prompt_min_chars: usize,
  pub prompt_max_chars: usize,
  pub max_exercises: u32,
}

impl Default for Limits {
  fn default() -> Self {
    Self { prompt_min_chars: 10, prompt_max_chars: 500, max_exercises: 20 }
  }
}

/// Model call parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct LlmSettings {
  pub model: String,
  pub temperature: f32,
  pub max_tokens: u32,
  pub timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmPreset {
  Default,
  Creative,
  Precise,
}

impl LlmPreset {
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_lowercase().as_str() {
      "default" => Some(LlmPreset::Default),
      "creative" => Some(LlmPreset::Creative),
      "precise" => Some(LlmPreset::Precise),
      _ => None,
    }
  }

  pub fn settings(self, model: &str) -> LlmSettings {
    let (temperature, max_tokens) = match self {
      LlmPreset::Default => (0.7, 2000),
      LlmPreset::Creative => (0.9, 2500),
      LlmPreset::Precise => (0.3, 1500),
    };
    LlmSettings { model: model.to_string(), temperature, max_tokens, timeout_secs: 30 }
  }
}

impl LlmSettings {
  /// Settings used for answer feedback: more deterministic, short replies.
  pub fn for_feedback(&self) -> Self {
    Self { temperature: 0.3, max_tokens: 500, ..self.clone() }
  }

  /// Preset from `LLM_PRESET`, model from `GEMINI_MODEL`, then TOML overrides.
  pub fn resolve(overrides: &LlmOverrides) -> Self {
    let preset = match std::env::var("LLM_PRESET") {
      Ok(p) => LlmPreset::parse(&p).unwrap_or_else(|| {
        warn!(target: "devlanguages_backend", preset = %p, "Unknown LLM_PRESET; using default");
        LlmPreset::Default
      }),
      Err(_) => LlmPreset::Default,
    };
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".into());
    preset.settings(&model).with_overrides(overrides)
  }

  pub fn with_overrides(mut self, o: &LlmOverrides) -> Self {
    if let Some(m) = &o.model { self.model = m.clone(); }
    if let Some(t) = o.temperature { self.temperature = t; }
    if let Some(n) = o.max_tokens { self.max_tokens = n; }
    if let Some(s) = o.timeout_secs { self.timeout_secs = s; }
    self
  }
}

/// Prompts sent to the model. Override them in TOML to tune tone or structure.
///
/// `games_template` placeholders: `{count}`, `{prompt}`, `{language}`, `{difficulty}`,
/// `{header}` (the array header line) and `{example}` (a worked document).
/// `feedback_template` placeholders: `{user_answer}`, `{correct_answer}`, `{context}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub games_template: String,
  pub feedback_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      games_template: r#"You are an assistant specialized in creating language exercises.

TASK: Create {count} exercises about "{prompt}" in {language}.

IMPORTANT: Answer ONLY in the TOON (Token-Oriented Object Notation) format below. Do NOT add any extra text.

RESPONSE FORMAT:
topic: [topic title]
explanation: [educational explanation of the topic in 2-3 sentences]
difficulty: {difficulty}
language: {language}

{header}
 [type],[question],[answer],[options],[pairs],[explanation]
 [type],[question],[answer],[options],[pairs],[explanation]
 ...

EXERCISE TYPES:
- translation: translate the question (answer = correct translation, options = null, pairs = null)
- fill_blanks: fill the gap marked ___ (answer = correct word, options = "[opt1,opt2,opt3,opt4]", pairs = null)
- matching: match terms (pairs = "word1|translation1,word2|translation2", answer = null, options = null)

RULES:
1. Wrap text in double quotes: "example"
2. Never put double quotes inside a text
3. Use null for empty fields
4. Options: "[option1,option2,option3]" or null
5. Every exercise needs an educational explanation
6. One exercise per line, always with 6 fields

EXAMPLE:
{example}
NOW CREATE THE EXERCISES:"#.into(),
      feedback_template: r#"Compare the user's answer with the correct answer.

User answer: "{user_answer}"
Correct answer: "{correct_answer}"
{context}

RESPONSE FORMAT: CORRECT|feedback OR INCORRECT|feedback

If it is correct or very close: "CORRECT|Excellent! You got it."
If it is incorrect: "INCORRECT|[explanation of the mistake and a tip to improve]"

Be educational and encouraging."#.into(),
    }
  }
}

/// Attempt to load `GamesConfig` from GAMES_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_games_config_from_env() -> Option<GamesConfig> {
  let path = std::env::var("GAMES_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<GamesConfig>(&s) {
      Ok(cfg) => {
        info!(target: "devlanguages_backend", %path, "Loaded games config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "devlanguages_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "devlanguages_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: GamesConfig = toml::from_str(
      r#"
[llm]
temperature = 0.5

[toon]
section_name = "drills"

[limits]
max_exercises = 5
"#,
    )
    .expect("toml");

    assert_eq!(cfg.toon.grammar().header_prefix(), "drills[");
    assert_eq!(cfg.limits.max_exercises, 5);
    assert_eq!(cfg.limits.prompt_min_chars, 10);
    assert!(cfg.prompts.games_template.contains("{header}"));

    let llm = LlmPreset::Precise.settings("m").with_overrides(&cfg.llm);
    assert_eq!(llm.temperature, 0.5);
    assert_eq!(llm.max_tokens, 1500);
  }

  #[test]
  fn blank_section_name_falls_back_to_default() {
    let cfg: GamesConfig = toml::from_str("[toon]\nsection_name = \"  \"\n").expect("toml");
    assert_eq!(cfg.toon.grammar().header_prefix(), format!("{DEFAULT_SECTION}["));
  }

  #[test]
  fn presets_match_their_names() {
    assert_eq!(LlmPreset::parse("Creative"), Some(LlmPreset::Creative));
    assert_eq!(LlmPreset::Default.settings("m").max_tokens, 2000);
    let fb = LlmPreset::Creative.settings("m").for_feedback();
    assert_eq!((fb.temperature, fb.max_tokens, fb.model.as_str()), (0.3, 500, "m"));
  }
}
