//! Domain models: generation requests/responses, exercises, users, and the language catalog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What kind of exercise does a record describe?
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
  /// Translate `question`; the expected translation is `answer`.
  Translation,
  /// Fill the gap in `question` with `answer`, usually chosen from `options`.
  FillBlanks,
  /// Associate the left and right terms of `pairs`.
  Matching,
  MultipleChoice, // reserved
  TrueFalse,      // reserved
}
impl Default for ExerciseKind {
  fn default() -> Self { ExerciseKind::Translation }
}

impl ExerciseKind {
  /// Token used for this kind in TOON documents.
  pub fn token(self) -> &'static str {
    match self {
      ExerciseKind::Translation => "translation",
      ExerciseKind::FillBlanks => "fill_blanks",
      ExerciseKind::Matching => "matching",
      ExerciseKind::MultipleChoice => "multiple_choice",
      ExerciseKind::TrueFalse => "true_false",
    }
  }
}

/// One generated exercise. Matching records carry `pairs`; every other kind uses
/// `answer`/`options` and leaves `pairs` unset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRecord {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: ExerciseKind,
  pub question: String,
  #[serde(default)] pub answer: Option<String>,
  #[serde(default)] pub options: Option<Vec<String>>,
  #[serde(default)] pub pairs: Option<BTreeMap<String, String>>,
  pub explanation: String,
}

/// Everything one generation call produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
  pub topic: String,
  pub explanation: String,
  pub difficulty: String, // free-form, as echoed by the model
  pub language: String,
  pub games: Vec<ExerciseRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Beginner,
  Intermediate,
  Advanced,
}
impl Default for Difficulty {
  fn default() -> Self { Difficulty::Intermediate }
}

impl Difficulty {
  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Beginner => "beginner",
      Difficulty::Intermediate => "intermediate",
      Difficulty::Advanced => "advanced",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_lowercase().as_str() {
      "beginner" => Some(Difficulty::Beginner),
      "intermediate" => Some(Difficulty::Intermediate),
      "advanced" => Some(Difficulty::Advanced),
      _ => None,
    }
  }
}

/// What the user asked for. Validated by the generator against the configured limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
  pub prompt: String,
  pub language: String, // language code, e.g. "en"
  #[serde(default)] pub difficulty: Difficulty,
  pub count: u32,
}

/// Verdict on a user's answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Feedback {
  pub correct: bool,
  pub feedback: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub email: String,
  pub display_name: String,
  #[serde(default)] pub photo_url: Option<String>,
  #[serde(default)] pub is_anonymous: bool,
  #[serde(default)] pub created_at_millis: Option<u64>,
}

/// A language offered for learning.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
  pub code: &'static str,
  pub name: &'static str,
  pub native_name: &'static str,
  pub flag: &'static str,
  pub popular: bool,
}

const LANGUAGES: [Language; 10] = [
  Language { code: "en", name: "English", native_name: "English", flag: "🇺🇸", popular: true },
  Language { code: "es", name: "Spanish", native_name: "Español", flag: "🇪🇸", popular: true },
  Language { code: "fr", name: "French", native_name: "Français", flag: "🇫🇷", popular: true },
  Language { code: "de", name: "German", native_name: "Deutsch", flag: "🇩🇪", popular: false },
  Language { code: "it", name: "Italian", native_name: "Italiano", flag: "🇮🇹", popular: false },
  Language { code: "pt", name: "Portuguese", native_name: "Português", flag: "🇵🇹", popular: false },
  Language { code: "ja", name: "Japanese", native_name: "日本語", flag: "🇯🇵", popular: true },
  Language { code: "zh", name: "Chinese", native_name: "中文", flag: "🇨🇳", popular: false },
  Language { code: "ko", name: "Korean", native_name: "한국어", flag: "🇰🇷", popular: false },
  Language { code: "ru", name: "Russian", native_name: "Русский", flag: "🇷🇺", popular: false },
];

pub fn languages() -> &'static [Language] {
  &LANGUAGES
}

pub fn find_language(code: &str) -> Option<&'static Language> {
  let code = code.trim();
  LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// English name for a language code; unknown codes pass through unchanged.
pub fn language_name(code: &str) -> String {
  find_language(code).map(|l| l.name.to_string()).unwrap_or_else(|| code.trim().to_string())
}
