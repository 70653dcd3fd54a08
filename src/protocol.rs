//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Difficulty, GenerationRequest, GenerationResponse, Language, User};
use crate::error::{AppResult, Failure};

pub const DEFAULT_EXERCISE_COUNT: u32 = 10;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  SignIn {
    email: String,
    password: String,
  },
  SignUp {
    email: String,
    password: String,
    #[serde(rename = "displayName")]
    display_name: String,
  },
  SignInAnonymously,
  SignOut,
  CurrentUser,
  SelectLanguage {
    language: String,
  },
  CompleteOnboarding,
  OnboardingStatus,
  GenerateGames {
    prompt: String,
    language: String,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    count: Option<u32>,
  },
  Feedback {
    #[serde(rename = "userAnswer")]
    user_answer: String,
    #[serde(rename = "correctAnswer")]
    correct_answer: String,
    #[serde(default)]
    context: Option<String>,
  },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Session {
    user: Option<User>,
  },
  Onboarding {
    completed: bool,
  },
  Games {
    #[serde(rename = "gameSet")]
    game_set: GameSetOut,
  },
  Feedback {
    correct: bool,
    feedback: String,
  },
  Error {
    message: String,
    retryable: bool,
  },
}

impl ServerWsMessage {
  pub fn error(f: &Failure) -> Self {
    ServerWsMessage::Error { message: f.user_message(), retryable: f.is_retryable() }
  }
}

/// A stored, generated exercise set. Used by both WS and HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSetOut {
  #[serde(rename = "setId")]
  pub set_id: String,
  #[serde(flatten)]
  pub response: GenerationResponse,
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct GamesIn {
  pub prompt: String,
  pub language: String,
  #[serde(default)]
  pub difficulty: Option<String>,
  #[serde(default)]
  pub count: Option<u32>,
}

impl GamesIn {
  pub fn into_request(self) -> AppResult<GenerationRequest> {
    to_request(self.prompt, self.language, self.difficulty, self.count)
  }
}

/// Shared by HTTP and WS: fill defaults and check the difficulty label.
pub fn to_request(prompt: String, language: String, difficulty: Option<String>, count: Option<u32>) -> AppResult<GenerationRequest> {
  let difficulty = match difficulty.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
    Some(d) => Difficulty::parse(d).ok_or_else(|| Failure::Validation(format!("Unknown difficulty '{d}'")))?,
    None => Difficulty::default(),
  };
  Ok(GenerationRequest {
    prompt,
    language: language.trim().to_lowercase(),
    difficulty,
    count: count.unwrap_or(DEFAULT_EXERCISE_COUNT),
  })
}

#[derive(Debug, Deserialize)]
pub struct FeedbackIn {
  #[serde(rename = "userAnswer")]
  pub user_answer: String,
  #[serde(rename = "correctAnswer")]
  pub correct_answer: String,
  #[serde(default)]
  pub context: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorOut {
  pub message: String,
  pub retryable: bool,
}

#[derive(Serialize)]
pub struct LanguagesOut {
  pub languages: &'static [Language],
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub provider: &'static str,
  pub model: String,
}
