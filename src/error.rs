//! The one failure type shared by the generation pipeline and its collaborators.
//!
//! Transport faults keep their category so callers can decide whether a retry makes
//! sense; everything the TOON core or the collaborators report is folded in here too.

use thiserror::Error;

pub type AppResult<T> = Result<T, Failure>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
  #[error("no network connection")]
  NoConnection,
  #[error("request timed out")]
  Timeout,
  #[error("server error (HTTP {code})")]
  ServerError { code: u16 },
  #[error("client error (HTTP {code})")]
  ClientError { code: u16 },
  #[error("unauthorized")]
  Unauthorized,
  #[error("resource not found")]
  NotFound,
  #[error("rate limit exceeded")]
  RateLimitExceeded,
  #[error("invalid API key")]
  InvalidApiKey,

  /// The provider answered, but the answer could not be turned into exercises.
  #[error("parse failure: {0}")]
  Parse(String),

  #[error("authentication failed: {0}")]
  Auth(String),
  #[error("invalid input: {0}")]
  Validation(String),
  #[error("document store error: {0}")]
  Store(String),

  #[error("unexpected error: {0}")]
  Unknown(String),
}

impl Failure {
  /// Connectivity and server-side faults may go away on their own; the rest need the
  /// caller to change something first (wait out a limit, sign in again, fix input).
  pub fn is_retryable(&self) -> bool {
    matches!(self, Failure::NoConnection | Failure::Timeout | Failure::ServerError { .. })
  }

  /// Short text suitable for showing to an end user.
  pub fn user_message(&self) -> String {
    match self {
      Failure::NoConnection => "Check your internet connection.".into(),
      Failure::Timeout => "The connection is taking too long. Try again.".into(),
      Failure::ServerError { .. } => "Our servers are having problems. Try again later.".into(),
      Failure::ClientError { .. } => "Something went wrong. Try again.".into(),
      Failure::Unauthorized => "You need to sign in again.".into(),
      Failure::NotFound => "Content not found.".into(),
      Failure::RateLimitExceeded => "Usage limit reached. Wait a few minutes.".into(),
      Failure::InvalidApiKey => "Invalid configuration. Contact support.".into(),
      Failure::Parse(_) => "Could not generate content. Try again.".into(),
      Failure::Auth(msg) | Failure::Validation(msg) => msg.clone(),
      Failure::Store(_) | Failure::Unknown(_) => "Something went wrong. Try again.".into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_transient_faults_are_retryable() {
    assert!(Failure::NoConnection.is_retryable());
    assert!(Failure::Timeout.is_retryable());
    assert!(Failure::ServerError { code: 503 }.is_retryable());

    assert!(!Failure::RateLimitExceeded.is_retryable());
    assert!(!Failure::Unauthorized.is_retryable());
    assert!(!Failure::InvalidApiKey.is_retryable());
    assert!(!Failure::Parse("unparseable".into()).is_retryable());
  }

  #[test]
  fn validation_messages_reach_the_user_verbatim() {
    let f = Failure::Validation("Password must have at least 6 characters".into());
    assert_eq!(f.user_message(), "Password must have at least 6 characters");
    assert_eq!(Failure::Parse("empty response".into()).user_message(), "Could not generate content. Try again.");
  }
}
