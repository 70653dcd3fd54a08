//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Failures become `{message, retryable}` with a matching status code.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::domain::languages;
use crate::error::Failure;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for Failure {
  fn into_response(self) -> Response {
    let status = status_for(&self);
    if status.is_server_error() {
      warn!(target: "devlanguages_backend", %status, error = %self, "Request failed");
    }
    (status, Json(ErrorOut { message: self.user_message(), retryable: self.is_retryable() })).into_response()
  }
}

fn status_for(f: &Failure) -> StatusCode {
  match f {
    Failure::Validation(_) => StatusCode::BAD_REQUEST,
    Failure::Auth(_) | Failure::Unauthorized => StatusCode::UNAUTHORIZED,
    Failure::NotFound => StatusCode::NOT_FOUND,
    Failure::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
    Failure::Timeout => StatusCode::GATEWAY_TIMEOUT,
    Failure::NoConnection | Failure::ServerError { .. } => StatusCode::SERVICE_UNAVAILABLE,
    Failure::InvalidApiKey | Failure::ClientError { .. } | Failure::Parse(_) => StatusCode::BAD_GATEWAY,
    Failure::Store(_) | Failure::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    provider: state.generator.provider_name(),
    model: state.generator.llm().model.clone(),
  })
}

#[instrument(level = "info")]
pub async fn http_languages() -> impl IntoResponse {
  Json(LanguagesOut { languages: languages() })
}

#[instrument(level = "info", skip(state, body), fields(language = %body.language, prompt_len = body.prompt.len()))]
pub async fn http_post_games(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GamesIn>,
) -> Result<Json<GameSetOut>, Failure> {
  let request = body.into_request()?;
  let set = generate_game_set(&state, None, &request).await?;
  info!(target: "generation", set_id = %set.set_id, exercises = set.response.games.len(), "HTTP games served");
  Ok(Json(set))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_game_set(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<GameSetOut>, Failure> {
  Ok(Json(load_game_set(&state, &id).await?))
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.user_answer.len()))]
pub async fn http_post_feedback(
  State(state): State<Arc<AppState>>,
  Json(body): Json<FeedbackIn>,
) -> Result<Json<crate::domain::Feedback>, Failure> {
  let fb = answer_feedback(&state, &body.user_answer, &body.correct_answer, body.context.as_deref()).await?;
  Ok(Json(fb))
}
