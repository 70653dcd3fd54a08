//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! Every connection carries its own sign-in session over the shared user directory.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::auth::{AuthProvider, InMemoryAuth};
use crate::domain::User;
use crate::error::{AppResult, Failure};
use crate::logic::*;
use crate::protocol::{to_request, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "devlanguages_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "devlanguages_backend", "WebSocket connected");
  let auth = InMemoryAuth::new(state.users.clone());

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "devlanguages_backend", kind = message_kind(&incoming), "WS received");
            handle_client_ws(incoming, &state, &auth).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e), retryable: false },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e), "retryable": false }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "devlanguages_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "devlanguages_backend", "WebSocket disconnected");
}

// Credentials must not reach the logs, so only the tag is recorded.
fn message_kind(msg: &ClientWsMessage) -> &'static str {
  match msg {
    ClientWsMessage::Ping => "ping",
    ClientWsMessage::SignIn { .. } => "sign_in",
    ClientWsMessage::SignUp { .. } => "sign_up",
    ClientWsMessage::SignInAnonymously => "sign_in_anonymously",
    ClientWsMessage::SignOut => "sign_out",
    ClientWsMessage::CurrentUser => "current_user",
    ClientWsMessage::SelectLanguage { .. } => "select_language",
    ClientWsMessage::CompleteOnboarding => "complete_onboarding",
    ClientWsMessage::OnboardingStatus => "onboarding_status",
    ClientWsMessage::GenerateGames { .. } => "generate_games",
    ClientWsMessage::Feedback { .. } => "feedback",
  }
}

async fn signed_in(auth: &dyn AuthProvider) -> AppResult<User> {
  auth.current_user().await.ok_or(Failure::Unauthorized)
}

#[instrument(level = "info", skip_all, fields(kind = message_kind(&msg)))]
pub async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, auth: &dyn AuthProvider) -> ServerWsMessage {
  dispatch(msg, state, auth).await.unwrap_or_else(|e| {
    info!(target: "devlanguages_backend", error = %e, "WS request failed");
    ServerWsMessage::error(&e)
  })
}

async fn dispatch(msg: ClientWsMessage, state: &AppState, auth: &dyn AuthProvider) -> AppResult<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::SignIn { email, password } => {
      let user = auth.sign_in(&email, &password).await?;
      remember_user(state, &user).await?;
      Ok(ServerWsMessage::Session { user: Some(user) })
    }

    ClientWsMessage::SignUp { email, password, display_name } => {
      let user = auth.sign_up(&email, &password, &display_name).await?;
      remember_user(state, &user).await?;
      Ok(ServerWsMessage::Session { user: Some(user) })
    }

    ClientWsMessage::SignInAnonymously => {
      let user = auth.sign_in_anonymously().await?;
      remember_user(state, &user).await?;
      Ok(ServerWsMessage::Session { user: Some(user) })
    }

    ClientWsMessage::SignOut => {
      auth.sign_out().await?;
      Ok(ServerWsMessage::Session { user: None })
    }

    ClientWsMessage::CurrentUser => Ok(ServerWsMessage::Session { user: auth.current_user().await }),

    ClientWsMessage::SelectLanguage { language } => {
      let user = signed_in(auth).await?;
      select_language(state, &user, &language).await?;
      Ok(ServerWsMessage::Session { user: Some(user) })
    }

    ClientWsMessage::CompleteOnboarding => {
      let user = signed_in(auth).await?;
      complete_onboarding(state, &user).await?;
      Ok(ServerWsMessage::Onboarding { completed: true })
    }

    ClientWsMessage::OnboardingStatus => {
      let user = signed_in(auth).await?;
      Ok(ServerWsMessage::Onboarding { completed: onboarding_status(state, &user.id).await? })
    }

    ClientWsMessage::GenerateGames { prompt, language, difficulty, count } => {
      let user = signed_in(auth).await?;
      let request = to_request(prompt, language, difficulty, count)?;
      let game_set = generate_game_set(state, Some(&user), &request).await?;
      info!(target: "generation", set_id = %game_set.set_id, exercises = game_set.response.games.len(), "WS games served");
      Ok(ServerWsMessage::Games { game_set })
    }

    ClientWsMessage::Feedback { user_answer, correct_answer, context } => {
      let fb = answer_feedback(state, &user_answer, &correct_answer, context.as_deref()).await?;
      Ok(ServerWsMessage::Feedback { correct: fb.correct, feedback: fb.feedback })
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::{json, Value};

  use super::*;
  use crate::logic::tests::offline_state;

  async fn send(state: &AppState, auth: &InMemoryAuth, msg: Value) -> Value {
    let msg: ClientWsMessage = serde_json::from_value(msg).expect("client message");
    serde_json::to_value(handle_client_ws(msg, state, auth).await).expect("server message")
  }

  #[tokio::test]
  async fn generation_needs_a_session() {
    let state = offline_state();
    let auth = InMemoryAuth::new(state.users.clone());
    let games = json!({ "type": "generate_games", "prompt": "past tense verbs", "language": "en", "count": 3 });

    let out = send(&state, &auth, games.clone()).await;
    assert_eq!(out["type"], "error");
    assert_eq!(out["message"], "You need to sign in again.");

    let out = send(&state, &auth, json!({ "type": "sign_in_anonymously" })).await;
    assert_eq!(out["type"], "session");
    assert_eq!(out["user"]["isAnonymous"], true);

    let out = send(&state, &auth, games).await;
    assert_eq!(out["type"], "games");
    assert_eq!(out["gameSet"]["games"].as_array().map(Vec::len), Some(3));
  }

  #[tokio::test]
  async fn sign_up_onboarding_and_sign_out() {
    let state = offline_state();
    let auth = InMemoryAuth::new(state.users.clone());

    let out = send(&state, &auth, json!({ "type": "sign_up", "email": "ana@example.com", "password": "secret1", "displayName": "Ana" })).await;
    assert_eq!(out["user"]["displayName"], "Ana");
    let user_id = out["user"]["id"].as_str().expect("id").to_string();

    let out = send(&state, &auth, json!({ "type": "select_language", "language": "ja" })).await;
    assert_eq!(out["type"], "session");
    assert_eq!(preferred_language(&state, &user_id).await.expect("get"), Some("ja".into()));

    let out = send(&state, &auth, json!({ "type": "onboarding_status" })).await;
    assert_eq!(out, json!({ "type": "onboarding", "completed": false }));
    let out = send(&state, &auth, json!({ "type": "complete_onboarding" })).await;
    assert_eq!(out, json!({ "type": "onboarding", "completed": true }));
    let out = send(&state, &auth, json!({ "type": "onboarding_status" })).await;
    assert_eq!(out["completed"], true);

    let out = send(&state, &auth, json!({ "type": "sign_out" })).await;
    assert_eq!(out["user"], Value::Null);
    let out = send(&state, &auth, json!({ "type": "onboarding_status" })).await;
    assert_eq!(out["type"], "error");
    let out = send(&state, &auth, json!({ "type": "current_user" })).await;
    assert_eq!(out["user"], Value::Null);

    let other = InMemoryAuth::new(state.users.clone());
    let out = send(&state, &other, json!({ "type": "sign_in", "email": "ana@example.com", "password": "wrong12" })).await;
    assert_eq!(out["message"], "Invalid email or password");
  }

  #[tokio::test]
  async fn ping_and_feedback_work_without_a_session() {
    let state = offline_state();
    let auth = InMemoryAuth::new(state.users.clone());
    assert_eq!(send(&state, &auth, json!({ "type": "ping" })).await, json!({ "type": "pong" }));

    let out = send(&state, &auth, json!({ "type": "feedback", "userAnswer": " ", "correctAnswer": "fui" })).await;
    assert_eq!(out["message"], "Answer cannot be empty");
  }
}
