//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - generating exercise sets and persisting them under `game_sets/{id}`
//!   - loading a stored set back
//!   - answer feedback
//!   - user profiles, the preferred language and onboarding completion under `users/{id}`

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{find_language, Feedback, GenerationRequest, GenerationResponse, User};
use crate::error::{AppResult, Failure};
use crate::protocol::GameSetOut;
use crate::state::AppState;
use crate::store::{collections, Document};
use crate::toon::serialize;

const FIELD_PREFERRED_LANGUAGE: &str = "preferredLanguage";
const FIELD_ONBOARDING_COMPLETE: &str = "onboardingComplete";

fn to_document<T: Serialize>(value: &T) -> AppResult<Document> {
  match serde_json::to_value(value) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(other) => Err(Failure::Store(format!("expected a JSON object, got {other}"))),
    Err(e) => Err(Failure::Store(e.to_string())),
  }
}

/// Generate a set and store it. The TOON rendering is kept next to the JSON.
#[instrument(level = "info", skip(state, owner, request), fields(owner = owner.map(|u| u.id.as_str()).unwrap_or("-")))]
pub async fn generate_game_set(state: &AppState, owner: Option<&User>, request: &GenerationRequest) -> AppResult<GameSetOut> {
  let response = state.generator.generate(request).await?;
  let set_id = Uuid::new_v4().to_string();

  let mut doc = Document::new();
  doc.insert("ownerId".into(), json!(owner.map(|u| u.id.clone())));
  doc.insert("request".into(), Value::Object(to_document(request)?));
  doc.insert("response".into(), Value::Object(to_document(&response)?));
  doc.insert("toon".into(), json!(serialize(&response, state.generator.grammar())));
  state.store.set(collections::GAME_SETS, &set_id, doc).await?;

  info!(target: "generation", %set_id, exercises = response.games.len(), "Game set stored");
  Ok(GameSetOut { set_id, response })
}

#[instrument(level = "info", skip(state), fields(%set_id))]
pub async fn load_game_set(state: &AppState, set_id: &str) -> AppResult<GameSetOut> {
  let doc = state.store.get(collections::GAME_SETS, set_id).await?.ok_or(Failure::NotFound)?;
  let response = doc
    .get("response")
    .cloned()
    .ok_or_else(|| Failure::Store(format!("game set {set_id} has no response")))?;
  let response: GenerationResponse =
    serde_json::from_value(response).map_err(|e| Failure::Store(format!("game set {set_id}: {e}")))?;
  Ok(GameSetOut { set_id: set_id.to_string(), response })
}

pub async fn answer_feedback(state: &AppState, user_answer: &str, correct_answer: &str, context: Option<&str>) -> AppResult<Feedback> {
  state.generator.feedback(user_answer, correct_answer, context).await
}

/// Create or refresh `users/{id}` with the account's profile fields.
#[instrument(level = "debug", skip(state, user), fields(user_id = %user.id))]
pub async fn remember_user(state: &AppState, user: &User) -> AppResult<()> {
  let profile = to_document(user)?;
  match state.store.update(collections::USERS, &user.id, profile.clone()).await {
    Err(Failure::NotFound) => state.store.set(collections::USERS, &user.id, profile).await,
    other => other,
  }
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id, %code))]
pub async fn select_language(state: &AppState, user: &User, code: &str) -> AppResult<()> {
  let code = code.trim().to_lowercase();
  let language = find_language(&code).ok_or_else(|| Failure::Validation(format!("Unsupported language '{code}'")))?;

  let mut fields = Document::new();
  fields.insert(FIELD_PREFERRED_LANGUAGE.into(), json!(language.code));
  merge_profile(state, user, fields).await?;
  info!(target: "devlanguages_backend", user_id = %user.id, language = language.code, "Preferred language saved");
  Ok(())
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn complete_onboarding(state: &AppState, user: &User) -> AppResult<()> {
  let mut fields = Document::new();
  fields.insert(FIELD_ONBOARDING_COMPLETE.into(), json!(true));
  merge_profile(state, user, fields).await?;
  info!(target: "devlanguages_backend", user_id = %user.id, "Onboarding completed");
  Ok(())
}

/// A missing profile or a non-boolean flag counts as not completed.
pub async fn onboarding_status(state: &AppState, user_id: &str) -> AppResult<bool> {
  Ok(
    state
      .store
      .get(collections::USERS, user_id)
      .await?
      .and_then(|doc| doc.get(FIELD_ONBOARDING_COMPLETE).and_then(Value::as_bool))
      .unwrap_or(false),
  )
}

// Update `users/{id}`, creating it from the account profile when it does not exist yet.
async fn merge_profile(state: &AppState, user: &User, fields: Document) -> AppResult<()> {
  match state.store.update(collections::USERS, &user.id, fields.clone()).await {
    Err(Failure::NotFound) => {
      let mut profile = to_document(user)?;
      profile.extend(fields);
      state.store.set(collections::USERS, &user.id, profile).await
    }
    other => other,
  }
}

pub async fn preferred_language(state: &AppState, user_id: &str) -> AppResult<Option<String>> {
  Ok(
    state
      .store
      .get(collections::USERS, user_id)
      .await?
      .and_then(|doc| doc.get(FIELD_PREFERRED_LANGUAGE).and_then(Value::as_str).map(str::to_string)),
  )
}

#[cfg(test)]
pub(crate) mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::auth::UserDirectory;
  use crate::config::{Limits, LlmPreset, Prompts};
  use crate::domain::{Difficulty, ExerciseKind};
  use crate::generation::Generator;
  use crate::ids::SequentialIds;
  use crate::seeds::SeedProvider;
  use crate::store::InMemoryStore;
  use crate::toon::ToonGrammar;

  /// State backed by the seed provider and an in-memory store.
  pub(crate) fn offline_state() -> AppState {
    let grammar = ToonGrammar::default();
    let generator = Generator::new(
      Arc::new(SeedProvider::new(grammar.clone())),
      LlmPreset::Default.settings("seed"),
      grammar,
      Limits::default(),
      Prompts::default(),
      Arc::new(SequentialIds::default()),
    );
    AppState::new(generator, UserDirectory::default(), Arc::new(InMemoryStore::new()))
  }

  fn user() -> User {
    User {
      id: "u1".into(),
      email: "ana@example.com".into(),
      display_name: "Ana".into(),
      photo_url: None,
      is_anonymous: false,
      created_at_millis: Some(1),
    }
  }

  fn request() -> GenerationRequest {
    GenerationRequest { prompt: "past tense verbs".into(), language: "en".into(), difficulty: Difficulty::Beginner, count: 3 }
  }

  #[tokio::test]
  async fn generated_sets_are_stored_and_reloadable() {
    let state = offline_state();
    let owner = user();
    let set = generate_game_set(&state, Some(&owner), &request()).await.expect("set");
    assert_eq!(set.response.games.len(), 3);
    assert_eq!(set.response.games[2].kind, ExerciseKind::Matching);

    let reloaded = load_game_set(&state, &set.set_id).await.expect("reload");
    assert_eq!(reloaded, set);

    let doc = state.store.get(collections::GAME_SETS, &set.set_id).await.expect("get").expect("doc");
    assert_eq!(doc["ownerId"], "u1");
    assert!(doc["toon"].as_str().unwrap_or_default().contains("games[3]{type,question,answer,options,explanation}:"));
  }

  #[tokio::test]
  async fn missing_set_is_not_found() {
    let state = offline_state();
    assert_eq!(load_game_set(&state, "nope").await.unwrap_err(), Failure::NotFound);
  }

  #[tokio::test]
  async fn preferred_language_is_saved_on_the_profile() {
    let state = offline_state();
    let u = user();

    select_language(&state, &u, "FR").await.expect("select");
    assert_eq!(preferred_language(&state, "u1").await.expect("get"), Some("fr".into()));

    remember_user(&state, &u).await.expect("remember");
    let doc = state.store.get(collections::USERS, "u1").await.expect("get").expect("doc");
    assert_eq!(doc["displayName"], "Ana");
    assert_eq!(doc[FIELD_PREFERRED_LANGUAGE], "fr", "profile refresh keeps the language");

    assert!(matches!(select_language(&state, &u, "xx").await, Err(Failure::Validation(_))));
  }

  #[tokio::test]
  async fn onboarding_completion_is_saved_on_the_profile() {
    let state = offline_state();
    let u = user();
    assert!(!onboarding_status(&state, "u1").await.expect("status"), "no profile yet");

    complete_onboarding(&state, &u).await.expect("complete");
    assert!(onboarding_status(&state, "u1").await.expect("status"));
    let doc = state.store.get(collections::USERS, "u1").await.expect("get").expect("doc");
    assert_eq!(doc["email"], "ana@example.com");

    select_language(&state, &u, "de").await.expect("select");
    remember_user(&state, &u).await.expect("remember");
    assert!(onboarding_status(&state, "u1").await.expect("status"), "other profile writes keep the flag");
    assert_eq!(preferred_language(&state, "u1").await.expect("get"), Some("de".into()));
  }
}
