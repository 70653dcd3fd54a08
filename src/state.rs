//! Application state: the generator, account directory and document store.
//!
//! Built once at startup from env + optional TOML config. The provider is Gemini
//! when GEMINI_API_KEY is set, otherwise the built-in seed provider.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::auth::UserDirectory;
use crate::config::{load_games_config_from_env, LlmSettings};
use crate::gemini::{GeminiClient, GenerationProvider};
use crate::generation::Generator;
use crate::ids::RandomIds;
use crate::seeds::SeedProvider;
use crate::store::{DocumentStore, InMemoryStore};

pub struct AppState {
  pub generator: Generator,
  pub users: UserDirectory,
  pub store: Arc<dyn DocumentStore>,
}

impl AppState {
  #[instrument(level = "info", skip_all)]
  pub fn from_env() -> Self {
    let cfg = load_games_config_from_env().unwrap_or_default();
    let llm = LlmSettings::resolve(&cfg.llm);
    let grammar = cfg.toon.grammar();

    let provider: Arc<dyn GenerationProvider> = match GeminiClient::from_env(&llm) {
      Some(client) => {
        info!(target: "devlanguages_backend", base_url = %client.base_url, model = %llm.model, temperature = llm.temperature, max_tokens = llm.max_tokens, "Gemini enabled.");
        Arc::new(client)
      }
      None => {
        warn!(target: "devlanguages_backend", "Gemini disabled (no GEMINI_API_KEY). Serving seed content.");
        Arc::new(SeedProvider::new(grammar.clone()))
      }
    };
    info!(target: "devlanguages_backend", section = %grammar.section, max_exercises = cfg.limits.max_exercises, "Generation configured");

    let generator = Generator::new(provider, llm, grammar, cfg.limits, cfg.prompts, Arc::new(RandomIds));
    Self::new(generator, UserDirectory::default(), Arc::new(InMemoryStore::new()))
  }

  pub fn new(generator: Generator, users: UserDirectory, store: Arc<dyn DocumentStore>) -> Self {
    Self { generator, users, store }
  }
}
