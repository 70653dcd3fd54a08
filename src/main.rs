//! DevLanguages · Exercise Generation Backend
//!
//! - Axum HTTP + WebSocket API
//! - Gemini generation with TOON-formatted replies (offline seed content without a key)
//! - In-memory accounts and document store
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   GEMINI_API_KEY    : enables Gemini if present
//!   GEMINI_BASE_URL   : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL      : default "gemini-1.5-flash"
//!   LLM_PRESET        : "default", "creative" or "precise"
//!   GAMES_CONFIG_PATH : path to TOML config (llm overrides, toon, limits, prompts)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod auth;
mod config;
mod domain;
mod error;
mod gemini;
mod generation;
mod ids;
mod logic;
mod prompt;
mod protocol;
mod routes;
mod seeds;
mod state;
mod store;
mod telemetry;
mod toon;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let state = Arc::new(AppState::from_env());
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "devlanguages_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "devlanguages_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "devlanguages_backend", "Shutdown requested");
}
