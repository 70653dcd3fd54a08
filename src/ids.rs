//! Exercise id generation. Ids only need to be distinct within one response.

use std::sync::atomic::{AtomicU64, Ordering};

pub trait IdGenerator: Send + Sync {
  fn next_id(&self) -> String;
}

/// Production generator: `game_<random u64>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
  fn next_id(&self) -> String {
    format!("game_{}", rand::random::<u64>())
  }
}

/// Deterministic generator: `game_1`, `game_2`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
  next: AtomicU64,
}

impl IdGenerator for SequentialIds {
  fn next_id(&self) -> String {
    let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
    format!("game_{n}")
  }
}

impl<F> IdGenerator for F
where
  F: Fn() -> String + Send + Sync,
{
  fn next_id(&self) -> String {
    self()
  }
}
