//! Document persistence: JSON objects addressed by `collection/id`.
//!
//! `InMemoryStore` keeps every document behind a `watch` channel so `observe`
//! subscribers see each write; a deleted document reads as `None`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::{debug, instrument};

use crate::error::{AppResult, Failure};

pub type Document = serde_json::Map<String, Value>;

pub mod collections {
  pub const USERS: &str = "users";
  pub const GAME_SETS: &str = "game_sets";
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
  async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>>;
  /// Create or replace.
  async fn set(&self, collection: &str, id: &str, doc: Document) -> AppResult<()>;
  /// Merge top-level fields into an existing document.
  async fn update(&self, collection: &str, id: &str, fields: Document) -> AppResult<()>;
  async fn delete(&self, collection: &str, id: &str) -> AppResult<()>;
  /// Every live document of a collection, ordered by id.
  async fn list(&self, collection: &str) -> AppResult<Vec<(String, Document)>>;
  /// Current value now, then every later write.
  async fn observe(&self, collection: &str, id: &str) -> AppResult<watch::Receiver<Option<Document>>>;
}

#[derive(Default)]
pub struct InMemoryStore {
  docs: RwLock<HashMap<String, watch::Sender<Option<Document>>>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

fn doc_key(collection: &str, id: &str) -> AppResult<String> {
  if collection.trim().is_empty() || id.trim().is_empty() {
    return Err(Failure::Store(format!("invalid document path '{collection}/{id}'")));
  }
  if collection.contains('/') || id.contains('/') {
    return Err(Failure::Store(format!("'/' is not allowed in '{collection}/{id}'")));
  }
  Ok(format!("{collection}/{id}"))
}

#[async_trait]
impl DocumentStore for InMemoryStore {
  async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
    let key = doc_key(collection, id)?;
    Ok(self.docs.read().await.get(&key).and_then(|tx| tx.borrow().clone()))
  }

  #[instrument(level = "debug", skip(self, doc), fields(fields = doc.len()))]
  async fn set(&self, collection: &str, id: &str, doc: Document) -> AppResult<()> {
    let key = doc_key(collection, id)?;
    let mut docs = self.docs.write().await;
    match docs.entry(key) {
      Entry::Occupied(slot) => {
        slot.get().send_replace(Some(doc));
      }
      Entry::Vacant(slot) => {
        slot.insert(watch::channel(Some(doc)).0);
      }
    }
    Ok(())
  }

  #[instrument(level = "debug", skip(self, fields), fields(fields = fields.len()))]
  async fn update(&self, collection: &str, id: &str, fields: Document) -> AppResult<()> {
    let key = doc_key(collection, id)?;
    let docs = self.docs.read().await;
    let tx = docs.get(&key).ok_or(Failure::NotFound)?;
    let merged = tx.send_if_modified(|current| match current {
      Some(doc) => {
        doc.extend(fields);
        true
      }
      None => false,
    });
    if merged { Ok(()) } else { Err(Failure::NotFound) }
  }

  async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
    let key = doc_key(collection, id)?;
    if let Some(tx) = self.docs.read().await.get(&key) {
      tx.send_replace(None);
      debug!(target: "devlanguages_backend", %key, "Document deleted");
    }
    Ok(())
  }

  async fn list(&self, collection: &str) -> AppResult<Vec<(String, Document)>> {
    doc_key(collection, "_")?;
    let prefix = format!("{collection}/");
    let docs = self.docs.read().await;
    let mut out: Vec<(String, Document)> = docs
      .iter()
      .filter_map(|(key, tx)| {
        let id = key.strip_prefix(prefix.as_str())?;
        tx.borrow().clone().map(|doc| (id.to_string(), doc))
      })
      .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
  }

  async fn observe(&self, collection: &str, id: &str) -> AppResult<watch::Receiver<Option<Document>>> {
    let key = doc_key(collection, id)?;
    let mut docs = self.docs.write().await;
    let tx = docs.entry(key).or_insert_with(|| watch::channel(None).0);
    Ok(tx.subscribe())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn doc(v: Value) -> Document {
    v.as_object().cloned().expect("object")
  }

  #[tokio::test]
  async fn set_get_update_delete() {
    let store = InMemoryStore::new();
    assert_eq!(store.get("users", "u1").await.expect("get"), None);

    store.set("users", "u1", doc(json!({ "displayName": "Ana", "preferredLanguage": "es" }))).await.expect("set");
    store.update("users", "u1", doc(json!({ "preferredLanguage": "fr", "streak": 2 }))).await.expect("update");

    let got = store.get("users", "u1").await.expect("get").expect("present");
    assert_eq!(Value::Object(got), json!({ "displayName": "Ana", "preferredLanguage": "fr", "streak": 2 }));

    store.delete("users", "u1").await.expect("delete");
    assert_eq!(store.get("users", "u1").await.expect("get"), None);
    assert_eq!(store.update("users", "u1", Document::new()).await.unwrap_err(), Failure::NotFound);
  }

  #[tokio::test]
  async fn list_is_scoped_to_the_collection() {
    let store = InMemoryStore::new();
    store.set("game_sets", "b", doc(json!({ "n": 2 }))).await.expect("set");
    store.set("game_sets", "a", doc(json!({ "n": 1 }))).await.expect("set");
    store.set("users", "a", doc(json!({ "n": 3 }))).await.expect("set");
    store.set("game_sets_archive", "c", doc(json!({ "n": 4 }))).await.expect("set");

    let ids: Vec<String> = store.list("game_sets").await.expect("list").into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, ["a", "b"]);
  }

  #[tokio::test]
  async fn observers_see_later_writes() {
    let store = InMemoryStore::new();
    let mut rx = store.observe("users", "u1").await.expect("observe");
    assert!(rx.borrow().is_none());

    store.set("users", "u1", doc(json!({ "displayName": "Ana" }))).await.expect("set");
    rx.changed().await.expect("changed");
    assert_eq!(rx.borrow().as_ref().and_then(|d| d.get("displayName")).cloned(), Some(json!("Ana")));

    store.delete("users", "u1").await.expect("delete");
    rx.changed().await.expect("changed");
    assert!(rx.borrow().is_none());
  }

  #[tokio::test]
  async fn bad_paths_are_store_failures() {
    let store = InMemoryStore::new();
    assert!(matches!(store.get("", "x").await, Err(Failure::Store(_))));
    assert!(matches!(store.set("users", "a/b", Document::new()).await, Err(Failure::Store(_))));
  }
}
