//! Account sign-in for the WebSocket API.
//!
//! `UserDirectory` is the process-wide account table; `InMemoryAuth` is one
//! connection's session on top of it. Passwords are stored as salted SHA-256.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::User;
use crate::error::{AppResult, Failure};

const MIN_PASSWORD_CHARS: usize = 6;
const MIN_DISPLAY_NAME_CHARS: usize = 2;
const ANONYMOUS_NAME: &str = "Guest";

#[async_trait]
pub trait AuthProvider: Send + Sync {
  async fn sign_in(&self, email: &str, password: &str) -> AppResult<User>;
  async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> AppResult<User>;
  async fn sign_in_anonymously(&self) -> AppResult<User>;
  async fn sign_out(&self) -> AppResult<()>;
  async fn current_user(&self) -> Option<User>;

  async fn is_authenticated(&self) -> bool {
    self.current_user().await.is_some()
  }
}

struct Account {
  user: User,
  salt: String,
  password_hash: String,
}

/// Registered email accounts, keyed by lowercased email.
#[derive(Clone, Default)]
pub struct UserDirectory {
  accounts: Arc<RwLock<HashMap<String, Account>>>,
}

impl UserDirectory {
  #[instrument(level = "debug", skip(self, password, display_name))]
  pub async fn register(&self, email: &str, password: &str, display_name: &str) -> AppResult<User> {
    validate_sign_up(email, password, display_name)?;
    let key = normalize_email(email);

    let mut accounts = self.accounts.write().await;
    if accounts.contains_key(&key) {
      warn!(target: "auth", email = %key, "Sign-up with an email already in use");
      return Err(Failure::Auth("This email is already in use".into()));
    }

    let user = User {
      id: Uuid::new_v4().to_string(),
      email: key.clone(),
      display_name: display_name.trim().to_string(),
      photo_url: None,
      is_anonymous: false,
      created_at_millis: now_millis(),
    };
    let salt = Uuid::new_v4().simple().to_string();
    let password_hash = hash_password(&salt, password);
    accounts.insert(key, Account { user: user.clone(), salt, password_hash });
    Ok(user)
  }

  #[instrument(level = "debug", skip(self, password))]
  pub async fn verify(&self, email: &str, password: &str) -> AppResult<User> {
    validate_sign_in(email, password)?;
    let accounts = self.accounts.read().await;
    match accounts.get(&normalize_email(email)) {
      Some(acc) if acc.password_hash == hash_password(&acc.salt, password) => Ok(acc.user.clone()),
      _ => Err(Failure::Auth("Invalid email or password".into())),
    }
  }

  #[cfg(test)]
  pub async fn len(&self) -> usize {
    self.accounts.read().await.len()
  }
}

/// One connection's signed-in user.
pub struct InMemoryAuth {
  directory: UserDirectory,
  current: RwLock<Option<User>>,
}

impl InMemoryAuth {
  pub fn new(directory: UserDirectory) -> Self {
    Self { directory, current: RwLock::new(None) }
  }

  async fn set_current(&self, user: User) -> User {
    *self.current.write().await = Some(user.clone());
    user
  }
}

#[async_trait]
impl AuthProvider for InMemoryAuth {
  async fn sign_in(&self, email: &str, password: &str) -> AppResult<User> {
    let user = self.directory.verify(email, password).await?;
    info!(target: "auth", user_id = %user.id, "Signed in");
    Ok(self.set_current(user).await)
  }

  async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> AppResult<User> {
    let user = self.directory.register(email, password, display_name).await?;
    info!(target: "auth", user_id = %user.id, "Account created");
    Ok(self.set_current(user).await)
  }

  async fn sign_in_anonymously(&self) -> AppResult<User> {
    let user = User {
      id: Uuid::new_v4().to_string(),
      email: String::new(),
      display_name: ANONYMOUS_NAME.into(),
      photo_url: None,
      is_anonymous: true,
      created_at_millis: now_millis(),
    };
    info!(target: "auth", user_id = %user.id, "Anonymous session started");
    Ok(self.set_current(user).await)
  }

  async fn sign_out(&self) -> AppResult<()> {
    if let Some(user) = self.current.write().await.take() {
      info!(target: "auth", user_id = %user.id, "Signed out");
    }
    Ok(())
  }

  async fn current_user(&self) -> Option<User> {
    self.current.read().await.clone()
  }
}

pub fn validate_sign_in(email: &str, password: &str) -> AppResult<()> {
  if email.trim().is_empty() {
    return Err(Failure::Validation("Email cannot be empty".into()));
  }
  if password.trim().is_empty() {
    return Err(Failure::Validation("Password cannot be empty".into()));
  }
  if password.chars().count() < MIN_PASSWORD_CHARS {
    return Err(Failure::Validation(format!("Password must be at least {MIN_PASSWORD_CHARS} characters")));
  }
  Ok(())
}

pub fn validate_sign_up(email: &str, password: &str, display_name: &str) -> AppResult<()> {
  validate_sign_in(email, password)?;
  if !email.contains('@') {
    return Err(Failure::Validation("Invalid email".into()));
  }
  let name = display_name.trim();
  if name.is_empty() {
    return Err(Failure::Validation("Name cannot be empty".into()));
  }
  if name.chars().count() < MIN_DISPLAY_NAME_CHARS {
    return Err(Failure::Validation(format!("Name must be at least {MIN_DISPLAY_NAME_CHARS} characters")));
  }
  Ok(())
}

fn normalize_email(email: &str) -> String {
  email.trim().to_lowercase()
}

fn hash_password(salt: &str, password: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(salt.as_bytes());
  hasher.update(password.as_bytes());
  format!("{:x}", hasher.finalize())
}

fn now_millis() -> Option<u64> {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .ok()
    .and_then(|d| u64::try_from(d.as_millis()).ok())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn accounts_are_shared_across_sessions() {
    let dir = UserDirectory::default();
    let first = InMemoryAuth::new(dir.clone());
    let created = first.sign_up("Ana@Example.com ", "secret1", "Ana").await.expect("sign up");
    assert_eq!(created.email, "ana@example.com");
    assert!(!created.is_anonymous);
    assert!(first.is_authenticated().await);

    let second = InMemoryAuth::new(dir.clone());
    assert!(!second.is_authenticated().await);
    let again = second.sign_in("ana@example.com", "secret1").await.expect("sign in");
    assert_eq!(again.id, created.id);
    assert_eq!(dir.len().await, 1);
  }

  #[tokio::test]
  async fn wrong_password_and_duplicates_are_rejected() {
    let auth = InMemoryAuth::new(UserDirectory::default());
    auth.sign_up("bo@example.com", "secret1", "Bo").await.expect("sign up");

    assert_eq!(
      auth.sign_up("BO@example.com", "another1", "Bo").await.unwrap_err(),
      Failure::Auth("This email is already in use".into())
    );
    assert_eq!(
      auth.sign_in("bo@example.com", "secret2").await.unwrap_err(),
      Failure::Auth("Invalid email or password".into())
    );
    assert!(matches!(auth.sign_in("nobody@example.com", "secret1").await, Err(Failure::Auth(_))));
  }

  #[tokio::test]
  async fn anonymous_session_and_sign_out() {
    let auth = InMemoryAuth::new(UserDirectory::default());
    let guest = auth.sign_in_anonymously().await.expect("guest");
    assert!(guest.is_anonymous);
    assert_eq!(auth.current_user().await.map(|u| u.id), Some(guest.id));

    auth.sign_out().await.expect("sign out");
    assert!(auth.current_user().await.is_none());
    auth.sign_out().await.expect("second sign out is a no-op");
  }

  #[test]
  fn sign_up_input_is_checked_in_order() {
    let v = |e, p, n| validate_sign_up(e, p, n).unwrap_err();
    assert_eq!(v("", "secret1", "Ana"), Failure::Validation("Email cannot be empty".into()));
    assert_eq!(v("ana.example.com", "secret1", "Ana"), Failure::Validation("Invalid email".into()));
    assert_eq!(v("a@b.c", "12345", "Ana"), Failure::Validation("Password must be at least 6 characters".into()));
    assert_eq!(v("a@b.c", "123456", " "), Failure::Validation("Name cannot be empty".into()));
    assert_eq!(v("a@b.c", "123456", "A"), Failure::Validation("Name must be at least 2 characters".into()));
    assert!(validate_sign_up("a@b.c", "123456", "Al").is_ok());
  }
}
