//! Secret storage.
//!
//! Passwords and `OAuth2` tokens go to the platform's native credential
//! storage:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager
//!
//! [`SecretStore`] keeps callers independent of the keyring so that tests
//! can use [`MemoryStore`].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use tracing::{debug, warn};

/// Service name used for keyring entries.
pub const SERVICE_NAME: &str = "purse";

/// Key of the remembered mailbox password.
pub const MAIL_PASSWORD: &str = "mail_password";

/// Key of the Google `OAuth2` token.
pub const GOOGLE_TOKEN: &str = "google_token";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Stored token could not be (de)serialized.
    #[error("Token encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Key-value store for secrets.
pub trait SecretStore: Send + Sync {
    /// Returns the secret under `key`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> CredentialResult<Option<String>>;

    /// Stores `secret` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, secret: &str) -> CredentialResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn delete(&self, key: &str) -> CredentialResult<()>;
}

/// Secrets in the system keyring.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Uses a custom keyring service name.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> CredentialResult<Entry> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => {
                debug!(key, "no keyring entry");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, secret: &str) -> CredentialResult<()> {
        self.entry(key)?.set_password(secret)?;
        debug!(key, "stored keyring entry");
        Ok(())
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => {
                debug!(key, "deleted keyring entry");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!(key, "failed to delete keyring entry: {e}");
                Err(e.into())
            }
        }
    }
}

/// Secrets held in memory, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, secret: &str) -> CredentialResult<()> {
        self.entries().insert(key.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Stores an `OAuth2` token as JSON.
///
/// # Errors
///
/// Returns an error if serialization or the store fails.
pub fn store_oauth_token(store: &dyn SecretStore, token: &purse_oauth::Token) -> CredentialResult<()> {
    let token_json = serde_json::to_string(token)?;
    store.set(GOOGLE_TOKEN, &token_json)
}

/// Loads the stored `OAuth2` token.
///
/// # Errors
///
/// Returns an error if the store fails or the entry is not a token.
pub fn get_oauth_token(store: &dyn SecretStore) -> CredentialResult<Option<purse_oauth::Token>> {
    store
        .get(GOOGLE_TOKEN)?
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(Into::into)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get(MAIL_PASSWORD).unwrap(), None);

        store.set(MAIL_PASSWORD, "hunter2").unwrap();
        assert_eq!(store.get(MAIL_PASSWORD).unwrap().as_deref(), Some("hunter2"));

        store.delete(MAIL_PASSWORD).unwrap();
        store.delete(MAIL_PASSWORD).unwrap();
        assert_eq!(store.get(MAIL_PASSWORD).unwrap(), None);
    }

    #[test]
    fn test_oauth_token_round_trip() {
        let store = MemoryStore::new();
        let token = purse_oauth::Token::new("ya29.a", "Bearer").with_refresh_token("1//r");
        store_oauth_token(&store, &token).unwrap();

        let loaded = get_oauth_token(&store).unwrap().unwrap();
        assert_eq!(loaded.access_token, "ya29.a");
        assert_eq!(loaded.refresh_token.as_deref(), Some("1//r"));
    }

    #[test]
    fn test_oauth_token_garbage() {
        let store = MemoryStore::new();
        store.set(GOOGLE_TOKEN, "not json").unwrap();
        assert!(matches!(
            get_oauth_token(&store),
            Err(CredentialError::Encoding(_))
        ));
    }

    // Touches the real keyring. Run manually with `cargo test -- --ignored`.
    #[test]
    #[ignore = "Interacts with system keyring"]
    fn test_keyring_store() {
        let store = KeyringStore::new("purse-test");
        store.set("probe", "secret").unwrap();
        assert_eq!(store.get("probe").unwrap().as_deref(), Some("secret"));
        store.delete("probe").unwrap();
        assert_eq!(store.get("probe").unwrap(), None);
    }
}
