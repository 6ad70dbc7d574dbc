//! Who is signed in, and what the last probe found.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use purse_oauth::{Token, UserInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Result;
use crate::credentials::{self, GOOGLE_TOKEN, SecretStore};

/// How the user signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    /// Google account.
    Google,
    /// Mailbox login (IMAP or POP3).
    Mail,
}

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider account id. For mailbox logins, the email address.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Display name, if the provider shared one.
    pub display_name: Option<String>,
    /// How the user signed in.
    pub provider: IdentityProvider,
}

/// Session-scoped state. Nothing here survives [`Session::sign_out`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
    gmail_access: bool,
    unread_count: Option<u32>,
    last_error: Option<String>,
}

impl Session {
    /// Starts a session for a Google account.
    pub fn sign_in_google(&mut self, info: &UserInfo, gmail_access: bool) {
        *self = Self {
            identity: Some(Identity {
                id: info.id.clone(),
                email: info.email.clone(),
                display_name: info.name.clone(),
                provider: IdentityProvider::Google,
            }),
            gmail_access,
            ..Self::default()
        };
    }

    /// Starts a session after a successful mailbox login.
    pub fn sign_in_mail(&mut self, email: &str, unread_count: u32) {
        *self = Self {
            identity: Some(Identity {
                id: email.to_string(),
                email: email.to_string(),
                display_name: None,
                provider: IdentityProvider::Mail,
            }),
            unread_count: Some(unread_count),
            ..Self::default()
        };
    }

    /// Records a successful unread count and clears the last error.
    pub fn record_unread(&mut self, count: u32) {
        self.unread_count = Some(count);
        self.last_error = None;
    }

    /// Records a user-facing error message.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Clears everything: identity, access flag, counts and errors.
    pub fn sign_out(&mut self) {
        *self = Self::default();
    }

    /// Returns true if someone is signed in.
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    /// The signed-in account.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Whether read-only Gmail access was granted.
    #[must_use]
    pub const fn gmail_access(&self) -> bool {
        self.gmail_access
    }

    /// Unread messages found by the last probe.
    #[must_use]
    pub const fn unread_count(&self) -> Option<u32> {
        self.unread_count
    }

    /// The last error shown to the user.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    #[serde(default)]
    identity: Option<Identity>,
    #[serde(default)]
    gmail_access: bool,
    #[serde(default)]
    unread_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

/// Persists the session between runs.
///
/// Account details go to a JSON file, the Google token to the
/// [`SecretStore`].
pub struct SessionStore {
    path: PathBuf,
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Creates a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            path: path.into(),
            secrets,
        }
    }

    /// Path of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the session. A signed-out session with no error to report
    /// removes the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, session: &Session) -> Result<()> {
        if session.identity.is_none() && session.last_error.is_none() {
            return self.remove_file().await;
        }

        let record = SessionRecord {
            identity: session.identity.clone(),
            gmail_access: session.gmail_access,
            unread_count: session.unread_count,
            last_error: session.last_error.clone(),
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_string_pretty(&record)?).await?;
        debug!(path = %self.path.display(), "saved session");
        Ok(())
    }

    /// Stores the Google token.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret store fails.
    pub fn save_token(&self, token: &Token) -> Result<()> {
        credentials::store_oauth_token(self.secrets.as_ref(), token)?;
        Ok(())
    }

    /// Loads the Google token.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret store fails.
    pub fn token(&self) -> Result<Option<Token>> {
        Ok(credentials::get_oauth_token(self.secrets.as_ref())?)
    }

    /// Restores the last session, or a signed-out one.
    ///
    /// A Google session whose token is gone is treated as signed out.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn restore(&self) -> Result<Session> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Session::default());
        }

        let contents = tokio::fs::read_to_string(&self.path).await?;
        let record: SessionRecord = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                warn!("ignoring unreadable session file: {e}");
                return Ok(Session::default());
            }
        };

        let Some(identity) = record.identity else {
            return Ok(Session {
                last_error: record.last_error,
                ..Session::default()
            });
        };

        if identity.provider == IdentityProvider::Google && self.token()?.is_none() {
            info!(email = %identity.email, "Google token missing, session not restored");
            return Ok(Session {
                last_error: record.last_error,
                ..Session::default()
            });
        }

        debug!(email = %identity.email, "restored session");
        Ok(Session {
            identity: Some(identity),
            gmail_access: record.gmail_access,
            unread_count: record.unread_count,
            last_error: record.last_error,
        })
    }

    /// Deletes the session file and the Google token.
    ///
    /// # Errors
    ///
    /// Returns an error if either cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        self.remove_file().await?;
        self.secrets.delete(GOOGLE_TOKEN)?;
        Ok(())
    }

    async fn remove_file(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
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
    use crate::credentials::MemoryStore;

    fn ana() -> UserInfo {
        UserInfo {
            id: "1090".into(),
            email: "ana@gmail.com".into(),
            name: Some("Ana".into()),
        }
    }

    fn store(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("session.json"), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_sign_out_clears_everything() {
        let mut session = Session::default();
        session.sign_in_google(&ana(), true);
        session.record_unread(12);
        session.record_error("Connection failed");

        assert!(session.is_signed_in());
        assert_eq!(session.identity().unwrap().display_name.as_deref(), Some("Ana"));
        assert!(session.gmail_access());

        session.sign_out();
        assert_eq!(session, Session::default());
        assert!(!session.is_signed_in());
        assert!(!session.gmail_access());
        assert_eq!(session.unread_count(), None);
        assert_eq!(session.last_error(), None);
    }

    #[test]
    fn test_sign_in_replaces_previous_state() {
        let mut session = Session::default();
        session.sign_in_google(&ana(), true);
        session.record_error("boom");

        session.sign_in_mail("bob@posteo.de", 3);
        let identity = session.identity().unwrap();
        assert_eq!(identity.provider, IdentityProvider::Mail);
        assert_eq!(session.unread_count(), Some(3));
        assert!(!session.gmail_access());
        assert_eq!(session.last_error(), None);
    }

    #[tokio::test]
    async fn test_google_session_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let mut session = Session::default();
        session.sign_in_google(&ana(), true);
        store.save(&session).await.unwrap();
        store
            .save_token(&Token::new("ya29.a", "Bearer").with_refresh_token("1//r"))
            .unwrap();

        let restored = store.restore().await.unwrap();
        assert_eq!(restored.identity(), session.identity());
        assert!(restored.gmail_access());
        assert_eq!(restored.last_error(), None);
    }

    #[tokio::test]
    async fn test_last_error_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let mut session = Session::default();
        session.sign_in_mail("ana@example.com", 3);
        session.record_error("Authentication failed: check the username and password");
        store.save(&session).await.unwrap();

        let mut restored = store.restore().await.unwrap();
        assert_eq!(
            restored.last_error(),
            Some("Authentication failed: check the username and password")
        );
        assert_eq!(restored.unread_count(), Some(3));

        restored.record_unread(5);
        store.save(&restored).await.unwrap();
        assert_eq!(store.restore().await.unwrap().last_error(), None);
    }

    #[tokio::test]
    async fn test_signed_out_error_is_kept_until_sign_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let mut session = Session::default();
        session.record_error("Could not connect to the mail server");
        store.save(&session).await.unwrap();
        assert!(store.path().exists());

        let mut restored = store.restore().await.unwrap();
        assert!(!restored.is_signed_in());
        assert_eq!(restored.last_error(), Some("Could not connect to the mail server"));

        restored.sign_out();
        store.save(&restored).await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_google_session_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let mut session = Session::default();
        session.sign_in_google(&ana(), false);
        store.save(&session).await.unwrap();

        assert!(!store.restore().await.unwrap().is_signed_in());
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let mut session = Session::default();
        session.sign_in_mail("bob@posteo.de", 0);
        store.save(&session).await.unwrap();
        store.save_token(&Token::new("a", "Bearer")).unwrap();

        store.clear().await.unwrap();
        assert!(!store.restore().await.unwrap().is_signed_in());
        assert!(store.token().unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_saving_signed_out_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let mut session = Session::default();
        session.sign_in_mail("bob@posteo.de", 1);
        store.save(&session).await.unwrap();
        assert!(store.path().exists());

        session.sign_out();
        store.save(&session).await.unwrap();
        assert!(!store.path().exists());
    }
}
