//! Saved mail connection settings.
//!
//! The settings go to a JSON file; the password, when the user asks to
//! remember it, goes to the [`SecretStore`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;
use crate::credentials::{MAIL_PASSWORD, SecretStore};

/// Settings for the mailbox to probe, as the user entered them.
#[derive(Clone, PartialEq, Eq)]
pub struct EmailConnectionDetails {
    /// Login name, usually the email address.
    pub email: String,
    /// Server host name.
    pub server_address: String,
    /// Server port. 0 means the protocol default.
    pub server_port: u16,
    /// `IMAP` or `POP3`.
    pub server_type: String,
    /// `SSL/TLS`, `STARTTLS` or `None`.
    pub encryption_type: String,
    /// Password, present only when it was remembered or just entered.
    pub password: Option<String>,
}

impl std::fmt::Debug for EmailConnectionDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConnectionDetails")
            .field("email", &self.email)
            .field("server_address", &self.server_address)
            .field("server_port", &self.server_port)
            .field("server_type", &self.server_type)
            .field("encryption_type", &self.encryption_type)
            .field("has_password", &self.password.is_some())
            .finish()
    }
}

impl EmailConnectionDetails {
    /// Resolves these settings into a connection config.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown server type or
    /// encryption mode, or an empty server address.
    pub fn resolve(&self) -> purse_mail::Result<purse_mail::Config> {
        purse_mail::resolve(
            &self.server_type,
            &self.server_address,
            Some(self.server_port),
            &self.encryption_type,
        )
    }
}

/// On-disk form. Every field is optional so that a partial file reads as
/// "nothing saved" instead of an error.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    email: Option<String>,
    server_address: Option<String>,
    server_port: Option<u16>,
    server_type: Option<String>,
    encryption_type: Option<String>,
    #[serde(default)]
    remember_password: bool,
}

/// Reads and writes [`EmailConnectionDetails`].
pub struct PreferencesStore {
    path: PathBuf,
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for PreferencesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferencesStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PreferencesStore {
    /// Creates a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            path: path.into(),
            secrets,
        }
    }

    /// Path of the preferences file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves the settings. The password is kept only if `remember_password`
    /// is set; otherwise any previously remembered password is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or the secret store cannot be written.
    pub async fn save(&self, details: &EmailConnectionDetails, remember_password: bool) -> Result<()> {
        let file = PreferencesFile {
            email: Some(details.email.clone()),
            server_address: Some(details.server_address.clone()),
            server_port: Some(details.server_port),
            server_type: Some(details.server_type.clone()),
            encryption_type: Some(details.encryption_type.clone()),
            remember_password,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(&self.path, contents).await?;

        match (&details.password, remember_password) {
            (Some(password), true) => self.secrets.set(MAIL_PASSWORD, password)?,
            _ => self.secrets.delete(MAIL_PASSWORD)?,
        }

        info!(email = %details.email, path = %self.path.display(), "saved connection settings");
        Ok(())
    }

    /// Loads the saved settings.
    ///
    /// Returns `None` if nothing was saved or any required field is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or the secret store cannot be read.
    pub async fn load(&self) -> Result<Option<EmailConnectionDetails>> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!("no saved connection settings");
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&self.path).await?;
        let file: PreferencesFile = serde_json::from_str(&contents)?;

        let (
            Some(email),
            Some(server_address),
            Some(server_port),
            Some(server_type),
            Some(encryption_type),
        ) = (
            file.email,
            file.server_address,
            file.server_port,
            file.server_type,
            file.encryption_type,
        )
        else {
            debug!("saved connection settings are incomplete");
            return Ok(None);
        };

        let password = if file.remember_password {
            self.secrets.get(MAIL_PASSWORD)?
        } else {
            None
        };

        Ok(Some(EmailConnectionDetails {
            email,
            server_address,
            server_port,
            server_type,
            encryption_type,
            password,
        }))
    }

    /// Removes the saved settings and the remembered password.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or the secret store cannot be written.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.secrets.delete(MAIL_PASSWORD)?;
        info!("cleared connection settings");
        Ok(())
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

    fn details() -> EmailConnectionDetails {
        EmailConnectionDetails {
            email: "ana@posteo.de".into(),
            server_address: "posteo.de".into(),
            server_port: 993,
            server_type: "IMAP".into(),
            encryption_type: "SSL/TLS".into(),
            password: Some("s3cret".into()),
        }
    }

    fn store(dir: &tempfile::TempDir) -> (PreferencesStore, Arc<MemoryStore>) {
        let secrets = Arc::new(MemoryStore::new());
        let store = PreferencesStore::new(dir.path().join("preferences.json"), secrets.clone());
        (store, secrets)
    }

    #[tokio::test]
    async fn test_remembered_password() {
        let dir = tempfile::tempdir().unwrap();
        let (store, secrets) = store(&dir);

        store.save(&details(), true).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, details());

        // The password never lands in the file.
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("s3cret"));
        assert_eq!(secrets.get(MAIL_PASSWORD).unwrap().as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_forgotten_password() {
        let dir = tempfile::tempdir().unwrap();
        let (store, secrets) = store(&dir);

        store.save(&details(), true).await.unwrap();
        store.save(&details(), false).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.password, None);
        assert_eq!(secrets.get(MAIL_PASSWORD).unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_nothing_saved() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);
        std::fs::write(
            store.path(),
            r#"{"email": "ana@posteo.de", "server_address": "posteo.de", "server_port": 993}"#,
        )
        .unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let (store, secrets) = store(&dir);

        store.save(&details(), true).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert_eq!(secrets.get(MAIL_PASSWORD).unwrap(), None);

        // Clearing twice is fine.
        store.clear().await.unwrap();
    }

    #[test]
    fn test_resolve() {
        let config = details().resolve().unwrap();
        assert_eq!(config.port, 993);
        assert!(config.implicit_tls());

        let mut bad = details();
        bad.encryption_type = "ROT13".into();
        assert!(matches!(
            bad.resolve(),
            Err(purse_mail::Error::UnsupportedEncryption(_))
        ));
    }

    #[test]
    fn test_debug_hides_password() {
        let text = format!("{:?}", details());
        assert!(!text.contains("s3cret"));
    }
}
