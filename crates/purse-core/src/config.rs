//! Application configuration.
//!
//! Read from `config.json` in the config directory, then overridden by
//! environment variables. A missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

/// Directory name under the platform config and data directories.
pub const APP_DIR: &str = "purse";

/// Google `OAuth2` client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// `OAuth2` client id of the installed application.
    pub client_id: Option<String>,
    /// Client secret. Google issues one even for desktop clients.
    pub client_secret: Option<String>,
    /// Loopback redirect URI. Port 0 picks a free port at sign-in.
    pub redirect_uri: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: "http://127.0.0.1:0".to_string(),
        }
    }
}

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the database lives. Defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
    /// Where preferences and session files live. Not read from the file.
    #[serde(skip)]
    pub config_dir: PathBuf,
    /// Google sign-in.
    pub google: GoogleConfig,
    /// Seconds allowed for TCP connect plus implicit TLS handshake.
    pub connect_timeout_secs: u64,
    /// Seconds allowed for each read or write on the mail connection.
    pub io_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            config_dir: default_config_dir(),
            google: GoogleConfig::default(),
            connect_timeout_secs: 10,
            io_timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Loads `config.json` from `config_dir` (or the platform default) and
    /// applies the `PURSE_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(config_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = config_dir
            .or_else(|| std::env::var_os("PURSE_CONFIG_DIR").map(PathBuf::from))
            .unwrap_or_else(default_config_dir);

        let mut config = Self::read(&config_dir).await?;
        config.config_dir = config_dir;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    async fn read(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join("config.json");
        if !tokio::fs::try_exists(&path).await? {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Applies environment overrides, looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("PURSE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(id) = var("PURSE_GOOGLE_CLIENT_ID") {
            self.google.client_id = Some(id);
        }
        if let Some(secret) = var("PURSE_GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = Some(secret);
        }
        if let Some(uri) = var("PURSE_GOOGLE_REDIRECT_URI") {
            self.google.redirect_uri = uri;
        }
    }

    /// Directory holding the database.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }

    /// Path of the transactions database.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("purse.db")
    }

    /// Path of the mail connection preferences.
    #[must_use]
    pub fn preferences_path(&self) -> PathBuf {
        self.config_dir.join("preferences.json")
    }

    /// Path of the persisted session.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.config_dir.join("session.json")
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// I/O timeout as a [`Duration`].
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
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

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::read(dir.path()).await.unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.google.redirect_uri, "http://127.0.0.1:0");
    }

    #[tokio::test]
    async fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("config.json"),
            r#"{"io_timeout_secs": 30, "google": {"client_id": "abc.apps.googleusercontent.com"}}"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load(Some(dir.path().to_path_buf())).await.unwrap();
        assert_eq!(config.io_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.config_dir, dir.path());
        assert_eq!(
            config.preferences_path(),
            dir.path().join("preferences.json")
        );
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("config.json"), "{ nope")
            .await
            .unwrap();
        assert!(AppConfig::read(dir.path()).await.is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(|name| match name {
            "PURSE_DATA_DIR" => Some("/tmp/purse-data".to_string()),
            "PURSE_GOOGLE_CLIENT_ID" => Some("id-from-env".to_string()),
            _ => None,
        });

        assert_eq!(config.database_path(), PathBuf::from("/tmp/purse-data/purse.db"));
        assert_eq!(config.google.client_id.as_deref(), Some("id-from-env"));
        assert_eq!(config.google.client_secret, None);
    }
}
