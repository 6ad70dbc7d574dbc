//! Subcommand implementations and the state they share.

pub mod auth;
pub mod mail;
pub mod tx;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::{DateTime, NaiveDate, Utc};
use purse_core::{
    AppConfig, KeyringStore, PreferencesStore, SecretStore, SessionStore, TransactionRepository,
    credentials::SERVICE_NAME,
};
use tracing::debug;

/// Loaded configuration plus the secret store every command uses.
pub struct Context {
    pub config: AppConfig,
    secrets: Arc<dyn SecretStore>,
}

impl Context {
    pub async fn load(config_dir: Option<PathBuf>) -> Result<Self> {
        let config = AppConfig::load(config_dir)
            .await
            .context("failed to load configuration")?;
        debug!(
            config_dir = %config.config_dir.display(),
            data_dir = %config.data_dir().display(),
            "configuration loaded"
        );
        Ok(Self {
            config,
            secrets: Arc::new(KeyringStore::new(SERVICE_NAME)),
        })
    }

    /// Opens the transaction database, creating its directory if needed.
    pub async fn repository(&self) -> Result<TransactionRepository> {
        let dir = self.config.data_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let path = self.config.database_path();
        let url = path.to_str().context("database path is not valid UTF-8")?;
        TransactionRepository::new(url)
            .await
            .with_context(|| format!("failed to open {}", path.display()))
    }

    pub fn preferences(&self) -> PreferencesStore {
        PreferencesStore::new(self.config.preferences_path(), Arc::clone(&self.secrets))
    }

    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.config.session_path(), Arc::clone(&self.secrets))
    }
}

/// Parses `YYYY-MM-DD` as midnight UTC.
pub fn parse_date(text: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
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
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_date() {
        let date = parse_date(" 2024-03-09 ").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 9));
        assert_eq!(date.hour(), 0);
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        assert!(parse_date("09/03/2024").is_err());
        assert!(parse_date("2024-13-01").is_err());
    }
}
