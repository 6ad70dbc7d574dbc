//! Error types for the core library.

use thiserror::Error;

use crate::transaction::{TransactionId, ValidationError};

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Mail operation failed.
    #[error("Mail error: {0}")]
    Mail(#[from] purse_mail::Error),

    /// Google sign-in or token operation failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] purse_oauth::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Input failed validation.
    #[error("Invalid transaction: {}", join(.0))]
    Validation(Vec<ValidationError>),

    /// A stored row could not be read back.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::credentials::CredentialError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
