//! # purse-core
//!
//! Core logic for the purse budget tracker.
//!
//! This crate provides:
//! - Income and expense transactions stored in `SQLite`
//! - Mail connection preferences, with the password in the system keyring
//! - Session state for Google and mailbox sign-ins
//! - Presets for well-known mail providers
//! - The inbox probe: connect, authenticate, count unread mail, disconnect
//! - Classification of probe failures into user-facing categories

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod credentials;
mod error;
pub mod preferences;
pub mod providers;
pub mod service;
pub mod session;
pub mod transaction;

pub use config::{AppConfig, GoogleConfig};
pub use credentials::{CredentialError, CredentialResult, KeyringStore, MemoryStore, SecretStore};
pub use error::{Error, Result};
pub use preferences::{EmailConnectionDetails, PreferencesStore};
pub use providers::{ProviderPreset, ServerPreset};
pub use service::{
    Credentials, Failure, FailureKind, GoogleAccount, GoogleSignIn, ProbeError, ProbeReport,
    classify, has_imap_access, probe, probe_details,
};
pub use session::{Identity, IdentityProvider, Session, SessionStore};
pub use transaction::{
    NewTransaction, Summary, Transaction, TransactionId, TransactionRepository,
    TransactionSource, TransactionType, ValidationError, ValidationResult, parse_amount,
};
