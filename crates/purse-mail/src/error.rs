//! Error types for the mail library.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while resolving, connecting to or talking with a
/// mail server.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS configuration or protocol error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// TLS handshake failed (certificate rejected, protocol mismatch, ...).
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(#[source] std::io::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server type is neither IMAP nor POP3.
    #[error("Unsupported server type: {0}")]
    UnsupportedProtocol(String),

    /// Encryption mode is not one of SSL/TLS, STARTTLS or None.
    #[error("Unsupported encryption mode: {0}")]
    UnsupportedEncryption(String),

    /// Connection settings are incomplete or malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO (IMAP) or -ERR (POP3).
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Server does not offer a required capability.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Mailbox is missing or cannot report what was asked.
    #[error("Mailbox error: {0}")]
    Mailbox(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true for failures in the TLS layer, including rustls alerts
    /// surfacing as I/O errors on an established TLS stream.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        match self {
            Self::Tls(_) | Self::TlsHandshake(_) | Self::InvalidDnsName(_) => true,
            Self::Io(e) => e
                .get_ref()
                .is_some_and(|inner| inner.is::<rustls::Error>()),
            _ => false,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    use std::io;

    #[test]
    fn test_is_tls() {
        let alert = io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(rustls::CertificateError::UnknownIssuer),
        );
        assert!(Error::Io(alert).is_tls());
        assert!(Error::TlsHandshake(io::Error::other("reset")).is_tls());
        assert!(!Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused)).is_tls());
        assert!(!Error::Auth("nope".into()).is_tls());
    }
}
