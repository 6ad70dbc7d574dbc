//! Errors raised while signing in with Google.

use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a sign-in, a refresh or a revocation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Sign-in outcomes the user can act on.
    /// The user declined on the consent screen.
    #[error("User denied authorization")]
    AccessDenied,

    /// Nobody came back from the browser in time.
    #[error("Authorization timed out after {0} seconds")]
    Timeout(u64),

    /// The redirect carried a different `state` than the one sent.
    #[error("Authorization state mismatch")]
    StateMismatch,

    /// The sign-in did not return an ID token.
    #[error("Sign-in returned no ID token")]
    MissingIdToken,

    /// Required scopes were not granted.
    #[error("Required permissions not granted: {}", .0.join(", "))]
    MissingScopes(Vec<String>),

    // Answers from the authorization server.
    /// The server answered with an `error` code.
    #[error("Google rejected the request ({code}){}", describe(.description.as_deref()))]
    Rejected {
        /// Code such as `invalid_grant`.
        code: String,
        /// `error_description`, when the server sent one.
        description: Option<String>,
    },

    /// A token response was missing fields or malformed.
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    /// A refresh was needed but the token carries no refresh token.
    #[error("No refresh token available")]
    NoRefreshToken,

    // Local setup and transport.
    /// Redirect URI or endpoint settings are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An endpoint URL did not parse.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Loopback listener failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Request to an endpoint failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON we expected.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Builds [`Error::Rejected`]. An empty description counts as none.
    #[must_use]
    pub fn rejected(code: impl Into<String>, description: Option<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            description: description.filter(|d| !d.trim().is_empty()),
        }
    }

    /// True when only a fresh browser sign-in can recover: the grant was
    /// revoked or expired, or there is nothing to refresh with.
    #[must_use]
    pub fn needs_new_sign_in(&self) -> bool {
        match self {
            Self::NoRefreshToken => true,
            Self::Rejected { code, .. } => code == "invalid_grant",
            _ => false,
        }
    }
}

fn describe(description: Option<&str>) -> String {
    description.map(|d| format!(": {d}")).unwrap_or_default()
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
    fn test_rejected_display() {
        let err = Error::rejected("invalid_grant", Some("Token has been expired or revoked.".into()));
        assert_eq!(
            err.to_string(),
            "Google rejected the request (invalid_grant): Token has been expired or revoked."
        );
        let bare = Error::rejected("server_error", Some("  ".into()));
        assert_eq!(bare.to_string(), "Google rejected the request (server_error)");
    }

    #[test]
    fn test_needs_new_sign_in() {
        assert!(Error::NoRefreshToken.needs_new_sign_in());
        assert!(Error::rejected("invalid_grant", None).needs_new_sign_in());
        assert!(!Error::rejected("temporarily_unavailable", None).needs_new_sign_in());
        assert!(!Error::Timeout(300).needs_new_sign_in());
    }
}
