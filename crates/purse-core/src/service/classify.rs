//! Maps probe failures to categories a user can act on.

use purse_mail::Error as MailError;

use super::probe::ProbeError;

/// Broad cause of a failed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Credentials were rejected.
    Authentication,
    /// The server could not be reached or hung up.
    Connection,
    /// TLS handshake or certificate problem.
    Tls,
    /// The encryption mode is not one we know.
    UnsupportedEncryption,
    /// The server type is unknown, or the server lacks a needed extension.
    UnsupportedProtocol,
    /// The connection settings are incomplete or malformed.
    Configuration,
    /// The inbox is missing or cannot report unread mail.
    Mailbox,
    /// Anything else.
    Unexpected,
}

impl FailureKind {
    /// Headline shown to the user.
    #[must_use]
    pub const fn headline(self) -> &'static str {
        match self {
            Self::Authentication => "Authentication failed: check the username and password",
            Self::Connection => "Could not connect to the mail server",
            Self::Tls => "Secure connection failed",
            Self::UnsupportedEncryption => "Unsupported encryption mode",
            Self::UnsupportedProtocol => "Unsupported server type",
            Self::Configuration => "Invalid mail settings",
            Self::Mailbox => "The inbox cannot be read",
            Self::Unexpected => "Unexpected error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.headline())
    }
}

/// A classified failure with its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Category.
    pub kind: FailureKind,
    /// Headline plus the underlying detail.
    pub message: String,
}

impl From<&ProbeError> for Failure {
    fn from(error: &ProbeError) -> Self {
        let kind = classify(error);
        let detail = match error {
            ProbeError::Config(e) | ProbeError::Mail(e) => detail(e),
            other => other.to_string(),
        };
        Self {
            kind,
            message: format!("{}: {detail}", kind.headline()),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Picks the category for a probe failure.
#[must_use]
pub fn classify(error: &ProbeError) -> FailureKind {
    match error {
        ProbeError::Config(e) | ProbeError::Mail(e) => classify_mail(e),
        ProbeError::MailboxNotFound(_) | ProbeError::SeenFlagUnsupported(_) => FailureKind::Mailbox,
    }
}

fn classify_mail(error: &MailError) -> FailureKind {
    if error.is_tls() {
        return FailureKind::Tls;
    }
    match error {
        MailError::Auth(_) => FailureKind::Authentication,
        MailError::Io(_) | MailError::Timeout(_) | MailError::Bye(_) => FailureKind::Connection,
        MailError::UnsupportedEncryption(_) => FailureKind::UnsupportedEncryption,
        MailError::UnsupportedProtocol(_) | MailError::NotSupported(_) => {
            FailureKind::UnsupportedProtocol
        }
        MailError::Mailbox(_) => FailureKind::Mailbox,
        MailError::InvalidConfig(_) => FailureKind::Configuration,
        _ => FailureKind::Unexpected,
    }
}

/// Server text without our own prefixes, which the headline already covers.
fn detail(error: &MailError) -> String {
    match error {
        MailError::Auth(text)
        | MailError::Bye(text)
        | MailError::Mailbox(text)
        | MailError::No(text)
        | MailError::Bad(text)
        | MailError::InvalidConfig(text) => text.clone(),
        other => other.to_string(),
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
    use std::io;
    use std::time::Duration;

    fn mail(e: MailError) -> ProbeError {
        ProbeError::Mail(e)
    }

    #[test]
    fn test_classification_table() {
        let cases = [
            (mail(MailError::Auth("Invalid credentials".into())), FailureKind::Authentication),
            (
                mail(MailError::Io(io::Error::from(io::ErrorKind::ConnectionRefused))),
                FailureKind::Connection,
            ),
            (mail(MailError::Timeout(Duration::from_secs(10))), FailureKind::Connection),
            (mail(MailError::Bye("shutting down".into())), FailureKind::Connection),
            (
                mail(MailError::TlsHandshake(io::Error::other("bad certificate"))),
                FailureKind::Tls,
            ),
            (
                ProbeError::Config(MailError::UnsupportedEncryption("SSL3".into())),
                FailureKind::UnsupportedEncryption,
            ),
            (
                ProbeError::Config(MailError::UnsupportedProtocol("SMTP".into())),
                FailureKind::UnsupportedProtocol,
            ),
            (mail(MailError::NotSupported("STARTTLS".into())), FailureKind::UnsupportedProtocol),
            (
                ProbeError::Config(MailError::InvalidConfig("server address is empty".into())),
                FailureKind::Configuration,
            ),
            (ProbeError::MailboxNotFound("INBOX".into()), FailureKind::Mailbox),
            (ProbeError::SeenFlagUnsupported("INBOX".into()), FailureKind::Mailbox),
            (mail(MailError::Protocol("garbage".into())), FailureKind::Unexpected),
        ];

        for (error, kind) in cases {
            assert_eq!(classify(&error), kind, "{error}");
        }
    }

    #[test]
    fn test_wrong_password_message_is_specific() {
        let error = mail(MailError::Auth("[AUTHENTICATIONFAILED] Invalid credentials".into()));
        let failure = Failure::from(&error);
        assert_eq!(failure.kind, FailureKind::Authentication);
        assert_eq!(
            failure.message,
            "Authentication failed: check the username and password: [AUTHENTICATIONFAILED] Invalid credentials"
        );
    }

    #[test]
    fn test_empty_server_is_a_settings_problem() {
        let error = ProbeError::Config(MailError::InvalidConfig("server address is empty".into()));
        let failure = Failure::from(&error);
        assert_eq!(failure.kind, FailureKind::Configuration);
        assert_eq!(failure.message, "Invalid mail settings: server address is empty");
    }

    #[test]
    fn test_connection_message() {
        let error = mail(MailError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)));
        let failure = Failure::from(&error);
        assert!(failure.message.starts_with("Could not connect to the mail server: I/O error"));
    }
}
