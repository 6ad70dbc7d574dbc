//! Connect to a mailbox, count unread messages, disconnect.

use purse_mail::imap::{self, Authenticated};
use purse_mail::pop3;
use purse_mail::{Config, FramedStream, INBOX, MailStream, Protocol, Security};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::preferences::EmailConnectionDetails;

/// How to log in.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username and password (IMAP LOGIN, POP3 USER/PASS).
    Password {
        /// Login name.
        username: String,
        /// Password.
        password: String,
    },
    /// `OAuth2` access token (IMAP only).
    XOAuth2 {
        /// Account email.
        username: String,
        /// Access token.
        access_token: String,
    },
}

impl Credentials {
    /// Login name.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Password { username, .. } | Self::XOAuth2 { username, .. } => username,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Password { .. } => "Password",
            Self::XOAuth2 { .. } => "XOAuth2",
        };
        f.debug_struct(kind)
            .field("username", &self.username())
            .finish_non_exhaustive()
    }
}

/// What a successful probe found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Protocol used.
    pub protocol: Protocol,
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Encryption mode.
    pub security: Security,
    /// Messages in the inbox (POP3: in the maildrop).
    pub total_messages: u32,
    /// Messages without `\Seen`. POP3 has no flags, so every message counts.
    pub unread_messages: u32,
}

/// Why a probe failed.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The settings could not be resolved; nothing was sent.
    #[error("Invalid connection settings: {0}")]
    Config(#[source] purse_mail::Error),

    /// Transport, TLS or protocol failure.
    #[error(transparent)]
    Mail(#[from] purse_mail::Error),

    /// The server has no such mailbox.
    #[error("Mailbox {0} not found")]
    MailboxNotFound(String),

    /// The mailbox cannot tell read from unread.
    #[error("Mailbox {0} does not support the \\Seen flag")]
    SeenFlagUnsupported(String),
}

/// Resolves saved settings and probes the mailbox.
///
/// # Errors
///
/// Returns [`ProbeError::Config`] before any network activity if the
/// settings do not resolve, otherwise whatever [`probe`] returns.
pub async fn probe_details(
    details: &EmailConnectionDetails,
    credentials: &Credentials,
) -> Result<ProbeReport, ProbeError> {
    let config = details.resolve().map_err(ProbeError::Config)?;
    probe(&config, credentials).await
}

/// Connects, authenticates, counts unread messages in `INBOX` and logs out.
///
/// Once a session exists it is closed on every path. Errors while closing
/// are logged and never replace the result.
///
/// # Errors
///
/// Returns the first failure along the way.
pub async fn probe(config: &Config, credentials: &Credentials) -> Result<ProbeReport, ProbeError> {
    info!(
        protocol = %config.protocol,
        host = %config.host,
        port = config.port,
        security = %config.security,
        user = credentials.username(),
        "probing mailbox"
    );

    let (total_messages, unread_messages) = match config.protocol {
        Protocol::Imap => probe_imap(config, credentials).await?,
        Protocol::Pop3 => probe_pop3(config, credentials).await?,
    };

    info!(total_messages, unread_messages, "probe finished");
    Ok(ProbeReport {
        protocol: config.protocol,
        host: config.host.clone(),
        port: config.port,
        security: config.security,
        total_messages,
        unread_messages,
    })
}

async fn open(config: &Config) -> Result<FramedStream<MailStream>, ProbeError> {
    let stream = purse_mail::stream::connect(config).await?;
    debug!(tls = stream.is_tls(), "connected");
    Ok(FramedStream::with_timeout(stream, config.io_timeout))
}

async fn probe_imap(config: &Config, credentials: &Credentials) -> Result<(u32, u32), ProbeError> {
    let mut client = imap::Client::from_framed(open(config).await?).await?;
    if config.starttls_enabled() {
        client = client.starttls(&config.host, config.tls_trust).await?;
    }

    let client = match credentials {
        Credentials::Password { username, password } => client.login(username, password).await?,
        Credentials::XOAuth2 {
            username,
            access_token,
        } => client.authenticate_xoauth2(username, access_token).await?,
    };

    count_inbox(client).await
}

async fn count_inbox<S>(mut client: imap::Client<S, Authenticated>) -> Result<(u32, u32), ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match client.mailbox_exists(INBOX).await {
        Ok(true) => {}
        Ok(false) => {
            logout(client).await;
            return Err(ProbeError::MailboxNotFound(INBOX.to_string()));
        }
        Err(e) => {
            logout(client).await;
            return Err(e.into());
        }
    }

    let (mut inbox, status) = client.examine(INBOX).await?;
    if !status.supports_flag("\\Seen") {
        logout(inbox).await;
        return Err(ProbeError::SeenFlagUnsupported(INBOX.to_string()));
    }

    let unseen = match inbox.search_unseen().await {
        Ok(unseen) => unseen,
        Err(e) => {
            logout(inbox).await;
            return Err(e.into());
        }
    };

    match inbox.close().await {
        Ok(client) => logout(client).await,
        Err(e) => warn!("failed to close {INBOX}: {e}"),
    }

    let unread = u32::try_from(unseen.len()).unwrap_or(u32::MAX);
    Ok((status.exists, unread))
}

async fn logout<S, State>(client: imap::Client<S, State>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = client.logout().await {
        warn!("IMAP logout failed: {e}");
    }
}

async fn probe_pop3(config: &Config, credentials: &Credentials) -> Result<(u32, u32), ProbeError> {
    let Credentials::Password { username, password } = credentials else {
        return Err(purse_mail::Error::NotSupported("XOAUTH2 over POP3".to_string()).into());
    };

    let mut client = pop3::Client::from_framed(open(config).await?).await?;
    if config.starttls_enabled() {
        client = client.stls(&config.host, config.tls_trust).await?;
    }

    let mut client = client.login(username, password).await?;
    let stat = client.stat().await;
    if let Err(e) = client.quit().await {
        warn!("POP3 QUIT failed: {e}");
    }

    let maildrop = stat?;
    Ok((maildrop.count, maildrop.count))
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

    fn password() -> Credentials {
        Credentials::Password {
            username: "ana".into(),
            password: "s3cret".into(),
        }
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let text = format!("{:?}", password());
        assert!(text.contains("ana"));
        assert!(!text.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_bad_encryption_fails_before_connecting() {
        let details = EmailConnectionDetails {
            email: "ana@example.org".into(),
            // Nothing listens here; reaching the network would fail differently.
            server_address: "192.0.2.1".into(),
            server_port: 993,
            server_type: "IMAP".into(),
            encryption_type: "SSL3".into(),
            password: None,
        };

        let err = probe_details(&details, &password()).await.unwrap_err();
        assert!(matches!(
            err,
            ProbeError::Config(purse_mail::Error::UnsupportedEncryption(_))
        ));
    }

    #[tokio::test]
    async fn test_xoauth2_over_pop3_rejected() {
        let config = Config::builder("127.0.0.1", Protocol::Pop3)
            .security(Security::None)
            .port(1)
            .build();
        let credentials = Credentials::XOAuth2 {
            username: "ana@gmail.com".into(),
            access_token: "ya29".into(),
        };
        assert!(matches!(
            probe(&config, &credentials).await,
            Err(ProbeError::Mail(purse_mail::Error::NotSupported(_)))
        ));
    }
}
