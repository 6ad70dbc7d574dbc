//! Implementation for the not-authenticated state.

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::{Authenticated, Client, NotAuthenticated};
use crate::config::TlsTrust;
use crate::framed::{FramedStream, single_line};
use crate::imap::command::{Command, TagGenerator};
use crate::imap::response::{Response, ResponseCode, Status, Untagged};
use crate::stream::MailStream;
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream without I/O timeouts.
    ///
    /// Reads the server greeting and any capabilities it carries.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::from_framed(FramedStream::new(stream)).await
    }

    /// Creates a new client from an already framed stream.
    pub async fn from_framed(mut framed: FramedStream<S>) -> Result<Self> {
        let greeting = framed.read_response().await?;

        let capabilities = match Response::parse(&greeting)? {
            Response::Untagged(Untagged::Status {
                status: Status::Ok | Status::PreAuth,
                code,
                ..
            }) => match code {
                Some(ResponseCode::Capability(caps)) => caps,
                _ => Vec::new(),
            },
            Response::Untagged(Untagged::Status {
                status: Status::Bye,
                text,
                ..
            }) => return Err(Error::Bye(text)),
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected IMAP greeting: {other:?}"
                )));
            }
        };

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            _state: PhantomData,
        })
    }

    /// Authenticates with the server using LOGIN.
    ///
    /// A rejected login is reported as [`Error::Auth`]. Credentials with
    /// line breaks fail with [`Error::InvalidConfig`] before anything is
    /// sent; 8-bit ones go out as literals.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        single_line("username", username)?;
        single_line("password", password)?;
        if self.login_disabled() {
            return Err(Error::Auth(
                "server disabled LOGIN on this connection".to_string(),
            ));
        }

        let exchange = self
            .run(
                Command::Login {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                None,
            )
            .await?;

        match exchange.status {
            Status::Ok => Ok(self.transition()),
            Status::No => Err(Error::Auth(exchange.text)),
            _ => exchange.ok().map(|_| self.transition()),
        }
    }

    /// Authenticates with an `OAuth2` access token using XOAUTH2.
    ///
    /// Sends the token as a SASL initial response when the server supports
    /// SASL-IR, otherwise after the first continuation.
    pub async fn authenticate_xoauth2(
        mut self,
        email: &str,
        access_token: &str,
    ) -> Result<Client<S, Authenticated>> {
        let auth_string = purse_oauth::sasl::xoauth2_response(email, access_token);

        let (initial_response, pending) = if self.has_capability("SASL-IR") {
            (Some(auth_string), None)
        } else {
            (None, Some(auth_string.into_bytes()))
        };

        let exchange = self
            .run(
                Command::Authenticate {
                    mechanism: "XOAUTH2".to_string(),
                    initial_response,
                },
                pending,
            )
            .await?;

        match exchange.status {
            Status::Ok => Ok(self.transition()),
            Status::No => Err(Error::Auth(exchange.text)),
            _ => exchange.ok().map(|_| self.transition()),
        }
    }
}

impl Client<MailStream, NotAuthenticated> {
    /// Upgrades the connection with STARTTLS.
    ///
    /// Fails with [`Error::NotSupported`] when the server does not advertise
    /// STARTTLS. Capabilities are discarded and fetched again over TLS.
    pub async fn starttls(mut self, host: &str, trust: TlsTrust) -> Result<Self> {
        if self.capabilities.is_empty() {
            self.capability().await?;
        }
        if !self.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".to_string()));
        }

        self.run(Command::StartTls, None).await?.ok()?;
        debug!(host, "upgrading IMAP connection to TLS");

        let limit = self.stream.io_timeout();
        let upgrade = self.stream.into_inner().upgrade_to_tls(host, trust);
        let framed = match limit {
            Some(limit) => {
                let stream = tokio::time::timeout(limit, upgrade)
                    .await
                    .map_err(|_| Error::Timeout(limit))??;
                FramedStream::with_timeout(stream, limit)
            }
            None => FramedStream::new(upgrade.await?),
        };

        let mut client = Self {
            stream: framed,
            tag_gen: self.tag_gen,
            capabilities: Vec::new(),
            _state: PhantomData,
        };
        client.capability().await?;
        Ok(client)
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
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_greeting_capabilities() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        assert!(client.has_capability("sasl-ir"));
        assert!(!client.supports_starttls());
    }

    #[tokio::test]
    async fn test_greeting_bye() {
        let mock = Builder::new()
            .read(b"* BYE too many connections\r\n")
            .build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Bye(ref t) if t == "too many connections"));
    }

    #[tokio::test]
    async fn test_login_rejected_is_auth_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user secret\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let err = client.login("user", "secret").await.unwrap_err();
        assert!(matches!(err, Error::Auth(ref t) if t == "Invalid credentials"));
    }

    #[tokio::test]
    async fn test_login_8bit_password_waits_for_continuation() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN ana {11}\r\n")
            .read(b"+ go ahead\r\n")
            .write("contraseña\r\n".as_bytes())
            .read(b"A0001 OK LOGIN completed\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        client.login("ana", "contraseña").await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejects_line_breaks_before_sending() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let client = Client::from_stream(mock).await.unwrap();
        let err = client
            .login("user", "secret\r\nA0002 LOGOUT")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_login_disabled_fails_before_sending() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        assert!(matches!(
            client.login("user", "secret").await,
            Err(Error::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_xoauth2_failure_answers_continuation() {
        let auth = purse_oauth::sasl::xoauth2_response("user@gmail.com", "token");
        let command = format!("A0001 AUTHENTICATE XOAUTH2 {auth}\r\n");
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n")
            .write(command.as_bytes())
            .read(b"+ eyJzdGF0dXMiOiI0MDEifQ==\r\n")
            .write(b"\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials (Failure)\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let err = client
            .authenticate_xoauth2("user@gmail.com", "token")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
