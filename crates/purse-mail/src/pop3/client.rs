//! Type-state POP3 client.

#![allow(clippy::missing_errors_doc)]

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::command::Command;
use super::response::{Maildrop, Reply};
use crate::config::TlsTrust;
use crate::framed::{FramedStream, single_line};
use crate::stream::MailStream;
use crate::{Error, Result};

/// Type-state marker for the AUTHORIZATION state.
#[derive(Debug)]
pub struct Authorization;

/// Type-state marker for the TRANSACTION state.
#[derive(Debug)]
pub struct Transaction;

/// POP3 client with type-state pattern.
pub struct Client<S, State> {
    stream: FramedStream<S>,
    capabilities: Vec<String>,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns capabilities learned from CAPA, if it was sent.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Checks for a capability keyword (case-insensitive).
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|keyword| keyword.eq_ignore_ascii_case(name))
        })
    }

    /// Ends the session with QUIT.
    pub async fn quit(mut self) -> Result<()> {
        self.send(&Command::Quit).await?.into_ok().map(|_| ())
    }

    async fn send(&mut self, command: &Command) -> Result<Reply> {
        debug!(command = command.name(), "pop3 send");
        self.stream.write_command(&command.serialize()).await?;
        let line = self.stream.read_line().await?;
        Reply::parse(&line)
    }

    /// Reads a dot-terminated body, undoing byte-stuffing.
    async fn read_multiline(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let raw = self.stream.read_line().await?;
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if line == "." {
                return Ok(lines);
            }
            lines.push(line.strip_prefix('.').unwrap_or(line).to_string());
        }
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            capabilities: self.capabilities,
            _state: PhantomData,
        }
    }
}

impl<S> Client<S, Authorization>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream without I/O timeouts.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::from_framed(FramedStream::new(stream)).await
    }

    /// Creates a client from a framed stream and reads the greeting.
    pub async fn from_framed(mut stream: FramedStream<S>) -> Result<Self> {
        let greeting = stream.read_line().await?;
        match Reply::parse(&greeting)? {
            Reply::Ok(_) => Ok(Self {
                stream,
                capabilities: Vec::new(),
                _state: PhantomData,
            }),
            Reply::Err(text) => Err(Error::Bye(text)),
        }
    }

    /// Sends CAPA and stores the result.
    ///
    /// Servers without CAPA answer `-ERR`; that leaves the list empty.
    pub async fn capa(&mut self) -> Result<&[String]> {
        match self.send(&Command::Capa).await? {
            Reply::Ok(_) => self.capabilities = self.read_multiline().await?,
            Reply::Err(text) => {
                debug!(%text, "server has no CAPA");
                self.capabilities.clear();
            }
        }
        Ok(&self.capabilities)
    }

    /// Logs in with USER/PASS.
    ///
    /// `-ERR` to either command is reported as [`Error::Auth`]. Credentials
    /// with line breaks fail with [`Error::InvalidConfig`] before USER is sent.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Transaction>> {
        single_line("username", username)?;
        single_line("password", password)?;
        if let Reply::Err(text) = self.send(&Command::User(username.to_string())).await? {
            return Err(Error::Auth(text));
        }
        if let Reply::Err(text) = self.send(&Command::Pass(password.to_string())).await? {
            return Err(Error::Auth(text));
        }
        Ok(self.transition())
    }
}

impl Client<MailStream, Authorization> {
    /// Upgrades the connection with STLS.
    ///
    /// Fails with [`Error::NotSupported`] when CAPA does not list STLS.
    pub async fn stls(mut self, host: &str, trust: TlsTrust) -> Result<Self> {
        if self.capabilities.is_empty() {
            self.capa().await?;
        }
        if !self.has_capability("STLS") {
            return Err(Error::NotSupported("STLS".to_string()));
        }

        self.send(&Command::Stls).await?.into_ok()?;
        debug!(host, "upgrading POP3 connection to TLS");

        let limit = self.stream.io_timeout();
        let upgrade = self.stream.into_inner().upgrade_to_tls(host, trust);
        let stream = match limit {
            Some(limit) => {
                let stream = tokio::time::timeout(limit, upgrade)
                    .await
                    .map_err(|_| Error::Timeout(limit))??;
                FramedStream::with_timeout(stream, limit)
            }
            None => FramedStream::new(upgrade.await?),
        };

        let mut client = Self {
            stream,
            capabilities: Vec::new(),
            _state: PhantomData,
        };
        client.capa().await?;
        Ok(client)
    }
}

impl<S> Client<S, Transaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the message count and total size of the maildrop.
    pub async fn stat(&mut self) -> Result<Maildrop> {
        let text = self.send(&Command::Stat).await?.into_ok()?;
        Maildrop::parse(&text)
    }

    /// Sends NOOP.
    pub async fn noop(&mut self) -> Result<()> {
        self.send(&Command::Noop).await?.into_ok().map(|_| ())
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
    async fn test_capa_unstuffs_lines() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"CAPA\r\n")
            .read(b"+OK Capability list follows\r\n")
            .read(b"TOP\r\nUSER\r\nSTLS\r\nSASL PLAIN\r\n..odd\r\n.\r\n")
            .build();
        let mut client = Client::from_stream(mock).await.unwrap();
        let caps = client.capa().await.unwrap().to_vec();

        assert_eq!(caps, vec!["TOP", "USER", "STLS", "SASL PLAIN", ".odd"]);
        assert!(client.has_capability("stls"));
        assert!(client.has_capability("SASL"));
    }

    #[tokio::test]
    async fn test_capa_unsupported() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"CAPA\r\n")
            .read(b"-ERR unknown command\r\n")
            .build();
        let mut client = Client::from_stream(mock).await.unwrap();
        assert!(client.capa().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_stat_quit() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK maildrop locked and ready\r\n")
            .write(b"STAT\r\n")
            .read(b"+OK 4 8120\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let mut client = client.login("alice", "secret").await.unwrap();
        let maildrop = client.stat().await.unwrap();
        assert_eq!(maildrop.count, 4);
        assert_eq!(maildrop.size, 8120);
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_password_is_auth_error() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS wrong\r\n")
            .read(b"-ERR [AUTH] Authentication failed\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let err = client.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Auth(ref t) if t.contains("Authentication failed")));
    }

    #[tokio::test]
    async fn test_login_rejects_injected_command() {
        let mock = Builder::new().read(b"+OK ready\r\n").build();
        let client = Client::from_stream(mock).await.unwrap();
        let err = client
            .login("alice", "secret\r\nDELE 1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref t) if t.contains("password")));
    }

    #[tokio::test]
    async fn test_negative_greeting() {
        let mock = Builder::new().read(b"-ERR server busy\r\n").build();
        assert!(matches!(
            Client::from_stream(mock).await,
            Err(Error::Bye(_))
        ));
    }
}
