//! # purse-mail
//!
//! Mailbox probing over IMAP4rev1 and POP3.
//!
//! ## Features
//!
//! - **Connection resolution**: turns a user-entered server type, host, port
//!   and encryption mode into a validated [`Config`] with default ports,
//!   timeouts, TLS trust mode and STARTTLS flags
//! - **TLS via rustls**: implicit TLS and STARTTLS upgrades without OpenSSL
//! - **Type-state clients**: IMAP (`NotAuthenticated` → `Authenticated` →
//!   `Selected`) and POP3 (`Authorization` → `Transaction`) enforce valid
//!   command order at compile time
//!
//! ## Quick Start
//!
//! ```ignore
//! use purse_mail::{config, imap, stream};
//!
//! #[tokio::main]
//! async fn main() -> purse_mail::Result<()> {
//!     let config = config::resolve("IMAP", "imap.example.com", None, "SSL/TLS")?;
//!     let stream = stream::connect(&config).await?;
//!     let client = imap::Client::from_stream(stream).await?;
//!
//!     let client = client.login("user@example.com", "password").await?;
//!     let (mut inbox, status) = client.examine("INBOX").await?;
//!     let unseen = inbox.search_unseen().await?;
//!     println!("{} of {} unread", unseen.len(), status.exists);
//!
//!     inbox.logout().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: connection properties and the resolver
//! - [`stream`]: TCP/TLS transport
//! - [`framed`]: CRLF framing shared by both protocols
//! - [`imap`]: IMAP client
//! - [`pop3`]: POP3 client

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod framed;
pub mod imap;
pub mod pop3;
pub mod stream;

pub use config::{Config, ConfigBuilder, Protocol, Security, TlsTrust, resolve};
pub use error::{Error, Result};
pub use framed::FramedStream;
pub use stream::MailStream;

/// Name of the mailbox every probe inspects.
pub const INBOX: &str = "INBOX";
