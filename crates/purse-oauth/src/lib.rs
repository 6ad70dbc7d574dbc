//! # purse-oauth
//!
//! Google `OAuth2` sign-in for purse.
//!
//! ## Features
//!
//! - **Authorization Code Flow with PKCE** for a desktop/CLI client, with a
//!   loopback listener that captures the redirect
//! - **Token management**: refresh, expiration checking, revocation
//! - **Identity**: `OpenID` Connect userinfo (`sub`, `email`, `name`)
//! - **Scope checks**: the scopes a sign-in must be granted
//! - **SASL**: XOAUTH2 initial response for IMAP
//!
//! ## Quick Start
//!
//! ```ignore
//! use purse_oauth::{AuthorizationCodeFlow, LoopbackReceiver, OAuthClient, Provider};
//!
//! #[tokio::main]
//! async fn main() -> purse_oauth::Result<()> {
//!     let receiver = LoopbackReceiver::bind("http://127.0.0.1:8765").await?;
//!     let client = OAuthClient::new("client_id", Provider::google()?)
//!         .with_client_secret("secret")
//!         .with_redirect_uri(receiver.redirect_uri());
//!
//!     let flow = AuthorizationCodeFlow::new(client);
//!     let state = purse_oauth::flow::random_state();
//!     let url = flow.authorization_url(&state)?;
//!     println!("Visit: {url}");
//!
//!     let code = receiver.wait_for_code(&state).await?;
//!     let token = flow.exchange_code(&code).await?;
//!     let me = flow.client().fetch_user_info(&token).await?;
//!     println!("Signed in as {}", me.email);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod error;
pub mod flow;
pub mod provider;
pub mod sasl;
pub mod scope;
pub mod token;
pub mod userinfo;

pub use error::{Error, Result};
pub use flow::{AuthorizationCodeFlow, LoopbackReceiver, OAuthClient, PkceChallenge};
pub use provider::Provider;
pub use token::Token;
pub use userinfo::UserInfo;
