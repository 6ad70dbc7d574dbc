//! Google sign-in.
//!
//! Runs the authorization code flow with PKCE through a loopback redirect,
//! then insists on an ID token and on every required scope. A grant that
//! falls short is revoked so that the next attempt shows the consent screen
//! again. IMAP access through XOAUTH2 needs the full mail scope, which is
//! only asked for on request.

use std::time::Duration;

use purse_oauth::{
    AuthorizationCodeFlow, LoopbackReceiver, OAuthClient, Provider, Token, UserInfo, scope,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::GoogleConfig;
use crate::{Error, Result};

/// A completed Google sign-in.
#[derive(Debug, Clone)]
pub struct GoogleAccount {
    /// Who signed in.
    pub info: UserInfo,
    /// Tokens to keep for refresh and revocation.
    pub token: Token,
    /// Whether read-only Gmail access was granted.
    pub gmail_access: bool,
    /// Whether the full mail scope for IMAP was granted.
    pub imap_access: bool,
}

/// Google sign-in service.
#[derive(Debug, Clone)]
pub struct GoogleSignIn {
    client: OAuthClient,
    wait: Option<Duration>,
    imap_access: bool,
}

impl GoogleSignIn {
    /// Wraps a configured client. The client's redirect URI, if any, picks
    /// the loopback address to listen on.
    #[must_use]
    pub const fn new(client: OAuthClient) -> Self {
        Self {
            client,
            wait: None,
            imap_access: false,
        }
    }

    /// Builds the service for Google's endpoints from the app config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no client id is configured.
    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        let client_id = config.client_id.as_deref().ok_or_else(|| {
            Error::Config(
                "no Google client id; set google.client_id or PURSE_GOOGLE_CLIENT_ID".into(),
            )
        })?;

        let mut client = OAuthClient::new(client_id, Provider::google()?)
            .with_redirect_uri(config.redirect_uri.clone());
        if let Some(secret) = &config.client_secret {
            client = client.with_client_secret(secret.clone());
        }
        Ok(Self::new(client))
    }

    /// Limits how long to wait for the browser.
    #[must_use]
    pub const fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    /// Also asks for the full mail scope, so the token works for IMAP.
    #[must_use]
    pub const fn with_imap_access(mut self) -> Self {
        self.imap_access = true;
        self
    }

    /// Signs in. `on_url` receives the consent URL to open in a browser.
    ///
    /// # Errors
    ///
    /// Fails if the user declines, the exchange fails, the ID token is
    /// missing or a required scope was not granted.
    pub async fn sign_in(&self, on_url: impl FnOnce(&Url)) -> Result<GoogleAccount> {
        let redirect = self
            .client
            .redirect_uri
            .as_deref()
            .unwrap_or("http://127.0.0.1:0");
        let mut receiver = LoopbackReceiver::bind(redirect).await?;
        if let Some(wait) = self.wait {
            receiver = receiver.with_wait(wait);
        }

        let client = self
            .client
            .clone()
            .with_redirect_uri(receiver.redirect_uri());
        let mut flow = AuthorizationCodeFlow::new(client);
        if self.imap_access {
            flow = flow.with_scope(scope::MAIL);
        }
        let state = purse_oauth::flow::random_state();
        let url = flow.authorization_url(&state)?;

        debug!(redirect = receiver.redirect_uri(), "waiting for Google consent");
        on_url(&url);

        let code = receiver.wait_for_code(&state).await?;
        let token = flow.exchange_code(&code).await?;

        if let Err(e) = check_grant(&token, self.imap_access) {
            self.revoke(&token).await;
            return Err(e.into());
        }

        let info = flow.client().fetch_user_info(&token).await?;
        let gmail_access = scope::scope_granted(token.granted_scopes(), scope::GMAIL_READONLY);
        let imap_access = has_imap_access(&token);
        info!(email = %info.email, gmail_access, imap_access, "signed in with Google");

        Ok(GoogleAccount {
            info,
            token,
            gmail_access,
            imap_access,
        })
    }

    /// Returns a usable token, refreshing it if it expired.
    ///
    /// # Errors
    ///
    /// Returns an error if a refresh is needed and fails.
    pub async fn fresh_token(&self, token: &Token) -> Result<Token> {
        if !token.is_expired() {
            return Ok(token.clone());
        }
        debug!("access token expired, refreshing");
        Ok(self.client.refresh_token(token).await?)
    }

    /// Revokes `token`. Failures are logged, not returned.
    pub async fn revoke(&self, token: &Token) {
        if let Err(e) = self.client.revoke(token).await {
            warn!("failed to revoke Google token: {e}");
        }
    }
}

/// True when `token` may log in to IMAP with XOAUTH2.
#[must_use]
pub fn has_imap_access(token: &Token) -> bool {
    scope::scope_granted(token.granted_scopes(), scope::MAIL)
}

/// Checks that a sign-in returned an ID token and every required scope,
/// plus the full mail scope when `imap` is set.
///
/// # Errors
///
/// Returns [`purse_oauth::Error::MissingIdToken`] or
/// [`purse_oauth::Error::MissingScopes`].
pub fn check_grant(token: &Token, imap: bool) -> purse_oauth::Result<()> {
    if token.id_token.is_none() {
        return Err(purse_oauth::Error::MissingIdToken);
    }
    let mut missing = scope::missing_required(token.granted_scopes());
    if imap && !has_imap_access(token) {
        missing.push(scope::MAIL.to_string());
    }
    if !missing.is_empty() {
        return Err(purse_oauth::Error::MissingScopes(missing));
    }
    Ok(())
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

    const FULL: &str = "openid https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile https://www.googleapis.com/auth/gmail.readonly";

    #[test]
    fn test_check_grant_ok() {
        let token = Token::new("a", "Bearer")
            .with_scope(FULL)
            .with_id_token("eyJ.x.y");
        assert!(check_grant(&token, false).is_ok());
    }

    #[test]
    fn test_check_grant_missing_id_token() {
        let token = Token::new("a", "Bearer").with_scope(FULL);
        assert!(matches!(
            check_grant(&token, false),
            Err(purse_oauth::Error::MissingIdToken)
        ));
    }

    #[test]
    fn test_check_grant_missing_gmail() {
        let token = Token::new("a", "Bearer")
            .with_scope("openid email profile")
            .with_id_token("eyJ.x.y");
        let Err(purse_oauth::Error::MissingScopes(missing)) = check_grant(&token, false) else {
            panic!("expected missing scopes");
        };
        assert_eq!(missing, vec![scope::GMAIL_READONLY.to_string()]);
    }

    #[test]
    fn test_check_grant_imap_needs_mail_scope() {
        let token = Token::new("a", "Bearer")
            .with_scope(FULL)
            .with_id_token("eyJ.x.y");
        assert!(!has_imap_access(&token));
        let Err(purse_oauth::Error::MissingScopes(missing)) = check_grant(&token, true) else {
            panic!("expected missing scopes");
        };
        assert_eq!(missing, vec![scope::MAIL.to_string()]);

        let token = Token::new("a", "Bearer")
            .with_scope(format!("{FULL} {}", scope::MAIL))
            .with_id_token("eyJ.x.y");
        assert!(has_imap_access(&token));
        assert!(check_grant(&token, true).is_ok());
    }

    #[test]
    fn test_from_config_requires_client_id() {
        assert!(matches!(
            GoogleSignIn::from_config(&GoogleConfig::default()),
            Err(Error::Config(_))
        ));

        let config = GoogleConfig {
            client_id: Some("id.apps.googleusercontent.com".into()),
            ..GoogleConfig::default()
        };
        assert!(GoogleSignIn::from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_fresh_token_skips_refresh() {
        let service = GoogleSignIn::new(OAuthClient::new("id", Provider::google().unwrap()));
        let token = Token::new("still-good", "Bearer")
            .with_expires_at(chrono::Utc::now() + chrono::Duration::hours(1));
        let fresh = service.fresh_token(&token).await.unwrap();
        assert_eq!(fresh.access_token, "still-good");
    }
}
