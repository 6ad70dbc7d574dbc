//! `OAuth2` authorization flows.

mod code;
mod loopback;
mod pkce;

pub use code::AuthorizationCodeFlow;
pub use loopback::LoopbackReceiver;
pub use pkce::PkceChallenge;

use crate::error::Result;
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};
use crate::userinfo::UserInfo;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;

/// Common `OAuth2` client configuration.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from provider.
    pub client_id: String,
    /// Client secret (optional for public clients).
    pub client_secret: Option<String>,
    /// Redirect URI for authorization code flow.
    pub redirect_uri: Option<String>,
    /// Provider configuration.
    pub provider: Provider,
    /// HTTP client.
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Refreshes an access token using a refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails or if the token has no refresh token.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.client_id);

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        debug!(provider = %self.provider.name, "refreshing access token");
        let mut new_token = self.request_token(&params).await?;

        // Refresh responses omit what did not change.
        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }
        if new_token.id_token.is_none() {
            new_token.id_token.clone_from(&token.id_token);
        }
        if new_token.scope.is_none() {
            new_token.scope.clone_from(&token.scope);
        }

        Ok(new_token)
    }

    /// Exchanges an authorization code for tokens.
    pub(crate) async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<Token> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("client_id", &self.client_id);
        params.insert("code_verifier", code_verifier);

        if let Some(uri) = &self.redirect_uri {
            params.insert("redirect_uri", uri);
        }

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        debug!(provider = %self.provider.name, "exchanging authorization code");
        self.request_token(&params).await
    }

    async fn request_token(&self, params: &HashMap<&str, &str>) -> Result<Token> {
        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(error.into_error());
        }

        let token_response: TokenResponse = response.json().await?;
        Token::from_response(token_response)
    }

    /// Fetches the signed-in account from the userinfo endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Http`] if the request fails or is refused.
    pub async fn fetch_user_info(&self, token: &Token) -> Result<UserInfo> {
        let response = self
            .http_client
            .get(self.provider.userinfo_url.clone())
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Revokes a token. The refresh token is preferred since revoking it
    /// also invalidates the access tokens issued from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server refuses.
    pub async fn revoke(&self, token: &Token) -> Result<()> {
        let value = token
            .refresh_token
            .as_deref()
            .unwrap_or(&token.access_token);

        let response = self
            .http_client
            .post(self.provider.revoke_url.clone())
            .form(&[("token", value)])
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(error.into_error());
        }

        debug!(provider = %self.provider.name, "token revoked");
        Ok(())
    }
}

/// Generates a random `state` value for CSRF protection.
#[must_use]
pub fn random_state() -> String {
    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
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
    use crate::error::Error;

    #[test]
    fn test_oauth_client_with_secret() {
        let provider = Provider::google().unwrap();
        let client = OAuthClient::new("test_client_id", provider)
            .with_client_secret("secret")
            .with_redirect_uri("http://127.0.0.1:8765");

        assert_eq!(client.client_id, "test_client_id");
        assert_eq!(client.client_secret.as_deref(), Some("secret"));
        assert_eq!(client.redirect_uri.as_deref(), Some("http://127.0.0.1:8765"));
    }

    #[test]
    fn test_random_state_unique() {
        let a = random_state();
        let b = random_state();
        assert_eq!(a.len(), 22);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_revoke_unreachable_server() {
        let provider = Provider::under("Gone", "http://127.0.0.1:9").unwrap();
        let client = OAuthClient::new("id", provider);
        let err = client.revoke(&Token::new("a", "Bearer")).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
