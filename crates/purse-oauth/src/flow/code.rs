//! Authorization code grant for installed apps.

use url::Url;

use super::{OAuthClient, PkceChallenge};
use crate::error::{Error, Result};
use crate::token::Token;

/// One sign-in attempt: a fresh PKCE pair and the scopes to ask for.
///
/// Build a new flow for every attempt so that a verifier is never reused.
#[derive(Debug)]
pub struct AuthorizationCodeFlow {
    client: OAuthClient,
    pkce: PkceChallenge,
    scopes: Vec<String>,
}

impl AuthorizationCodeFlow {
    /// Starts an attempt asking for the provider's default scopes.
    #[must_use]
    pub fn new(client: OAuthClient) -> Self {
        let scopes = client.provider.scopes.clone();
        Self {
            client,
            pkce: PkceChallenge::generate(),
            scopes,
        }
    }

    /// Asks for `scope` as well, unless it is already requested.
    #[must_use]
    pub fn with_scope(mut self, scope: &str) -> Self {
        if !self.scopes.iter().any(|s| s == scope) {
            self.scopes.push(scope.to_string());
        }
        self
    }

    /// Scopes the consent screen will ask for.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// The client this attempt runs against.
    #[must_use]
    pub const fn client(&self) -> &OAuthClient {
        &self.client
    }

    /// Verifier sent with the code exchange.
    #[must_use]
    pub fn pkce_verifier(&self) -> &str {
        self.pkce.verifier()
    }

    /// Consent URL to open in the browser. `state` comes back on the
    /// redirect and must be checked there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the client has no redirect URI.
    pub fn authorization_url(&self, state: &str) -> Result<Url> {
        let redirect = self
            .client
            .redirect_uri
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig("no redirect URI to send the browser back to".into()))?;
        let scope = self.scopes.join(" ");

        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.client.client_id.as_str()),
            ("redirect_uri", redirect),
            ("state", state),
            ("code_challenge", self.pkce.challenge()),
            ("code_challenge_method", self.pkce.method()),
        ];
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }
        if self.client.provider.offline_access {
            params.extend([
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
            ]);
        }

        let mut url = self.client.provider.auth_url.clone();
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// Trades the code from the redirect for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the token endpoint refuses or cannot be reached.
    pub async fn exchange_code(&self, code: &str) -> Result<Token> {
        self.client.exchange_code(code, self.pkce.verifier()).await
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
    use crate::provider::Provider;
    use crate::scope;

    fn param(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    fn flow() -> AuthorizationCodeFlow {
        let client = OAuthClient::new("test_client", Provider::google().unwrap())
            .with_redirect_uri("http://127.0.0.1:8765");
        AuthorizationCodeFlow::new(client)
    }

    #[test]
    fn test_consent_url() {
        let flow = flow();
        let url = flow.authorization_url("random_state").unwrap();

        assert!(url.as_str().starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert_eq!(param(&url, "client_id").as_deref(), Some("test_client"));
        assert_eq!(param(&url, "response_type").as_deref(), Some("code"));
        assert_eq!(param(&url, "state").as_deref(), Some("random_state"));
        assert_eq!(param(&url, "redirect_uri").as_deref(), Some("http://127.0.0.1:8765"));
        assert_eq!(param(&url, "access_type").as_deref(), Some("offline"));
        assert_eq!(param(&url, "prompt").as_deref(), Some("consent"));
        assert_eq!(param(&url, "code_challenge_method").as_deref(), Some("S256"));
        assert_eq!(param(&url, "code_challenge").unwrap().len(), 43);
        assert_eq!(
            param(&url, "scope").unwrap(),
            format!("openid email profile {}", scope::GMAIL_READONLY)
        );
    }

    #[test]
    fn test_extra_scope_is_added_once() {
        let flow = flow().with_scope(scope::MAIL).with_scope(scope::MAIL).with_scope(scope::EMAIL);
        assert_eq!(flow.scopes().iter().filter(|s| *s == scope::MAIL).count(), 1);
        assert_eq!(flow.scopes().len(), 5);

        let url = flow.authorization_url("s").unwrap();
        assert!(param(&url, "scope").unwrap().ends_with(scope::MAIL));
    }

    #[test]
    fn test_requires_redirect_uri() {
        let flow = AuthorizationCodeFlow::new(OAuthClient::new("id", Provider::google().unwrap()));
        assert!(matches!(
            flow.authorization_url("s"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_each_attempt_gets_its_own_verifier() {
        assert_ne!(flow().pkce_verifier(), flow().pkce_verifier());
    }
}
