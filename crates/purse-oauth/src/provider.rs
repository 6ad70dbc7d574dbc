//! Where the authorization server lives and what a sign-in asks it for.

use url::Url;

use crate::error::{Error, Result};
use crate::scope;

const GOOGLE_AUTH: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const GOOGLE_REVOKE: &str = "https://oauth2.googleapis.com/revoke";

/// Endpoints of an authorization server plus the scopes asked for by
/// default.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Shown in logs.
    pub name: String,
    /// Consent page the browser is sent to.
    pub auth_url: Url,
    /// Code exchange and refresh.
    pub token_url: Url,
    /// `OpenID` Connect userinfo.
    pub userinfo_url: Url,
    /// Token revocation.
    pub revoke_url: Url,
    /// Scopes requested when the caller names none.
    pub scopes: Vec<String>,
    /// Ask for a refresh token with `access_type=offline` and force the
    /// consent screen so that one is actually issued.
    pub offline_access: bool,
}

impl Provider {
    /// Google's production endpoints with the sign-in scopes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if an endpoint fails to parse.
    pub fn google() -> Result<Self> {
        Ok(Self {
            name: "Google".into(),
            auth_url: Url::parse(GOOGLE_AUTH)?,
            token_url: Url::parse(GOOGLE_TOKEN)?,
            userinfo_url: Url::parse(GOOGLE_USERINFO)?,
            revoke_url: Url::parse(GOOGLE_REVOKE)?,
            scopes: scope::sign_in_scopes(),
            offline_access: true,
        })
    }

    /// A Google-compatible server with every endpoint under `base`:
    /// `/auth`, `/token`, `/userinfo` and `/revoke`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when `base` is not an absolute
    /// http(s) URL.
    pub fn under(name: impl Into<String>, base: &str) -> Result<Self> {
        let base = base.trim_end_matches('/');
        let endpoint = |path: &str| -> Result<Url> {
            let url = Url::parse(&format!("{base}/{path}"))
                .map_err(|e| Error::InvalidConfig(format!("{path} endpoint under {base}: {e}")))?;
            if matches!(url.scheme(), "http" | "https") {
                Ok(url)
            } else {
                Err(Error::InvalidConfig(format!("{base} is not an http(s) URL")))
            }
        };

        Ok(Self {
            name: name.into(),
            auth_url: endpoint("auth")?,
            token_url: endpoint("token")?,
            userinfo_url: endpoint("userinfo")?,
            revoke_url: endpoint("revoke")?,
            scopes: scope::sign_in_scopes(),
            offline_access: true,
        })
    }

    /// Replaces the default scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
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

    #[test]
    fn test_google_endpoints() {
        let google = Provider::google().unwrap();
        assert_eq!(google.token_url.host_str(), Some("oauth2.googleapis.com"));
        assert_eq!(google.revoke_url.path(), "/revoke");
        assert!(google.offline_access);
        assert!(google.scopes.iter().any(|s| s == scope::GMAIL_READONLY));
    }

    #[test]
    fn test_under_base() {
        let local = Provider::under("Local", "http://127.0.0.1:9000/").unwrap();
        assert_eq!(local.auth_url.as_str(), "http://127.0.0.1:9000/auth");
        assert_eq!(local.userinfo_url.as_str(), "http://127.0.0.1:9000/userinfo");
        assert_eq!(local.scopes, scope::sign_in_scopes());
    }

    #[test]
    fn test_under_rejects_bad_base() {
        assert!(matches!(
            Provider::under("Broken", "not a url"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Provider::under("Mail", "imap://127.0.0.1"),
            Err(Error::InvalidConfig(ref t)) if t.contains("not an http(s) URL")
        ));
    }

    #[test]
    fn test_with_scopes() {
        let provider = Provider::google()
            .unwrap()
            .with_scopes([scope::OPENID, scope::MAIL]);
        assert_eq!(provider.scopes, vec![scope::OPENID.to_string(), scope::MAIL.to_string()]);
    }
}
