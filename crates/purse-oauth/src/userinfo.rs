//! `OpenID` Connect userinfo.

use serde::{Deserialize, Serialize};

/// The signed-in account, as reported by the userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Stable account id (`sub`).
    #[serde(rename = "sub")]
    pub id: String,
    /// Primary email address.
    pub email: String,
    /// Display name, absent when the profile scope was not granted.
    #[serde(default)]
    pub name: Option<String>,
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
    fn test_parse_google_userinfo() {
        let json = r#"{
            "sub": "110169484474386276334",
            "name": "Ana Pérez",
            "given_name": "Ana",
            "picture": "https://lh3.googleusercontent.com/a/x",
            "email": "ana@gmail.com",
            "email_verified": true
        }"#;
        let info: UserInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.id, "110169484474386276334");
        assert_eq!(info.email, "ana@gmail.com");
        assert_eq!(info.name.as_deref(), Some("Ana Pérez"));
    }

    #[test]
    fn test_name_optional() {
        let info: UserInfo = serde_json::from_str(r#"{"sub":"1","email":"a@b.c"}"#).unwrap();
        assert!(info.name.is_none());
    }
}
