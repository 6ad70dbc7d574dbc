//! Google scopes requested at sign-in and the checks applied to a grant.

/// `OpenID` Connect.
pub const OPENID: &str = "openid";
/// Primary email address.
pub const EMAIL: &str = "email";
/// Basic profile (name).
pub const PROFILE: &str = "profile";
/// Read-only Gmail access.
pub const GMAIL_READONLY: &str = "https://www.googleapis.com/auth/gmail.readonly";
/// Full mail access; needed for IMAP with XOAUTH2.
pub const MAIL: &str = "https://mail.google.com/";

/// Scopes a sign-in must be granted.
pub const REQUIRED: [&str; 3] = [EMAIL, PROFILE, GMAIL_READONLY];

/// Scopes requested at sign-in.
#[must_use]
pub fn sign_in_scopes() -> Vec<String> {
    [OPENID, EMAIL, PROFILE, GMAIL_READONLY]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Long forms Google reports for the short `email`/`profile` scopes.
fn aliases(scope: &str) -> &'static [&'static str] {
    match scope {
        EMAIL => &["https://www.googleapis.com/auth/userinfo.email"],
        PROFILE => &["https://www.googleapis.com/auth/userinfo.profile"],
        _ => &[],
    }
}

/// Returns true if `wanted` appears in the space-separated `granted` list.
#[must_use]
pub fn scope_granted(granted: &str, wanted: &str) -> bool {
    granted
        .split_whitespace()
        .any(|g| g == wanted || aliases(wanted).contains(&g))
}

/// Returns the required scopes missing from `granted`.
#[must_use]
pub fn missing_required(granted: &str) -> Vec<String> {
    REQUIRED
        .iter()
        .filter(|wanted| !scope_granted(granted, wanted))
        .map(|s| (*s).to_string())
        .collect()
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
    fn test_long_form_aliases() {
        let granted = "openid https://www.googleapis.com/auth/userinfo.email \
                       https://www.googleapis.com/auth/userinfo.profile \
                       https://www.googleapis.com/auth/gmail.readonly";
        assert!(scope_granted(granted, EMAIL));
        assert!(scope_granted(granted, PROFILE));
        assert!(missing_required(granted).is_empty());
    }

    #[test]
    fn test_missing_gmail() {
        let granted = "openid email profile";
        assert_eq!(missing_required(granted), vec![GMAIL_READONLY.to_string()]);
    }

    #[test]
    fn test_nothing_granted() {
        assert_eq!(missing_required("").len(), 3);
    }
}
