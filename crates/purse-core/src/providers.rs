//! Server settings for well-known mail providers.

use purse_mail::{Protocol, Security};

/// Where one protocol of a provider is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerPreset {
    /// Server host name.
    pub host: &'static str,
    /// Server port.
    pub port: u16,
    /// Encryption mode.
    pub security: Security,
}

impl ServerPreset {
    const fn tls(host: &'static str, port: u16) -> Self {
        Self {
            host,
            port,
            security: Security::Implicit,
        }
    }
}

/// A mail provider and its IMAP and POP3 servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPreset {
    /// Display name.
    pub name: &'static str,
    /// Email domains hosted by the provider.
    pub domains: &'static [&'static str],
    /// IMAP server.
    pub imap: ServerPreset,
    /// POP3 server.
    pub pop3: ServerPreset,
    /// Something the user has to do first, such as enabling IMAP access.
    pub note: Option<&'static str>,
}

impl ProviderPreset {
    /// Server settings for `protocol`.
    #[must_use]
    pub const fn server(&self, protocol: Protocol) -> ServerPreset {
        match protocol {
            Protocol::Imap => self.imap,
            Protocol::Pop3 => self.pop3,
        }
    }
}

/// Known providers.
pub static PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        name: "Gmail",
        domains: &["gmail.com", "googlemail.com"],
        imap: ServerPreset::tls("imap.gmail.com", 993),
        pop3: ServerPreset::tls("pop.gmail.com", 995),
        note: Some("Requires an app password, or sign in with Google"),
    },
    ProviderPreset {
        name: "Outlook",
        domains: &["outlook.com", "hotmail.com", "live.com"],
        imap: ServerPreset::tls("outlook.office365.com", 993),
        pop3: ServerPreset::tls("outlook.office365.com", 995),
        note: None,
    },
    ProviderPreset {
        name: "Disroot",
        domains: &["disroot.org"],
        imap: ServerPreset::tls("disroot.org", 993),
        pop3: ServerPreset::tls("disroot.org", 995),
        note: None,
    },
    ProviderPreset {
        name: "Cock.li",
        domains: &["cock.li"],
        imap: ServerPreset::tls("mail.cock.li", 993),
        pop3: ServerPreset::tls("mail.cock.li", 995),
        note: None,
    },
    ProviderPreset {
        name: "Posteo",
        domains: &["posteo.de", "posteo.net"],
        imap: ServerPreset::tls("posteo.de", 993),
        pop3: ServerPreset::tls("posteo.de", 995),
        note: None,
    },
    ProviderPreset {
        name: "GMX",
        domains: &["gmx.com", "gmx.net", "gmx.de"],
        imap: ServerPreset::tls("imap.gmx.com", 993),
        pop3: ServerPreset::tls("pop.gmx.com", 995),
        note: Some("Enable POP3/IMAP access in the GMX web settings first"),
    },
    ProviderPreset {
        name: "WEB.DE",
        domains: &["web.de"],
        imap: ServerPreset::tls("imap.web.de", 993),
        pop3: ServerPreset::tls("pop3.web.de", 995),
        note: Some("Enable POP3/IMAP access in the WEB.DE web settings first"),
    },
    ProviderPreset {
        name: "mail.de",
        domains: &["mail.de"],
        imap: ServerPreset::tls("imap.mail.de", 993),
        pop3: ServerPreset::tls("pop.mail.de", 995),
        note: None,
    },
];

/// Looks up a provider by name, ignoring case.
#[must_use]
pub fn find(name: &str) -> Option<&'static ProviderPreset> {
    let name = name.trim();
    PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Looks up the provider hosting `email`.
#[must_use]
pub fn for_email(email: &str) -> Option<&'static ProviderPreset> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    let domain = domain.to_ascii_lowercase();
    PRESETS
        .iter()
        .find(|p| p.domains.contains(&domain.as_str()))
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
    fn test_find_by_name() {
        let gmx = find("gmx").unwrap();
        assert_eq!(gmx.server(Protocol::Pop3).host, "pop.gmx.com");
        assert!(find("Yahoo").is_none());
    }

    #[test]
    fn test_for_email() {
        assert_eq!(for_email("Ana@GMAIL.com").unwrap().name, "Gmail");
        assert_eq!(for_email("bob@hotmail.com").unwrap().name, "Outlook");
        assert!(for_email("carol@example.org").is_none());
        assert!(for_email("not-an-address").is_none());
    }

    #[test]
    fn test_presets_use_default_ports() {
        for preset in PRESETS {
            for protocol in [Protocol::Imap, Protocol::Pop3] {
                let server = preset.server(protocol);
                assert_eq!(
                    server.port,
                    protocol.default_port(server.security),
                    "{} {protocol}",
                    preset.name
                );
            }
        }
    }
}
