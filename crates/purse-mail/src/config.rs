//! Connection configuration and the resolver that builds it from user input.

use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Default connect timeout, matching what mobile mail clients use.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/write timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Mail retrieval protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    /// IMAP4rev1.
    #[default]
    Imap,
    /// POP3.
    Pop3,
}

impl Protocol {
    /// Returns the default port for this protocol under a security mode.
    #[must_use]
    pub const fn default_port(self, security: Security) -> u16 {
        match (self, security) {
            (Self::Imap, Security::Implicit) => 993,
            (Self::Imap, Security::StartTls | Security::None) => 143,
            (Self::Pop3, Security::Implicit) => 995,
            (Self::Pop3, Security::StartTls | Security::None) => 110,
        }
    }

    /// Canonical name, as stored in preferences.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Imap => "IMAP",
            Self::Pop3 => "POP3",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IMAP" | "IMAPS" | "IMAP4" => Ok(Self::Imap),
            "POP3" | "POP" | "POP3S" => Ok(Self::Pop3),
            _ => Err(Error::UnsupportedProtocol(s.to_string())),
        }
    }
}

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Security {
    /// No encryption. **Not recommended.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (IMAP) or STLS (POP3).
    StartTls,
    /// TLS from the start. **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Get display name for the security mode, as users type it.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::StartTls => "STARTTLS",
            Self::Implicit => "SSL/TLS",
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SSL/TLS" | "SSL" | "TLS" | "IMPLICIT" => Ok(Self::Implicit),
            "STARTTLS" | "STLS" => Ok(Self::StartTls),
            "NONE" | "PLAIN" | "PLAINTEXT" | "" => Ok(Self::None),
            _ => Err(Error::UnsupportedEncryption(s.to_string())),
        }
    }
}

/// How server certificates are checked during the TLS handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsTrust {
    /// Verify against the Mozilla root store (webpki-roots).
    #[default]
    WebPki,
    /// Trust whatever certificate the host presents. Only for self-hosted
    /// servers with self-signed certificates.
    AcceptAny,
}

/// Resolved connection properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Retrieval protocol.
    pub protocol: Protocol,
    /// Security mode.
    pub security: Security,
    /// Certificate trust mode.
    pub tls_trust: TlsTrust,
    /// TCP connect (and implicit TLS handshake) timeout.
    pub connect_timeout: Duration,
    /// Per-read/write timeout once connected.
    pub io_timeout: Duration,
}

impl Config {
    /// Creates a configuration with implicit TLS on the protocol's default port.
    #[must_use]
    pub fn new(host: impl Into<String>, protocol: Protocol) -> Self {
        ConfigBuilder::new(host, protocol).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>, protocol: Protocol) -> ConfigBuilder {
        ConfigBuilder::new(host, protocol)
    }

    /// True when TLS is negotiated before the greeting.
    #[must_use]
    pub const fn implicit_tls(&self) -> bool {
        matches!(self.security, Security::Implicit)
    }

    /// True when the session starts in plaintext and upgrades.
    #[must_use]
    pub const fn starttls_enabled(&self) -> bool {
        matches!(self.security, Security::StartTls)
    }

    /// True when a server without STARTTLS must be refused rather than used
    /// in plaintext. A configured upgrade is never skipped silently.
    #[must_use]
    pub const fn starttls_required(&self) -> bool {
        self.starttls_enabled()
    }

    /// `host:port` form used for TCP connect. IPv6 literals get brackets.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    protocol: Protocol,
    port: Option<u16>,
    security: Security,
    tls_trust: TlsTrust,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname and protocol.
    #[must_use]
    pub fn new(host: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            host: host.into(),
            protocol,
            port: None,
            security: Security::Implicit,
            tls_trust: TlsTrust::WebPki,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Sets the port. Zero means "use the default".
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = if port == 0 { None } else { Some(port) };
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the certificate trust mode.
    #[must_use]
    pub const fn tls_trust(mut self, trust: TlsTrust) -> Self {
        self.tls_trust = trust;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            port: self
                .port
                .unwrap_or_else(|| self.protocol.default_port(self.security)),
            host: self.host,
            protocol: self.protocol,
            security: self.security,
            tls_trust: self.tls_trust,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
    }
}

/// Resolves user-entered connection settings into a [`Config`].
///
/// Runs before any network activity, so an unknown server type or
/// encryption mode is reported as a configuration error.
///
/// # Errors
///
/// Returns [`Error::UnsupportedProtocol`], [`Error::UnsupportedEncryption`]
/// or [`Error::InvalidConfig`] for an empty host.
pub fn resolve(
    server_type: &str,
    host: &str,
    port: Option<u16>,
    encryption: &str,
) -> Result<Config> {
    let protocol: Protocol = server_type.parse()?;
    let security: Security = encryption.parse()?;

    let host = host.trim();
    if host.is_empty() {
        return Err(Error::InvalidConfig("server address is empty".into()));
    }

    Ok(ConfigBuilder::new(host, protocol)
        .security(security)
        .port(port.unwrap_or(0))
        .build())
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
    use proptest::prelude::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Protocol::Imap.default_port(Security::Implicit), 993);
        assert_eq!(Protocol::Imap.default_port(Security::StartTls), 143);
        assert_eq!(Protocol::Imap.default_port(Security::None), 143);
        assert_eq!(Protocol::Pop3.default_port(Security::Implicit), 995);
        assert_eq!(Protocol::Pop3.default_port(Security::StartTls), 110);
        assert_eq!(Protocol::Pop3.default_port(Security::None), 110);
    }

    #[test]
    fn test_parse_security_aliases() {
        assert_eq!("SSL/TLS".parse::<Security>().unwrap(), Security::Implicit);
        assert_eq!("ssl".parse::<Security>().unwrap(), Security::Implicit);
        assert_eq!("StartTLS".parse::<Security>().unwrap(), Security::StartTls);
        assert_eq!("none".parse::<Security>().unwrap(), Security::None);
        assert_eq!("".parse::<Security>().unwrap(), Security::None);
    }

    #[test]
    fn test_parse_unsupported_security() {
        let err = "SSLv2".parse::<Security>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncryption(ref s) if s == "SSLv2"));
    }

    #[test]
    fn test_parse_protocol() {
        assert_eq!("imap".parse::<Protocol>().unwrap(), Protocol::Imap);
        assert_eq!("POP3".parse::<Protocol>().unwrap(), Protocol::Pop3);
        assert!(matches!(
            "SMTP".parse::<Protocol>(),
            Err(Error::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("imap.example.com", Protocol::Imap);
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.tls_trust, TlsTrust::WebPki);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(config.implicit_tls());
        assert!(!config.starttls_enabled());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("pop.example.com", Protocol::Pop3)
            .security(Security::StartTls)
            .tls_trust(TlsTrust::AcceptAny)
            .connect_timeout(Duration::from_secs(3))
            .build();

        assert_eq!(config.port, 110);
        assert!(config.starttls_enabled());
        assert!(config.starttls_required());
        assert!(!config.implicit_tls());
        assert_eq!(config.tls_trust, TlsTrust::AcceptAny);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.address(), "pop.example.com:110");
    }

    #[test]
    fn test_address_brackets_ipv6_literals() {
        assert_eq!(Config::new("imap.example.com", Protocol::Imap).address(), "imap.example.com:993");
        assert_eq!(Config::new("192.0.2.7", Protocol::Pop3).address(), "192.0.2.7:995");
        assert_eq!(Config::new("::1", Protocol::Imap).address(), "[::1]:993");
        assert_eq!(Config::new("2001:db8::25", Protocol::Pop3).address(), "[2001:db8::25]:995");

        let address = Config::new("::1", Protocol::Imap).address();
        assert!(address.parse::<std::net::SocketAddr>().is_ok());
    }

    #[test]
    fn test_resolve_explicit_port() {
        let config = resolve("IMAP", "mail.example.com", Some(1993), "SSL/TLS").unwrap();
        assert_eq!(config.port, 1993);
    }

    #[test]
    fn test_resolve_zero_port_uses_default() {
        let config = resolve("POP3", "mail.example.com", Some(0), "SSL/TLS").unwrap();
        assert_eq!(config.port, 995);
    }

    #[test]
    fn test_resolve_rejects_empty_host() {
        assert!(matches!(
            resolve("IMAP", "  ", None, "SSL/TLS"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_unknown_encryption() {
        assert!(matches!(
            resolve("IMAP", "mail.example.com", None, "quantum"),
            Err(Error::UnsupportedEncryption(_))
        ));
    }

    fn protocol_name() -> impl Strategy<Value = (&'static str, Protocol)> {
        prop_oneof![
            Just(("IMAP", Protocol::Imap)),
            Just(("imap", Protocol::Imap)),
            Just(("POP3", Protocol::Pop3)),
            Just(("pop", Protocol::Pop3)),
        ]
    }

    fn encryption_name() -> impl Strategy<Value = (&'static str, Security)> {
        prop_oneof![
            Just(("SSL/TLS", Security::Implicit)),
            Just(("tls", Security::Implicit)),
            Just(("STARTTLS", Security::StartTls)),
            Just(("None", Security::None)),
        ]
    }

    proptest! {
        #[test]
        fn resolve_picks_default_port(
            (server_type, protocol) in protocol_name(),
            (encryption, security) in encryption_name(),
        ) {
            let config = resolve(server_type, "mail.example.com", None, encryption).unwrap();
            let expected = match (protocol, security) {
                (Protocol::Imap, Security::Implicit) => 993,
                (Protocol::Imap, _) => 143,
                (Protocol::Pop3, Security::Implicit) => 995,
                (Protocol::Pop3, _) => 110,
            };
            prop_assert_eq!(config.port, expected);
            prop_assert_eq!(config.protocol, protocol);
            prop_assert_eq!(config.security, security);
        }

        #[test]
        fn resolve_keeps_explicit_port(port in 1u16..) {
            let config = resolve("IMAP", "mail.example.com", Some(port), "STARTTLS").unwrap();
            prop_assert_eq!(config.port, port);
        }
    }
}
