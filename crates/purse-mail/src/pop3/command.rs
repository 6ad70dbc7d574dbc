//! POP3 commands.

/// POP3 command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPA (RFC 2449).
    Capa,
    /// STLS (RFC 2595).
    Stls,
    /// USER name.
    User(String),
    /// PASS secret.
    Pass(String),
    /// STAT.
    Stat,
    /// NOOP.
    Noop,
    /// QUIT.
    Quit,
}

impl Command {
    /// Serializes the command, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let line = match self {
            Self::Capa => "CAPA".to_string(),
            Self::Stls => "STLS".to_string(),
            Self::User(name) => format!("USER {name}"),
            Self::Pass(secret) => format!("PASS {secret}"),
            Self::Stat => "STAT".to_string(),
            Self::Noop => "NOOP".to_string(),
            Self::Quit => "QUIT".to_string(),
        };
        format!("{line}\r\n").into_bytes()
    }

    /// Keyword used in logs. Never includes arguments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capa => "CAPA",
            Self::Stls => "STLS",
            Self::User(_) => "USER",
            Self::Pass(_) => "PASS",
            Self::Stat => "STAT",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
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
    fn test_serialize() {
        assert_eq!(Command::Stat.serialize(), b"STAT\r\n");
        assert_eq!(
            Command::User("alice@example.com".into()).serialize(),
            b"USER alice@example.com\r\n"
        );
    }

    #[test]
    fn test_name_hides_secret() {
        assert_eq!(Command::Pass("hunter2".into()).name(), "PASS");
    }
}
