//! POP3 reply parsing.

use crate::{Error, Result};

/// A single-line POP3 status reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK text`.
    Ok(String),
    /// `-ERR text`.
    Err(String),
}

impl Reply {
    /// Parses a status line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the line starts with neither `+OK` nor
    /// `-ERR`.
    pub fn parse(line: &[u8]) -> Result<Self> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);

        let text = |rest: &str| rest.trim_start().to_string();
        if let Some(rest) = strip_prefix_ignore_case(line, "+OK") {
            Ok(Self::Ok(text(rest)))
        } else if let Some(rest) = strip_prefix_ignore_case(line, "-ERR") {
            Ok(Self::Err(text(rest)))
        } else {
            Err(Error::Protocol(format!("unexpected POP3 reply: {line}")))
        }
    }

    /// Returns the text of an `+OK`, or [`Error::No`] for `-ERR`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`] carrying the server text.
    pub fn into_ok(self) -> Result<String> {
        match self {
            Self::Ok(text) => Ok(text),
            Self::Err(text) => Err(Error::No(text)),
        }
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

/// Maildrop size reported by STAT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Maildrop {
    /// Number of messages.
    pub count: u32,
    /// Total size in octets.
    pub size: u64,
}

impl Maildrop {
    /// Parses the text of a STAT `+OK` reply (`nn mm`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if either number is missing.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split_whitespace();
        let count = parts.next().and_then(|n| n.parse().ok());
        let size = parts.next().and_then(|n| n.parse().ok());
        match (count, size) {
            (Some(count), Some(size)) => Ok(Self { count, size }),
            _ => Err(Error::Protocol(format!("malformed STAT reply: {text}"))),
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
    fn test_parse_ok_and_err() {
        assert_eq!(
            Reply::parse(b"+OK POP3 server ready\r\n").unwrap(),
            Reply::Ok("POP3 server ready".into())
        );
        assert_eq!(Reply::parse(b"+OK\r\n").unwrap(), Reply::Ok(String::new()));
        assert_eq!(
            Reply::parse(b"-ERR [AUTH] invalid password\r\n").unwrap(),
            Reply::Err("[AUTH] invalid password".into())
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Reply::parse(b"* OK imap here\r\n").is_err());
    }

    #[test]
    fn test_into_ok() {
        assert!(matches!(
            Reply::Err("locked".into()).into_ok(),
            Err(Error::No(ref t)) if t == "locked"
        ));
    }

    #[test]
    fn test_parse_stat() {
        assert_eq!(
            Maildrop::parse("2 320").unwrap(),
            Maildrop { count: 2, size: 320 }
        );
        assert!(Maildrop::parse("two").is_err());
    }
}
