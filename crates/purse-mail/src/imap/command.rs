//! IMAP command builder and tag generator.

use std::sync::atomic::{AtomicU32, Ordering};

/// Tag generator for IMAP commands.
///
/// Generates sequential tags in the format "A0001", "A0002", etc.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(1),
            prefix,
        }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{:04}", self.prefix, n)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

/// Status data items requested by [`Command::Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Number of messages.
    Messages,
    /// Number of messages without `\Seen`.
    Unseen,
    /// Number of messages with `\Recent`.
    Recent,
}

impl StatusAttribute {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Unseen => "UNSEEN",
            Self::Recent => "RECENT",
        }
    }
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY command.
    Capability,
    /// LOGOUT command.
    Logout,
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Initial response (SASL-IR), already base64-encoded.
        initial_response: Option<String>,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox name.
        mailbox: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: String,
        /// Requested items.
        items: Vec<StatusAttribute>,
    },
    /// SEARCH UNSEEN.
    SearchUnseen,
    /// CLOSE command.
    Close,
}

impl Command {
    /// Wire image of the command with the given tag, CRLF included.
    ///
    /// A command carrying literals is shown whole, as the server would see it
    /// once every continuation has been answered.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = self.segments(tag).join(&b"\r\n"[..]);
        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Splits the command at its synchronizing literals.
    ///
    /// The first segment is sent at once; each later one answers a `+`
    /// continuation. Segments carry no line terminator.
    #[must_use]
    pub fn segments(&self, tag: &str) -> Vec<Vec<u8>> {
        let mut out = Segments::new(tag);

        match self {
            Self::Capability => out.raw(b"CAPABILITY"),
            Self::Logout => out.raw(b"LOGOUT"),
            Self::StartTls => out.raw(b"STARTTLS"),
            Self::SearchUnseen => out.raw(b"SEARCH UNSEEN"),
            Self::Close => out.raw(b"CLOSE"),

            Self::Login { username, password } => {
                out.raw(b"LOGIN ");
                out.astring(username);
                out.raw(b" ");
                out.astring(password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                out.raw(b"AUTHENTICATE ");
                out.raw(mechanism.as_bytes());
                if let Some(resp) = initial_response {
                    out.raw(b" ");
                    out.raw(resp.as_bytes());
                }
            }

            Self::List { reference, pattern } => {
                out.raw(b"LIST ");
                out.astring(reference);
                out.raw(b" ");
                out.astring(pattern);
            }

            Self::Examine { mailbox } => {
                out.raw(b"EXAMINE ");
                out.astring(mailbox);
            }

            Self::Status { mailbox, items } => {
                out.raw(b"STATUS ");
                out.astring(mailbox);
                out.raw(b" (");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.raw(b" ");
                    }
                    out.raw(item.as_str().as_bytes());
                }
                out.raw(b")");
            }
        }

        out.parts
    }

    /// Name used in logs. Never includes arguments, so credentials stay out.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::List { .. } => "LIST",
            Self::Examine { .. } => "EXAMINE",
            Self::Status { .. } => "STATUS",
            Self::SearchUnseen => "SEARCH",
            Self::Close => "CLOSE",
        }
    }
}

/// Command bytes split wherever a literal forces a round trip.
struct Segments {
    parts: Vec<Vec<u8>>,
}

impl Segments {
    fn new(tag: &str) -> Self {
        let mut first = tag.as_bytes().to_vec();
        first.push(b' ');
        Self { parts: vec![first] }
    }

    fn current(&mut self) -> &mut Vec<u8> {
        if self.parts.is_empty() {
            self.parts.push(Vec::new());
        }
        let last = self.parts.len() - 1;
        &mut self.parts[last]
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.current().extend_from_slice(bytes);
    }

    /// Atom, quoted string, or a literal for 8-bit text, which a quoted
    /// string cannot carry.
    fn astring(&mut self, s: &str) {
        if !s.is_ascii() {
            let header = format!("{{{}}}", s.len());
            self.raw(header.as_bytes());
            self.parts.push(s.as_bytes().to_vec());
        } else if s.is_empty() || s.bytes().any(needs_quoting) {
            let buf = self.current();
            buf.push(b'"');
            for b in s.bytes() {
                if b == b'"' || b == b'\\' {
                    buf.push(b'\\');
                }
                buf.push(b);
            }
            buf.push(b'"');
        } else {
            self.raw(s.as_bytes());
        }
    }
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
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
    fn test_tag_generation() {
        let generator = TagGenerator::default();
        assert_eq!(generator.next(), "A0001");
        assert_eq!(generator.next(), "A0002");
    }

    #[test]
    fn test_serialize_login_quotes_specials() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pa ss\"word".to_string(),
        };
        assert_eq!(
            cmd.serialize("A0001"),
            b"A0001 LOGIN user@example.com \"pa ss\\\"word\"\r\n"
        );
    }

    #[test]
    fn test_login_sends_8bit_password_as_literal() {
        let cmd = Command::Login {
            username: "ana".to_string(),
            password: "contraseña".to_string(),
        };
        let segments = cmd.segments("A0001");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], b"A0001 LOGIN ana {11}");
        assert_eq!(segments[1], "contraseña".as_bytes());
        assert_eq!(
            cmd.serialize("A0001"),
            "A0001 LOGIN ana {11}\r\ncontraseña\r\n".as_bytes()
        );
    }

    #[test]
    fn test_login_with_two_literals() {
        let cmd = Command::Login {
            username: "josé".to_string(),
            password: "ñandú".to_string(),
        };
        let segments = cmd.segments("A0001");
        assert_eq!(segments[0], b"A0001 LOGIN {5}");
        assert_eq!(segments[1], "josé {7}".as_bytes());
        assert_eq!(segments[2], "ñandú".as_bytes());
    }

    #[test]
    fn test_ascii_login_is_one_segment() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(cmd.segments("A0001"), vec![b"A0001 LOGIN user secret".to_vec()]);
    }

    #[test]
    fn test_serialize_list_empty_reference() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "INBOX".to_string(),
        };
        assert_eq!(cmd.serialize("A0002"), b"A0002 LIST \"\" INBOX\r\n");
    }

    #[test]
    fn test_serialize_status() {
        let cmd = Command::Status {
            mailbox: "INBOX".to_string(),
            items: vec![StatusAttribute::Messages, StatusAttribute::Unseen],
        };
        assert_eq!(
            cmd.serialize("A0003"),
            b"A0003 STATUS INBOX (MESSAGES UNSEEN)\r\n"
        );
    }

    #[test]
    fn test_serialize_authenticate() {
        let cmd = Command::Authenticate {
            mechanism: "XOAUTH2".to_string(),
            initial_response: Some("dXNlcg==".to_string()),
        };
        assert_eq!(
            cmd.serialize("A0004"),
            b"A0004 AUTHENTICATE XOAUTH2 dXNlcg==\r\n"
        );
    }

    #[test]
    fn test_name_hides_arguments() {
        let cmd = Command::Login {
            username: "u".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(cmd.name(), "LOGIN");
    }
}
