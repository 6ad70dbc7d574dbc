//! IMAP response parsing.
//!
//! Covers the responses a mailbox probe sees: greetings, tagged
//! completions, capability lists, EXAMINE data, LIST, STATUS and SEARCH.
//! Anything else is kept as [`Untagged::Other`].

use crate::{Error, Result};

/// Status of a tagged or untagged status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// OK.
    Ok,
    /// NO.
    No,
    /// BAD.
    Bad,
    /// PREAUTH (greeting only).
    PreAuth,
    /// BYE.
    Bye,
}

impl Status {
    fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// Bracketed response code, e.g. `[PERMANENTFLAGS (\Seen)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `CAPABILITY` list sent inline.
    Capability(Vec<String>),
    /// Flags the client may change permanently.
    PermanentFlags(Vec<String>),
    /// Sequence number of the first unseen message.
    Unseen(u32),
    /// Mailbox UID validity.
    UidValidity(u32),
    /// Predicted next UID.
    UidNext(u32),
    /// Mailbox opened read-only.
    ReadOnly,
    /// Mailbox opened read-write.
    ReadWrite,
    /// RFC 5530 credentials rejection.
    AuthenticationFailed,
    /// Any other code, raw.
    Other(String),
}

impl ResponseCode {
    fn parse(content: &str) -> Self {
        let (name, args) = content.split_once(' ').unwrap_or((content, ""));
        let number = |wrap: fn(u32) -> Self| {
            args.trim()
                .parse()
                .map_or_else(|_| Self::Other(content.to_string()), wrap)
        };

        match name.to_ascii_uppercase().as_str() {
            "CAPABILITY" => Self::Capability(args.split_whitespace().map(String::from).collect()),
            "PERMANENTFLAGS" => Self::PermanentFlags(
                args.trim()
                    .trim_start_matches('(')
                    .trim_end_matches(')')
                    .split_whitespace()
                    .map(String::from)
                    .collect(),
            ),
            "UNSEEN" => number(Self::Unseen),
            "UIDVALIDITY" => number(Self::UidValidity),
            "UIDNEXT" => number(Self::UidNext),
            "READ-ONLY" => Self::ReadOnly,
            "READ-WRITE" => Self::ReadWrite,
            "AUTHENTICATIONFAILED" => Self::AuthenticationFailed,
            _ => Self::Other(content.to_string()),
        }
    }
}

/// One `* LIST` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Name attributes such as `\HasNoChildren` or `\Noselect`.
    pub attributes: Vec<String>,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub name: String,
}

impl ListItem {
    /// Returns true if the mailbox exists and can be opened.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.attributes.iter().any(|a| {
            a.eq_ignore_ascii_case("\\Noselect") || a.eq_ignore_ascii_case("\\NonExistent")
        })
    }
}

/// Items from a `* STATUS` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusItems {
    /// Mailbox name.
    pub mailbox: String,
    /// MESSAGES.
    pub messages: Option<u32>,
    /// UNSEEN.
    pub unseen: Option<u32>,
    /// RECENT.
    pub recent: Option<u32>,
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Untagged {
    /// `* OK|NO|BAD|PREAUTH|BYE [code] text`.
    Status {
        /// Status keyword.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`.
    Capability(Vec<String>),
    /// `* n EXISTS`.
    Exists(u32),
    /// `* n RECENT`.
    Recent(u32),
    /// `* FLAGS (...)`.
    Flags(Vec<String>),
    /// `* SEARCH n...`.
    Search(Vec<u32>),
    /// `* LIST ...`.
    List(ListItem),
    /// `* STATUS mailbox (...)`.
    MailboxStatus(StatusItems),
    /// Anything else, raw.
    Other(String),
}

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// Command tag.
        tag: String,
        /// Completion status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged data.
    Untagged(Untagged),
    /// `+ text` continuation request.
    Continuation(String),
}

impl Response {
    /// Parses one complete response as returned by
    /// [`FramedStream::read_response`](crate::FramedStream::read_response).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for a malformed tagged response or a
    /// truncated literal.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let mut p = Parser::new(input);

        if p.eat(b'+') {
            return Ok(Self::Continuation(p.text()));
        }

        if p.eat(b'*') {
            p.skip_spaces();
            return Ok(Self::Untagged(parse_untagged(&mut p)?));
        }

        let tag = p.atom()?.to_string();
        p.skip_spaces();
        let keyword = p.atom()?;
        let status = Status::from_keyword(keyword)
            .ok_or_else(|| Error::Protocol(format!("unknown status {keyword:?} for {tag}")))?;
        let (code, text) = p.code_and_text();

        Ok(Self::Tagged {
            tag,
            status,
            code,
            text,
        })
    }
}

fn parse_untagged(p: &mut Parser<'_>) -> Result<Untagged> {
    let word = p.atom()?;

    if let Ok(n) = word.parse::<u32>() {
        p.skip_spaces();
        let kind = p.atom()?;
        return Ok(match kind.to_ascii_uppercase().as_str() {
            "EXISTS" => Untagged::Exists(n),
            "RECENT" => Untagged::Recent(n),
            _ => Untagged::Other(format!("{n} {kind} {}", p.text()).trim_end().to_string()),
        });
    }

    if let Some(status) = Status::from_keyword(word) {
        let (code, text) = p.code_and_text();
        return Ok(Untagged::Status { status, code, text });
    }

    match word.to_ascii_uppercase().as_str() {
        "CAPABILITY" => Ok(Untagged::Capability(
            p.text().split_whitespace().map(String::from).collect(),
        )),
        "FLAGS" => {
            p.skip_spaces();
            Ok(Untagged::Flags(p.paren_list()?))
        }
        "SEARCH" => Ok(Untagged::Search(
            p.text()
                .split_whitespace()
                .filter_map(|n| n.parse().ok())
                .collect(),
        )),
        "LIST" | "LSUB" => {
            p.skip_spaces();
            let attributes = p.paren_list()?;
            p.skip_spaces();
            let delimiter = if p.peek() == Some(b'"') {
                p.quoted()?.chars().next()
            } else {
                // NIL
                p.atom()?;
                None
            };
            p.skip_spaces();
            let name = p.astring()?;
            Ok(Untagged::List(ListItem {
                attributes,
                delimiter,
                name,
            }))
        }
        "STATUS" => {
            p.skip_spaces();
            let mut items = StatusItems {
                mailbox: p.astring()?,
                ..StatusItems::default()
            };
            p.skip_spaces();
            for pair in p.paren_list()?.chunks(2) {
                let [name, value] = pair else { break };
                let value = value.parse().ok();
                match name.to_ascii_uppercase().as_str() {
                    "MESSAGES" => items.messages = value,
                    "UNSEEN" => items.unseen = value,
                    "RECENT" => items.recent = value,
                    _ => {}
                }
            }
            Ok(Untagged::MailboxStatus(items))
        }
        _ => Ok(Untagged::Other(
            format!("{word} {}", p.text()).trim_end().to_string(),
        )),
    }
}

/// Byte cursor over a single response.
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn atom(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(
                b,
                b' ' | b'(' | b')' | b'[' | b']' | b'"' | b'{' | b'\r' | b'\n'
            ) {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(Error::Protocol(format!(
                "expected atom at offset {start}"
            )));
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| Error::Protocol("atom is not UTF-8".to_string()))
    }

    /// Remaining bytes as text, CRLF stripped.
    fn text(&mut self) -> String {
        let rest = &self.input[self.pos.min(self.input.len())..];
        self.pos = self.input.len();
        let rest = rest.strip_suffix(b"\r\n").unwrap_or(rest);
        String::from_utf8_lossy(rest).trim_start().to_string()
    }

    fn code_and_text(&mut self) -> (Option<ResponseCode>, String) {
        self.skip_spaces();
        let mut code = None;
        if self.peek() == Some(b'[')
            && let Some(len) = self.input[self.pos..].iter().position(|&b| b == b']')
        {
            let content = String::from_utf8_lossy(&self.input[self.pos + 1..self.pos + len]);
            code = Some(ResponseCode::parse(&content));
            self.pos += len + 1;
        }
        (code, self.text())
    }

    fn astring(&mut self) -> Result<String> {
        match self.peek() {
            Some(b'"') => self.quoted(),
            Some(b'{') => self.literal(),
            _ => self.atom().map(str::to_string),
        }
    }

    fn quoted(&mut self) -> Result<String> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(String::from_utf8_lossy(&out).into_owned());
                }
                Some(b'\\') => {
                    self.pos += 1;
                    if let Some(b) = self.peek() {
                        out.push(b);
                        self.pos += 1;
                    }
                }
                Some(b'\r' | b'\n') | None => {
                    return Err(Error::Protocol("unterminated quoted string".to_string()));
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn literal(&mut self) -> Result<String> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let len: usize = std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| Error::Protocol("bad literal length".to_string()))?;
        self.eat(b'+');
        if !(self.eat(b'}') && self.eat(b'\r') && self.eat(b'\n')) {
            return Err(Error::Protocol("bad literal header".to_string()));
        }
        let data = self
            .input
            .get(self.pos..self.pos + len)
            .ok_or_else(|| Error::Protocol("truncated literal".to_string()))?;
        self.pos += len;
        Ok(String::from_utf8_lossy(data).into_owned())
    }

    fn paren_list(&mut self) -> Result<Vec<String>> {
        if !self.eat(b'(') {
            return Err(Error::Protocol("expected '('".to_string()));
        }
        let mut items = Vec::new();
        loop {
            self.skip_spaces();
            if self.eat(b')') {
                return Ok(items);
            }
            items.push(self.astring()?);
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
    fn test_parse_greeting_with_capabilities() {
        let resp = Response::parse(b"* OK [CAPABILITY IMAP4rev1 STARTTLS AUTH=PLAIN] ready\r\n")
            .unwrap();
        assert_eq!(
            resp,
            Response::Untagged(Untagged::Status {
                status: Status::Ok,
                code: Some(ResponseCode::Capability(vec![
                    "IMAP4rev1".into(),
                    "STARTTLS".into(),
                    "AUTH=PLAIN".into()
                ])),
                text: "ready".into(),
            })
        );
    }

    #[test]
    fn test_parse_tagged_no_with_code() {
        let resp =
            Response::parse(b"A0002 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n").unwrap();
        assert_eq!(
            resp,
            Response::Tagged {
                tag: "A0002".into(),
                status: Status::No,
                code: Some(ResponseCode::AuthenticationFailed),
                text: "Invalid credentials".into(),
            }
        );
    }

    #[test]
    fn test_parse_examine_data() {
        assert_eq!(
            Response::parse(b"* 172 EXISTS\r\n").unwrap(),
            Response::Untagged(Untagged::Exists(172))
        );
        assert_eq!(
            Response::parse(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n")
                .unwrap(),
            Response::Untagged(Untagged::Flags(vec![
                "\\Answered".into(),
                "\\Flagged".into(),
                "\\Deleted".into(),
                "\\Seen".into(),
                "\\Draft".into(),
            ]))
        );
        assert_eq!(
            Response::parse(b"* OK [PERMANENTFLAGS ()] No permanent flags permitted\r\n")
                .unwrap(),
            Response::Untagged(Untagged::Status {
                status: Status::Ok,
                code: Some(ResponseCode::PermanentFlags(vec![])),
                text: "No permanent flags permitted".into(),
            })
        );
        assert_eq!(
            Response::parse(b"* OK [UNSEEN 12] Message 12 is first unseen\r\n").unwrap(),
            Response::Untagged(Untagged::Status {
                status: Status::Ok,
                code: Some(ResponseCode::Unseen(12)),
                text: "Message 12 is first unseen".into(),
            })
        );
    }

    #[test]
    fn test_parse_tagged_read_only() {
        let resp = Response::parse(b"A0003 OK [READ-ONLY] EXAMINE completed\r\n").unwrap();
        assert!(matches!(
            resp,
            Response::Tagged {
                code: Some(ResponseCode::ReadOnly),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_list() {
        let resp = Response::parse(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n").unwrap();
        let Response::Untagged(Untagged::List(item)) = resp else {
            panic!("expected LIST");
        };
        assert_eq!(item.name, "INBOX");
        assert_eq!(item.delimiter, Some('/'));
        assert!(item.is_selectable());
    }

    #[test]
    fn test_parse_list_nil_delimiter_and_literal() {
        let resp = Response::parse(b"* LIST (\\NonExistent) NIL {5}\r\nINBOX\r\n").unwrap();
        let Response::Untagged(Untagged::List(item)) = resp else {
            panic!("expected LIST");
        };
        assert_eq!(item.name, "INBOX");
        assert_eq!(item.delimiter, None);
        assert!(!item.is_selectable());
    }

    #[test]
    fn test_parse_status() {
        let resp = Response::parse(b"* STATUS INBOX (MESSAGES 231 UNSEEN 3)\r\n").unwrap();
        assert_eq!(
            resp,
            Response::Untagged(Untagged::MailboxStatus(StatusItems {
                mailbox: "INBOX".into(),
                messages: Some(231),
                unseen: Some(3),
                recent: None,
            }))
        );
    }

    #[test]
    fn test_parse_search() {
        assert_eq!(
            Response::parse(b"* SEARCH 2 84 882\r\n").unwrap(),
            Response::Untagged(Untagged::Search(vec![2, 84, 882]))
        );
        assert_eq!(
            Response::parse(b"* SEARCH\r\n").unwrap(),
            Response::Untagged(Untagged::Search(vec![]))
        );
    }

    #[test]
    fn test_parse_continuation() {
        assert_eq!(
            Response::parse(b"+ eyJzdGF0dXMiOiI0MDAifQ==\r\n").unwrap(),
            Response::Continuation("eyJzdGF0dXMiOiI0MDAifQ==".into())
        );
        assert_eq!(
            Response::parse(b"+\r\n").unwrap(),
            Response::Continuation(String::new())
        );
    }

    #[test]
    fn test_parse_unknown_untagged_is_kept() {
        assert_eq!(
            Response::parse(b"* ID NIL\r\n").unwrap(),
            Response::Untagged(Untagged::Other("ID NIL".into()))
        );
    }

    #[test]
    fn test_parse_bad_tagged_status() {
        assert!(Response::parse(b"A0001 MAYBE done\r\n").is_err());
    }
}
