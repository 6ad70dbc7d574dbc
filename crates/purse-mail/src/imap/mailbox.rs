//! Mailbox state reported by EXAMINE.

use super::response::{ResponseCode, Untagged};

/// Mailbox status returned when a mailbox is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages (`* n EXISTS`).
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// Flags defined in the mailbox (`* FLAGS`).
    pub flags: Vec<String>,
    /// Flags the client can change permanently.
    pub permanent_flags: Vec<String>,
    /// Sequence number of the first unseen message, if reported.
    pub first_unseen: Option<u32>,
    /// UID validity.
    pub uid_validity: Option<u32>,
    /// Whether the mailbox was opened read-only.
    pub read_only: bool,
}

impl MailboxStatus {
    /// Returns true if the mailbox knows about `flag`.
    ///
    /// Read-only opens usually report an empty PERMANENTFLAGS list, so the
    /// FLAGS list counts as well.
    #[must_use]
    pub fn supports_flag(&self, flag: &str) -> bool {
        self.flags
            .iter()
            .chain(&self.permanent_flags)
            .any(|f| f.eq_ignore_ascii_case(flag))
    }

    pub(crate) fn absorb(&mut self, data: &Untagged) {
        match data {
            Untagged::Exists(n) => self.exists = *n,
            Untagged::Recent(n) => self.recent = *n,
            Untagged::Flags(flags) => self.flags.clone_from(flags),
            Untagged::Status {
                code: Some(code), ..
            } => self.absorb_code(code),
            _ => {}
        }
    }

    pub(crate) fn absorb_code(&mut self, code: &ResponseCode) {
        match code {
            ResponseCode::PermanentFlags(flags) => self.permanent_flags.clone_from(flags),
            ResponseCode::Unseen(n) => self.first_unseen = Some(*n),
            ResponseCode::UidValidity(n) => self.uid_validity = Some(*n),
            ResponseCode::ReadOnly => self.read_only = true,
            ResponseCode::ReadWrite => self.read_only = false,
            _ => {}
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
    fn test_supports_flag_from_flags_list() {
        let status = MailboxStatus {
            flags: vec!["\\Seen".into(), "\\Answered".into()],
            ..MailboxStatus::default()
        };
        assert!(status.supports_flag("\\SEEN"));
        assert!(!status.supports_flag("\\Draft"));
    }

    #[test]
    fn test_absorb_examine_data() {
        let mut status = MailboxStatus::default();
        status.absorb(&Untagged::Exists(5));
        status.absorb(&Untagged::Flags(vec!["\\Seen".into()]));
        status.absorb(&Untagged::Status {
            status: super::super::response::Status::Ok,
            code: Some(ResponseCode::UidValidity(3857529045)),
            text: "UIDs valid".into(),
        });
        status.absorb_code(&ResponseCode::ReadOnly);

        assert_eq!(status.exists, 5);
        assert_eq!(status.uid_validity, Some(3857529045));
        assert!(status.read_only);
        assert!(status.supports_flag("\\Seen"));
    }
}
