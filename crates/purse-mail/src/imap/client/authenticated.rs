//! Implementation for the authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::{Authenticated, Client, Selected};
use crate::imap::command::{Command, StatusAttribute};
use crate::imap::mailbox::MailboxStatus;
use crate::imap::response::{ListItem, Status, StatusItems, Untagged};
use crate::{Error, Result};

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Lists mailboxes matching a pattern.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListItem>> {
        let exchange = self
            .run(
                Command::List {
                    reference: reference.to_string(),
                    pattern: pattern.to_string(),
                },
                None,
            )
            .await?
            .ok()?;

        Ok(exchange
            .untagged
            .into_iter()
            .filter_map(|data| match data {
                Untagged::List(item) => Some(item),
                _ => None,
            })
            .collect())
    }

    /// Returns true if `mailbox` exists and can be opened.
    ///
    /// `INBOX` is matched case-insensitively, other names exactly.
    pub async fn mailbox_exists(&mut self, mailbox: &str) -> Result<bool> {
        let items = self.list("", mailbox).await?;
        let inbox = mailbox.eq_ignore_ascii_case("INBOX");
        Ok(items.iter().any(|item| {
            let same = if inbox {
                item.name.eq_ignore_ascii_case(mailbox)
            } else {
                item.name == mailbox
            };
            same && item.is_selectable()
        }))
    }

    /// Opens a mailbox read-only with EXAMINE.
    ///
    /// A refusal (`NO`) is reported as [`Error::Mailbox`].
    pub async fn examine(mut self, mailbox: &str) -> Result<(Client<S, Selected>, MailboxStatus)> {
        let exchange = self
            .run(
                Command::Examine {
                    mailbox: mailbox.to_string(),
                },
                None,
            )
            .await?;

        if exchange.status == Status::No {
            return Err(Error::Mailbox(format!("{mailbox}: {}", exchange.text)));
        }
        let exchange = exchange.ok()?;

        let mut status = MailboxStatus {
            read_only: true,
            ..MailboxStatus::default()
        };
        for data in &exchange.untagged {
            status.absorb(data);
        }
        if let Some(code) = &exchange.code {
            status.absorb_code(code);
        }

        Ok((self.transition(), status))
    }

    /// Asks for MESSAGES and UNSEEN without opening the mailbox.
    pub async fn status(&mut self, mailbox: &str) -> Result<StatusItems> {
        let exchange = self
            .run(
                Command::Status {
                    mailbox: mailbox.to_string(),
                    items: vec![StatusAttribute::Messages, StatusAttribute::Unseen],
                },
                None,
            )
            .await?;

        if exchange.status == Status::No {
            return Err(Error::Mailbox(format!("{mailbox}: {}", exchange.text)));
        }

        exchange
            .ok()?
            .untagged
            .into_iter()
            .find_map(|data| match data {
                Untagged::MailboxStatus(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| Error::Protocol("STATUS returned no data".to_string()))
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
    use crate::imap::NotAuthenticated;
    use tokio_test::io::{Builder, Mock};

    async fn logged_in(mock: Mock) -> Client<Mock, Authenticated> {
        let client: Client<Mock, NotAuthenticated> = Client::from_stream(mock).await.unwrap();
        client.login("user", "pass").await.unwrap()
    }

    fn session() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user pass\r\n")
            .read(b"A0001 OK LOGIN completed\r\n");
        builder
    }

    #[tokio::test]
    async fn test_mailbox_exists_inbox_any_case() {
        let mock = session()
            .write(b"A0002 LIST \"\" INBOX\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" Inbox\r\n")
            .read(b"A0002 OK LIST completed\r\n")
            .build();
        let mut client = logged_in(mock).await;
        assert!(client.mailbox_exists("INBOX").await.unwrap());
    }

    #[tokio::test]
    async fn test_mailbox_missing() {
        let mock = session()
            .write(b"A0002 LIST \"\" Archive\r\n")
            .read(b"A0002 OK LIST completed\r\n")
            .build();
        let mut client = logged_in(mock).await;
        assert!(!client.mailbox_exists("Archive").await.unwrap());
    }

    #[tokio::test]
    async fn test_examine_collects_status() {
        let mock = session()
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"* 17 EXISTS\r\n")
            .read(b"* 2 RECENT\r\n")
            .read(b"* OK [UNSEEN 8] first unseen\r\n")
            .read(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n")
            .read(b"* OK [PERMANENTFLAGS ()] No permanent flags permitted\r\n")
            .read(b"A0002 OK [READ-ONLY] EXAMINE completed\r\n")
            .build();
        let client = logged_in(mock).await;
        let (_selected, status) = client.examine("INBOX").await.unwrap();

        assert_eq!(status.exists, 17);
        assert_eq!(status.recent, 2);
        assert_eq!(status.first_unseen, Some(8));
        assert!(status.read_only);
        assert!(status.permanent_flags.is_empty());
        assert!(status.supports_flag("\\Seen"));
    }

    #[tokio::test]
    async fn test_examine_refused_is_mailbox_error() {
        let mock = session()
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"A0002 NO Mailbox does not exist\r\n")
            .build();
        let client = logged_in(mock).await;
        let err = client.examine("INBOX").await.unwrap_err();
        assert!(matches!(err, Error::Mailbox(_)));
    }

    #[tokio::test]
    async fn test_status() {
        let mock = session()
            .write(b"A0002 STATUS INBOX (MESSAGES UNSEEN)\r\n")
            .read(b"* STATUS INBOX (MESSAGES 40 UNSEEN 6)\r\n")
            .read(b"A0002 OK STATUS completed\r\n")
            .build();
        let mut client = logged_in(mock).await;
        let items = client.status("INBOX").await.unwrap();
        assert_eq!(items.messages, Some(40));
        assert_eq!(items.unseen, Some(6));
    }
}
