//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::{Authenticated, Client, Selected};
use crate::Result;
use crate::imap::command::Command;
use crate::imap::response::Untagged;

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the sequence numbers of messages without `\Seen`.
    pub async fn search_unseen(&mut self) -> Result<Vec<u32>> {
        let exchange = self.run(Command::SearchUnseen, None).await?.ok()?;

        Ok(exchange
            .untagged
            .into_iter()
            .filter_map(|data| match data {
                Untagged::Search(ids) => Some(ids),
                _ => None,
            })
            .flatten()
            .collect())
    }

    /// Closes the mailbox and returns to the authenticated state.
    ///
    /// The mailbox was opened read-only, so nothing is expunged.
    pub async fn close(mut self) -> Result<Client<S, Authenticated>> {
        self.run(Command::Close, None).await?.ok()?;
        Ok(self.transition())
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
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_search_close_logout() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user pass\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"* 3 EXISTS\r\n")
            .read(b"A0002 OK [READ-ONLY] done\r\n")
            .write(b"A0003 SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 1 3\r\n")
            .read(b"A0003 OK SEARCH completed\r\n")
            .write(b"A0004 CLOSE\r\n")
            .read(b"A0004 OK CLOSE completed\r\n")
            .write(b"A0005 LOGOUT\r\n")
            .read(b"* BYE logging out\r\n")
            .read(b"A0005 OK LOGOUT completed\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("user", "pass").await.unwrap();
        let (mut inbox, status) = client.examine("INBOX").await.unwrap();
        assert_eq!(status.exists, 3);

        assert_eq!(inbox.search_unseen().await.unwrap(), vec![1, 3]);

        let client = inbox.close().await.unwrap();
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_tolerates_eof_after_bye() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user pass\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"A0002 OK [READ-ONLY] done\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE bye\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("user", "pass").await.unwrap();
        let (inbox, _) = client.examine("INBOX").await.unwrap();
        inbox.logout().await.unwrap();
    }
}
