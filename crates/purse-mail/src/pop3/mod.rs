//! POP3 client (RFC 1939) limited to what a mailbox probe needs.
//!
//! States: `Authorization` after the greeting, `Transaction` after
//! USER/PASS. POP3 has no read/unread flags; the maildrop only ever holds
//! messages that have not been downloaded and deleted.

mod client;
mod command;
mod response;

pub use client::{Authorization, Client, Transaction};
pub use command::Command;
pub use response::{Maildrop, Reply};
