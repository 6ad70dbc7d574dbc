//! IMAP4rev1 client limited to what a mailbox probe needs.
//!
//! Uses the type-state pattern to enforce valid state transitions at compile
//! time:
//!
//! - `NotAuthenticated`: after the greeting
//! - `Authenticated`: after LOGIN or AUTHENTICATE
//! - `Selected`: after EXAMINE

mod client;
mod command;
mod mailbox;
mod response;

pub use client::{Authenticated, Client, NotAuthenticated, Selected};
pub use command::{Command, StatusAttribute, TagGenerator};
pub use mailbox::MailboxStatus;
pub use response::{ListItem, Response, ResponseCode, Status, StatusItems, Untagged};
