//! Type-state IMAP client connection.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;

use std::collections::VecDeque;
use std::io;
use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use super::command::{Command, TagGenerator};
use super::response::{Response, ResponseCode, Status, Untagged};
use crate::framed::FramedStream;
use crate::{Error, Result};

/// Marker type for the not-authenticated state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Marker type for the authenticated state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// Marker type for the selected state (mailbox opened with EXAMINE).
#[derive(Debug, Clone, Copy, Default)]
pub struct Selected;

/// IMAP client connection with type-state.
///
/// The type parameter `State` tracks the connection state at compile time.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<String>,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Everything the server sent for one command.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub untagged: Vec<Untagged>,
    pub status: Status,
    pub code: Option<ResponseCode>,
    pub text: String,
}

impl Exchange {
    /// Turns a NO/BAD/BYE completion into an error.
    pub fn ok(self) -> Result<Self> {
        match self.status {
            Status::Ok | Status::PreAuth => Ok(self),
            Status::No => Err(Error::No(self.text)),
            Status::Bad => Err(Error::Bad(self.text)),
            Status::Bye => Err(Error::Bye(self.text)),
        }
    }
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            _state: PhantomData,
        }
    }

    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Checks if the server has a capability (case-insensitive).
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Returns true if LOGIN is disabled (e.g., before STARTTLS).
    #[must_use]
    pub fn login_disabled(&self) -> bool {
        self.has_capability("LOGINDISABLED")
    }

    /// Returns true if the server offers STARTTLS.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.has_capability("STARTTLS")
    }

    /// Sends a CAPABILITY command and updates the stored capabilities.
    pub async fn capability(&mut self) -> Result<Vec<String>> {
        self.run(Command::Capability, None).await?.ok()?;
        Ok(self.capabilities.clone())
    }

    /// Gracefully disconnects from the server.
    ///
    /// The server's answer is not checked; the connection is closed either way.
    pub async fn logout(mut self) -> Result<()> {
        match self.run(Command::Logout, None).await {
            Ok(_) | Err(Error::Bye(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Sends a command and reads until its tagged completion.
    ///
    /// Capability data seen along the way replaces the stored list.
    /// Continuation requests are answered first with the command's literal
    /// segments, then with `pending` if set, and otherwise with an empty
    /// line, which cancels a SASL exchange.
    pub(crate) async fn run(
        &mut self,
        command: Command,
        pending: Option<Vec<u8>>,
    ) -> Result<Exchange> {
        let tag = self.tag_gen.next();
        debug!(tag = %tag, command = command.name(), "imap send");
        let mut segments: VecDeque<Vec<u8>> = command.segments(&tag).into();
        let mut first = segments.pop_front().unwrap_or_default();
        segments.extend(pending);
        first.extend_from_slice(b"\r\n");
        self.stream.write_command(&first).await?;

        let mut untagged = Vec::new();
        let mut farewell = None;

        loop {
            let bytes = match self.stream.read_response().await {
                Ok(bytes) => bytes,
                Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(farewell.map_or(Error::Io(e), Error::Bye));
                }
                Err(e) => return Err(e),
            };
            trace!(line = %String::from_utf8_lossy(&bytes).trim_end(), "imap recv");

            match Response::parse(&bytes)? {
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } if got == tag => {
                    if let Some(ResponseCode::Capability(caps)) = &code {
                        self.capabilities.clone_from(caps);
                    }
                    return Ok(Exchange {
                        untagged,
                        status,
                        code,
                        text,
                    });
                }
                Response::Tagged { tag: got, .. } => {
                    debug!(tag = %got, "ignoring completion for unknown tag");
                }
                Response::Continuation(_) => {
                    let mut answer = segments.pop_front().unwrap_or_default();
                    answer.extend_from_slice(b"\r\n");
                    self.stream.write_command(&answer).await?;
                }
                Response::Untagged(data) => {
                    match &data {
                        Untagged::Capability(caps)
                        | Untagged::Status {
                            code: Some(ResponseCode::Capability(caps)),
                            ..
                        } => self.capabilities.clone_from(caps),
                        Untagged::Status {
                            status: Status::Bye,
                            text,
                            ..
                        } => farewell = Some(text.clone()),
                        _ => {}
                    }
                    untagged.push(data);
                }
            }
        }
    }
}
