//! Framed I/O shared by the IMAP and POP3 clients.
//!
//! Both protocols use CRLF-terminated lines. IMAP additionally embeds
//! literals (`{n}\r\n<n bytes>`), which [`FramedStream::read_response`]
//! follows. Every read and write is bounded by an optional I/O timeout.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size. Probes never fetch bodies, so this stays small.
const MAX_LITERAL_SIZE: usize = 10 * 1024 * 1024; // 10 MB

/// Framed connection for line-based mail protocols.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    io_timeout: Option<Duration>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream without an I/O timeout.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            io_timeout: None,
        }
    }

    /// Creates a framed stream whose reads and writes fail with
    /// [`Error::Timeout`] after `limit`.
    pub fn with_timeout(stream: S, limit: Duration) -> Self {
        let mut framed = Self::new(stream);
        framed.io_timeout = Some(limit);
        framed
    }

    /// The configured I/O timeout, if any.
    #[must_use]
    pub const fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }

    /// Reads a complete IMAP response, following any literals.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(literal_len) = parse_literal_length(&line) else {
                break;
            };
            if literal_len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {literal_len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }

            let mut literal = vec![0u8; literal_len];
            within(self.io_timeout, self.reader.read_exact(&mut literal)).await?;
            response.extend_from_slice(&literal);
        }

        Ok(response)
    }

    /// Reads a single CRLF-terminated line, terminator included.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let limit = self.io_timeout;
        within(limit, read_crlf_line(&mut self.reader)).await?
    }

    /// Writes a command to the stream and flushes it.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let limit = self.io_timeout;
        let stream = self.reader.get_mut();
        let buffer = &self.write_buffer;
        within(limit, async move {
            stream.write_all(buffer).await?;
            stream.flush().await
        })
        .await?;

        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Runs an I/O future under an optional deadline.
async fn within<T, F>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout(limit))?
            .map_err(Error::from),
        None => fut.await.map_err(Error::from),
    }
}

async fn read_crlf_line<S: AsyncRead + Unpin>(
    reader: &mut BufReader<S>,
) -> io::Result<Result<Vec<u8>>> {
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            ));
        }

        // CR at the end of the previous fill, LF at the start of this one.
        if line.last() == Some(&b'\r') && buf.first() == Some(&b'\n') {
            line.push(b'\n');
            reader.consume(1);
            return Ok(Ok(line));
        }

        if let Some(pos) = find_crlf(buf) {
            line.extend_from_slice(&buf[..pos + 2]);
            reader.consume(pos + 2);
            return Ok(Ok(line));
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > MAX_LINE_LENGTH {
            return Ok(Err(Error::Protocol("line too long".to_string())));
        }
    }
}

/// Rejects an argument that would end a command line early.
pub(crate) fn single_line(field: &str, value: &str) -> Result<()> {
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
        return Err(Error::InvalidConfig(format!(
            "{field} must not contain line breaks"
        )));
    }
    Ok(())
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses a literal length from the end of a line.
///
/// Matches patterns like `{123}\r\n` or `{123+}\r\n` (non-synchronizing).
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let open = line.iter().rposition(|&b| b == b'{')?;

    let num_end = if line.ends_with(b"+}") {
        line.len() - 2
    } else if line.ends_with(b"}") {
        line.len() - 1
    } else {
        return None;
    };

    let num_str = std::str::from_utf8(line.get(open + 1..num_end)?).ok()?;
    num_str.parse().ok()
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

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"hello\r\n"), Some(5));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"no newline"), None);
        assert_eq!(find_crlf(b"just\n"), None);
    }

    #[test]
    fn test_single_line() {
        assert!(single_line("password", "pa ss\"word").is_ok());
        assert!(single_line("password", "contraseña").is_ok());
        for bad in ["a\r\nA0002 LOGOUT", "line\n", "nul\0"] {
            assert!(matches!(
                single_line("password", bad),
                Err(Error::InvalidConfig(ref t)) if t == "password must not contain line breaks"
            ));
        }
    }

    #[test]
    fn test_parse_literal_length() {
        assert_eq!(parse_literal_length(b"BODY {123}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(parse_literal_length(b"no literal\r\n"), None);
        assert_eq!(parse_literal_length(b"incomplete {123"), None);
        assert_eq!(parse_literal_length(b"wrong {abc}\r\n"), None);
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"+OK POP3 ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        let line = framed.read_line().await.unwrap();
        assert_eq!(line, b"+OK POP3 ready\r\n");
    }

    #[tokio::test]
    async fn test_read_line_split_crlf() {
        let mock = Builder::new().read(b"* OK ready\r").read(b"\n").build();
        let mut framed = FramedStream::new(mock);

        let line = framed.read_line().await.unwrap();
        assert_eq!(line, b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_read_with_literal() {
        let mock = Builder::new()
            .read(b"* LIST () \"/\" {5}\r\n")
            .read(b"INBOX\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* LIST () \"/\" {5}\r\nINBOX\r\n");
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"A0001 CAPABILITY\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command(b"A0001 CAPABILITY\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_is_io_error() {
        let mock = Builder::new().build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let header = format!("* 1 FETCH (BODY {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_line().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let mock = Builder::new().wait(Duration::from_secs(30)).build();
        let mut framed = FramedStream::with_timeout(mock, Duration::from_secs(10));

        let err = framed.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(10)));
    }
}
