//! Line framing for the emulator pipe.
//!
//! Every message travels as one line:
//!
//! ```text
//! base64( <decimal length> "\n" <message bytes> ) "\n"
//! ```
//!
//! The outer line is what delimits a message; the decimal length inside is
//! informational. The reference emulator strips it on read and never writes
//! one back, so [`decode`] removes a leading length header only when it is
//! present and agrees with the body, and otherwise returns the decoded bytes
//! untouched. Response messages always begin with a protobuf tag byte, never
//! an ASCII digit, so the two forms cannot be confused.
//!
//! Control sentinels ([`Sentinel`]) share the pipe but are written as bare
//! lines outside this framing.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::FrameError;

/// Encodes one message as a complete wire line, terminator included.
///
/// # Example
///
/// ```
/// assert_eq!(apibed::frame::encode(b"hello"), "NQpoZWxsbw==\n");
/// ```
#[must_use]
pub fn encode(message: &[u8]) -> String {
    let header = message.len().to_string();
    let mut blob = Vec::with_capacity(header.len() + 1 + message.len());
    blob.extend_from_slice(header.as_bytes());
    blob.push(b'\n');
    blob.extend_from_slice(message);

    let mut line = STANDARD.encode(&blob);
    line.push('\n');
    line
}

/// Decodes one wire line back into message bytes.
///
/// The line may carry its `\n` or `\r\n` terminator or none at all.
///
/// # Errors
///
/// Returns [`FrameError::Encoding`] when the body is not valid Base64.
pub fn decode(line: &[u8]) -> Result<Vec<u8>, FrameError> {
    let blob = STANDARD
        .decode(strip_terminator(line))
        .map_err(FrameError::Encoding)?;
    Ok(strip_length_header(blob))
}

/// Writes one framed message and flushes it.
///
/// # Errors
///
/// Returns any I/O error raised by the writer.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, message: &[u8]) -> io::Result<()> {
    writer.write_all(encode(message).as_bytes())?;
    writer.flush()
}

/// Reads exactly one framed message.
///
/// Blocks until a full line arrives.
///
/// # Errors
///
/// Returns [`FrameError::Truncated`] when the stream ends before a line
/// terminator, [`FrameError::Io`] when the read fails, and
/// [`FrameError::Encoding`] for a malformed body.
pub fn read_frame<R: BufRead + ?Sized>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut line = Vec::new();
    let received = reader
        .read_until(b'\n', &mut line)
        .map_err(|error| FrameError::Io(Arc::new(error)))?;
    if received == 0 || !line.ends_with(b"\n") {
        return Err(FrameError::Truncated { received });
    }
    decode(&line)
}

/// Raw control lines understood by the emulator outside the framed protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Ask the emulator to exit.
    Quit,
    /// Ask the emulator to drop all in-memory state and keep running.
    Reset,
}

impl Sentinel {
    /// The literal line body, without terminator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quit => "#quit#",
            Self::Reset => "#reset#",
        }
    }

    /// Recognises a sentinel line, ignoring surrounding whitespace.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "#quit#" => Some(Self::Quit),
            "#reset#" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// Writes a sentinel line and flushes it.
///
/// # Errors
///
/// Returns any I/O error raised by the writer.
pub fn write_sentinel<W: Write + ?Sized>(writer: &mut W, sentinel: Sentinel) -> io::Result<()> {
    writer.write_all(sentinel.as_str().as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let body = line.strip_suffix(b"\n").unwrap_or(line);
    body.strip_suffix(b"\r").unwrap_or(body)
}

fn strip_length_header(mut blob: Vec<u8>) -> Vec<u8> {
    let Some(newline) = blob.iter().position(|byte| *byte == b'\n') else {
        return blob;
    };
    let body_len = blob.len() - newline - 1;
    let declared = blob.get(..newline).and_then(declared_length);
    if declared == Some(body_len) {
        blob.split_off(newline + 1)
    } else {
        blob
    }
}

fn declared_length(header: &[u8]) -> Option<usize> {
    if header.is_empty() || !header.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(header).ok()?.parse().ok()
}
