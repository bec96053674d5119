//! Framed request/response exchange over a reader/writer pair.

use std::io::{BufRead, Write};

use crate::error::TransportError;
use crate::frame::{self, Sentinel};

/// The emulator's stdout (reader) and stdin (writer) as one duplex channel.
///
/// Generic so the exchange can be exercised against in-memory buffers.
pub(crate) struct StdioPipe<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> StdioPipe<R, W> {
    pub(crate) const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: BufRead, W: Write> StdioPipe<R, W> {
    /// Writes one framed message and blocks until one framed reply arrives.
    pub(crate) fn exchange(&mut self, message: &[u8]) -> Result<Vec<u8>, TransportError> {
        frame::write_frame(&mut self.writer, message).map_err(TransportError::io)?;
        Ok(frame::read_frame(&mut self.reader)?)
    }

    /// Writes a raw control line. No reply is expected.
    pub(crate) fn send_sentinel(&mut self, sentinel: Sentinel) -> Result<(), TransportError> {
        frame::write_sentinel(&mut self.writer, sentinel).map_err(TransportError::io)
    }
}
