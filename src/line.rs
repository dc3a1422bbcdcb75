//! Line-based codec for tokio.
//!
//! Inbound lines are delimited by `\n`. The delimiter is stripped but a
//! trailing `\r` is left in place; the classifier is responsible for
//! tolerating it. Outbound lines are terminated with `\r\n`.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use crate::error::{self, ProtocolError};

/// Maximum accepted line length, including the terminator.
pub const MAX_LINE_LEN: usize = 8191;

/// Newline-framed codec.
///
/// Oversize inbound lines are discarded up to the next newline rather than
/// surfaced as errors, since a decode error terminates a `Framed` stream.
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
    /// Dropping bytes until the next newline
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default maximum line length.
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    /// Create a codec with a custom maximum line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }

    /// Sanitize an outgoing line: cut at the first embedded line ending.
    pub fn sanitize(line: &str) -> &str {
        match line.find(['\r', '\n']) {
            Some(pos) => &line[..pos],
            None => line,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                self.next_index = src.len();
                if src.len() > self.max_len {
                    if !self.discarding {
                        warn!(len = src.len(), "discarding oversize inbound line");
                    }
                    self.discarding = true;
                    src.clear();
                    self.next_index = 0;
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding || line.len() > self.max_len {
                if !self.discarding {
                    warn!(len = line.len(), "discarding oversize inbound line");
                }
                self.discarding = false;
                continue;
            }

            let body = &line[..line.len() - 1];
            return Ok(Some(String::from_utf8_lossy(body).into_owned()));
        }
    }

    /// An unterminated tail at end of stream is dropped.
    fn decode_eof(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            debug!(len = src.len(), "dropping unterminated line at end of stream");
            src.clear();
        }
        self.next_index = 0;
        self.discarding = false;
        Ok(None)
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> error::Result<()> {
        let line = Self::sanitize(&line);
        if line.len() + 2 > self.max_len {
            return Err(ProtocolError::LineTooLong {
                actual: line.len() + 2,
                limit: self.max_len,
            });
        }

        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
