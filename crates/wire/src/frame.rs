// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! STX/ETX/LRC frame codec.
//!
//! The codec is stream-oriented: callers append arbitrarily chunked reads
//! to a [`FrameBuffer`] and drain zero or more complete frames per call.

use thiserror::Error;

/// Start-of-frame byte.
pub const STX: u8 = 0x02;
/// End-of-payload byte.
pub const ETX: u8 = 0x03;
/// Field separator inside the payload.
pub const SEP: u8 = b'#';

/// Cap on buffered bytes for one connection. A peer that streams this much
/// without ever completing a frame is not speaking the protocol.
pub const MAX_BUFFER: usize = 64 * 1024;

/// Framing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("LRC mismatch: computed {computed:#04x}, received {received:#04x}")]
    LrcMismatch { computed: u8, received: u8 },

    #[error("frame payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("receive buffer exceeded {0} bytes without a complete frame")]
    Overflow(usize),
}

/// XOR of all bytes.
pub fn lrc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Encode a field list into one frame.
///
/// Fields must not contain `#`, STX, or ETX; ids arriving off the wire
/// cannot contain them (the scan would have split the frame differently),
/// and protocol-generated fields never do.
pub fn encode<S: AsRef<str>>(fields: &[S]) -> Vec<u8> {
    let payload: Vec<&str> = fields.iter().map(AsRef::as_ref).collect();
    let payload = payload.join("#");
    debug_assert!(
        !payload.bytes().any(|b| b == STX || b == ETX),
        "frame field contains a framing byte",
    );

    let mut out = Vec::with_capacity(payload.len() + 3);
    out.push(STX);
    out.extend_from_slice(payload.as_bytes());
    out.push(ETX);
    let check = lrc(&out);
    out.push(check);
    out
}

/// One outcome from draining the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drained {
    /// A complete, checksum-valid frame, split into fields.
    Frame(Vec<String>),
    /// A structurally complete frame that failed validation. Its bytes were
    /// discarded so the stream can resynchronize on the next STX.
    Corrupt(FrameError),
}

/// Receive buffer for one connection.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Extract every complete frame currently buffered, in order.
    ///
    /// Partial trailing data is retained for the next read. Bytes before an
    /// STX can never become part of a frame and are dropped. The only hard
    /// error is [`FrameError::Overflow`]; the caller should drop the
    /// connection on it.
    pub fn drain(&mut self) -> Result<Vec<Drained>, FrameError> {
        let mut out = Vec::new();

        loop {
            // Drop junk ahead of the first STX.
            match self.buf.iter().position(|&b| b == STX) {
                Some(0) => {}
                Some(start) => {
                    self.buf.drain(..start);
                }
                None => {
                    self.buf.clear();
                    break;
                }
            }

            // Need an ETX at offset >= 1 and one LRC byte after it.
            let Some(etx) = self.buf[1..].iter().position(|&b| b == ETX).map(|p| p + 1) else {
                break;
            };
            if etx + 1 >= self.buf.len() {
                break;
            }

            let computed = lrc(&self.buf[..=etx]);
            let received = self.buf[etx + 1];
            let item = if computed != received {
                Drained::Corrupt(FrameError::LrcMismatch { computed, received })
            } else {
                match std::str::from_utf8(&self.buf[1..etx]) {
                    Ok(payload) => {
                        Drained::Frame(payload.split('#').map(str::to_string).collect())
                    }
                    Err(_) => Drained::Corrupt(FrameError::InvalidUtf8),
                }
            };
            self.buf.drain(..=etx + 1);
            out.push(item);
        }

        if self.buf.len() > MAX_BUFFER {
            return Err(FrameError::Overflow(MAX_BUFFER));
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
