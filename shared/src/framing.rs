//! Newline framing over a byte stream.
//!
//! Reads from a stream socket can end anywhere: in the middle of a message,
//! in the middle of a multi-byte character, or after several messages at
//! once. `LineBuffer` keeps the unterminated tail between reads and only
//! releases complete messages, in arrival order, with the terminator removed.

use thiserror::Error;

/// Upper bound on buffered bytes that have not yet seen a terminator.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("unterminated message exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    limit: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_limit(MAX_PENDING_BYTES)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    /// Appends freshly read bytes and returns every message completed by
    /// them. A trailing `\r` before the terminator is dropped as well.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, FrameError> {
        self.pending.extend_from_slice(bytes);

        let mut messages = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let mut line = &self.pending[start..end];
            if let Some((&b'\r', rest)) = line.split_last() {
                line = rest;
            }
            messages.push(String::from_utf8_lossy(line).into_owned());
            start = end + 1;
        }
        self.pending.drain(..start);

        if self.pending.len() > self.limit {
            self.pending.clear();
            return Err(FrameError::LineTooLong { limit: self.limit });
        }

        Ok(messages)
    }

    /// Bytes received since the last terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
