//! Request decoding for the dispatch loop.
//!
//! A request is the whole byte stream a client sent before half-closing its
//! side of the connection. The verb runs up to the first space or newline and
//! the payload is everything after that delimiter.

use super::errors::DispatchError;

/// Verb and payload decoded from one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    verb: Vec<u8>,
    payload: Vec<u8>,
}

impl Request {
    /// Builds a request from its parts.
    pub fn new(verb: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            verb: verb.into(),
            payload: payload.into(),
        }
    }

    /// Splits raw request bytes into verb and payload.
    ///
    /// Trailing line endings (`\r` and `\n`), such as the newline some clients
    /// append, are trimmed before splitting. Other trailing whitespace belongs
    /// to the payload. A single leading `#` on the verb is the client-side
    /// marker for a daemon command and is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EmptyRequest`] when nothing but whitespace
    /// was received.
    pub fn parse(raw: &[u8]) -> Result<Self, DispatchError> {
        let trimmed = trim_line_endings(raw);
        if trimmed.iter().all(u8::is_ascii_whitespace) {
            return Err(DispatchError::EmptyRequest);
        }

        let (verb, payload) = match trimmed.iter().position(|byte| matches!(byte, b' ' | b'\n')) {
            Some(split) => (&trimmed[..split], &trimmed[split + 1..]),
            None => (trimmed, &[][..]),
        };
        let verb = verb.strip_prefix(b"#").unwrap_or(verb);
        Ok(Self::new(verb, payload))
    }

    /// Raw verb bytes.
    pub fn verb(&self) -> &[u8] {
        &self.verb
    }

    /// Raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Result cache key: verb, a colon, then the payload.
    pub fn cache_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.verb.len() + 1 + self.payload.len());
        key.extend_from_slice(&self.verb);
        key.push(b':');
        key.extend_from_slice(&self.payload);
        key
    }
}

/// Trims trailing `\r` and `\n` bytes.
fn trim_line_endings(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|byte| !matches!(byte, b'\r' | b'\n'))
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}
