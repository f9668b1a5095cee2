//! Error types for request decoding and verb execution.

use std::io;
use std::str::Utf8Error;

use thiserror::Error;

use crate::http::HttpError;
use crate::pool::PoolError;

/// Errors surfaced while decoding a request or running a verb.
///
/// None of these reach the client as such: the wire protocol has no error
/// channel, so every failure becomes an empty response after being logged.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The client sent nothing but whitespace.
    #[error("empty request")]
    EmptyRequest,

    /// The request exceeded the read limit.
    #[error("request too large: more than {max_size} bytes")]
    RequestTooLarge {
        /// Read ceiling in bytes.
        max_size: usize,
    },

    /// IO error while reading the request or writing the response.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The verb needs a payload and none was given.
    #[error("verb '{verb}' requires a payload")]
    MissingPayload {
        /// Wire name of the verb.
        verb: &'static str,
    },

    /// The payload was not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    PayloadEncoding(#[from] Utf8Error),

    /// An outbound HTTP request failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The worker pool refused a background task.
    #[error("failed to schedule background task: {0}")]
    Schedule(#[from] PoolError),

    /// A handler panicked.
    #[error("handler panicked: {message}")]
    Panic {
        /// Panic payload rendered as text.
        message: String,
    },
}
