use std::io;
use std::str::Utf8Error;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::http::HttpError;

/// Errors raised while building or refreshing the name table.
#[derive(Debug, Error)]
pub enum NameTableError {
    /// A source file could not be read.
    #[error("failed to read name source '{path}': {source}")]
    Read {
        /// Source file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Fetching the remote feed failed.
    #[error("failed to fetch remote names: {source}")]
    Remote {
        /// Underlying HTTP error.
        #[source]
        source: HttpError,
    },
    /// The remote feed was not valid UTF-8.
    #[error("remote name feed is not valid UTF-8: {source}")]
    RemoteEncoding {
        /// Underlying decoding error.
        #[source]
        source: Utf8Error,
    },
}
