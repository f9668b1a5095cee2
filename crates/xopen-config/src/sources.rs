//! Discovers the default name table source files.
//!
//! When no sources are configured the daemon reads every `*.txt` file under
//! the per-user configuration directory (`<config dir>/xopen`). The directory
//! and an empty `xopen.txt` are created on first use so a fresh installation
//! starts with an empty, editable table instead of failing.

use std::fs::{self, OpenOptions};
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// File created when the source directory holds no table yet.
pub const DEFAULT_SOURCE_FILE: &str = "xopen.txt";

/// Extension identifying name table source files.
pub const SOURCE_EXTENSION: &str = "txt";

const SOURCE_SUBDIR: &str = "xopen";

/// Errors raised while discovering default source files.
#[derive(Debug, Error)]
pub enum SourceDiscoveryError {
    /// The platform exposes no per-user configuration directory.
    #[error("no per-user configuration directory is available")]
    MissingConfigDir,
    /// The configuration directory path is not valid UTF-8.
    #[error("configuration directory '{path}' is not valid UTF-8")]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },
    /// Creating the source directory or default file failed.
    #[error("failed to prepare source directory '{path}': {source}")]
    Prepare {
        /// Path that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Listing the source directory failed.
    #[error("failed to list source directory '{path}': {source}")]
    List {
        /// Directory being listed.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Directory holding the default source files.
pub fn default_source_dir() -> Result<Utf8PathBuf, SourceDiscoveryError> {
    let base = dirs::config_dir().ok_or(SourceDiscoveryError::MissingConfigDir)?;
    let base = Utf8PathBuf::from_path_buf(base).map_err(|path| SourceDiscoveryError::NonUtf8Path {
        path: path.display().to_string(),
    })?;
    Ok(base.join(SOURCE_SUBDIR))
}

/// Resolves the default source files, creating the directory if required.
pub fn default_source_paths() -> Result<Vec<Utf8PathBuf>, SourceDiscoveryError> {
    discover_sources_in(&default_source_dir()?)
}

/// Lists `*.txt` files in `dir`, creating `dir` and an empty default file
/// when they are missing.
///
/// Paths are returned sorted so merge order is stable between runs.
pub fn discover_sources_in(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, SourceDiscoveryError> {
    fs::create_dir_all(dir).map_err(|source| SourceDiscoveryError::Prepare {
        path: dir.to_path_buf(),
        source,
    })?;

    let default_file = dir.join(DEFAULT_SOURCE_FILE);
    if !default_file.exists() {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&default_file)
            .map_err(|source| SourceDiscoveryError::Prepare {
                path: default_file.clone(),
                source,
            })?;
    }

    let entries = dir
        .read_dir_utf8()
        .map_err(|source| SourceDiscoveryError::List {
            path: dir.to_path_buf(),
            source,
        })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SourceDiscoveryError::List {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension() == Some(SOURCE_EXTENSION) && path.is_file() {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();
    Ok(paths)
}
