//! Short-name table consulted by the resolution verbs.

mod errors;
mod parser;
mod remote;
mod table;

pub use errors::NameTableError;
pub use remote::{HttpFeed, RemoteFeed};
pub use table::{NameSnapshot, NameTable, NameTableSettings};

pub(crate) const NAMES_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::names");
