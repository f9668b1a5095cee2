//! Request dispatch for the resolution daemon.
//!
//! A connection carries exactly one request: a verb, optionally followed by a
//! space and a payload. The reply is the raw outcome bytes, and end of stream
//! marks its end.
//!
//! ```text
//! client: http-get https://example.com/page<EOF>
//! daemon: <page body><EOF>
//! ```
//!
//! ## Verbs
//!
//! - `version`: the identifying version string.
//! - `reload`: schedule a name table re-read; replies empty immediately.
//! - `update`: schedule a remote name refresh; replies empty immediately.
//! - `http-get <url>`: the body of `url`, memoised in the result cache.
//!
//! Unknown verbs go to the configured [`Fallback`]. An empty reply means the
//! request failed or produced nothing.

mod dispatcher;
mod errors;
mod fallback;
mod handler;
mod outcome;
mod request;
mod verb;

pub use self::dispatcher::Dispatcher;
pub use self::errors::DispatchError;
pub use self::fallback::{Fallback, NoFallback};
pub use self::handler::DispatchConnectionHandler;
pub use self::outcome::Outcome;
pub use self::request::Request;
pub use self::verb::Verb;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
