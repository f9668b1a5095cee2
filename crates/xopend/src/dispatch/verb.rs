//! Closed set of verbs understood by the daemon.

use std::fmt;

/// A verb the daemon handles itself.
///
/// Requests naming any other verb are handed to the configured
/// [`Fallback`](super::Fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Report the daemon's identifying version string.
    Version,
    /// Schedule a re-read of the name table sources.
    Reload,
    /// Schedule a refresh of the name table from the remote feed.
    Update,
    /// Fetch a URL and return its body.
    HttpGet,
}

impl Verb {
    /// Every verb, in wire-name order.
    pub const ALL: [Self; 4] = [Self::HttpGet, Self::Reload, Self::Update, Self::Version];

    /// Matches the raw verb bytes of a request.
    #[must_use]
    pub fn decode(raw: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str().as_bytes() == raw)
    }

    /// Wire name of the verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Reload => "reload",
            Self::Update => "update",
            Self::HttpGet => "http-get",
        }
    }

    /// Returns true when results are memoised in the result cache.
    #[must_use]
    pub const fn is_cacheable(self) -> bool {
        matches!(self, Self::HttpGet)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(b"version", Some(Verb::Version))]
    #[case(b"reload", Some(Verb::Reload))]
    #[case(b"update", Some(Verb::Update))]
    #[case(b"http-get", Some(Verb::HttpGet))]
    #[case(b"VERSION", None)]
    #[case(b"request", None)]
    #[case(b"", None)]
    fn decodes_wire_names(#[case] raw: &[u8], #[case] expected: Option<Verb>) {
        assert_eq!(Verb::decode(raw), expected);
    }

    #[test]
    fn only_http_get_is_cacheable() {
        let cacheable: Vec<Verb> = Verb::ALL
            .into_iter()
            .filter(|verb| verb.is_cacheable())
            .collect();
        assert_eq!(cacheable, vec![Verb::HttpGet]);
    }
}
