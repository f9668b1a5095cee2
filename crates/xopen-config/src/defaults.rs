use std::env;

use crate::logging::LogFormat;

/// Loopback host the daemon binds to and clients connect to.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Port used when `XOPEN_PORT` is unset or unusable.
pub const DEFAULT_PORT: u16 = 18831;

/// Environment variable overriding the daemon port.
pub const PORT_ENV_VAR: &str = "XOPEN_PORT";

/// Default capacity of the result cache and remote name overlay.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default lifetime of a memoised result.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;

/// Default lifetime of a remotely fetched name entry.
pub const DEFAULT_REMOTE_TTL_SECS: u64 = 24 * 60 * 60;

/// Default pause between eviction sweeps.
pub const DEFAULT_EVICTION_INTERVAL_SECS: u64 = 5;

/// Default timeout for outbound HTTP requests.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

pub(crate) const fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

pub(crate) const fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

pub(crate) const fn default_remote_ttl_secs() -> u64 {
    DEFAULT_REMOTE_TTL_SECS
}

pub(crate) const fn default_eviction_interval_secs() -> u64 {
    DEFAULT_EVICTION_INTERVAL_SECS
}

pub(crate) const fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Reads the daemon port from `XOPEN_PORT`.
///
/// Falls back to [`DEFAULT_PORT`] when the variable is unset, is not valid
/// Unicode, or does not parse as a port number.
#[must_use]
pub fn port_from_env() -> u16 {
    parse_port(env::var(PORT_ENV_VAR).ok().as_deref())
}

/// Parses an optional textual port, falling back to [`DEFAULT_PORT`].
///
/// Surrounding whitespace is ignored. Values outside the `u16` range are
/// treated like any other non-integer value.
#[must_use]
pub fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::unset(None, DEFAULT_PORT)]
    #[case::valid(Some("9000"), 9000)]
    #[case::padded(Some(" 9001\n"), 9001)]
    #[case::not_a_number(Some("abc"), DEFAULT_PORT)]
    #[case::empty(Some(""), DEFAULT_PORT)]
    #[case::out_of_range(Some("70000"), DEFAULT_PORT)]
    #[case::negative(Some("-1"), DEFAULT_PORT)]
    fn parses_port_leniently(#[case] raw: Option<&str>, #[case] expected: u16) {
        assert_eq!(parse_port(raw), expected);
    }
}
