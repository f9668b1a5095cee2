//! Blocking HTTP fetches used by `http-get` and the remote name feed.
//!
//! The [`HttpFetcher`] trait is the seam between the daemon and the network.
//! Production code uses [`ReqwestFetcher`]; tests substitute doubles that count
//! invocations or return canned bodies.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use url::Url;

const HTTP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::http");

/// User agent sent with every outbound request.
const USER_AGENT: &str = concat!("xopend/", env!("CARGO_PKG_VERSION"));

/// Errors surfaced while fetching a URL.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The URL could not be parsed.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        /// Rejected URL text.
        url: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// The URL uses a scheme other than `http` or `https`.
    #[error("unsupported URL scheme '{scheme}' in '{url}'")]
    UnsupportedScheme {
        /// Rejected URL text.
        url: String,
        /// Scheme found in the URL.
        scheme: String,
    },
    /// Building the HTTP client failed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// Sending the request or reading the body failed.
    #[error("request to '{url}' failed: {source}")]
    Request {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Performs blocking HTTP GET requests.
#[cfg_attr(test, mockall::automock)]
pub trait HttpFetcher: Send + Sync {
    /// Fetches `url` and returns the raw response body, whatever the status.
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError>;
}

/// Parses `raw` and checks it names an `http` or `https` resource.
pub fn parse_http_url(raw: &str) -> Result<Url, HttpError> {
    let url = Url::parse(raw).map_err(|source| HttpError::InvalidUrl {
        url: raw.to_owned(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HttpError::UnsupportedScheme {
            url: raw.to_owned(),
            scheme: other.to_owned(),
        }),
    }
}

/// [`HttpFetcher`] backed by a pooled `reqwest` blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    /// Builds a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| HttpError::Client { source })?;
        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let parsed = parse_http_url(url)?;
        debug!(target: HTTP_TARGET, url = %parsed, "fetching");

        let response = self
            .client
            .get(parsed)
            .send()
            .map_err(|source| HttpError::Request {
                url: url.to_owned(),
                source: source.into(),
            })?;

        let status = response.status();
        debug!(target: HTTP_TARGET, url, status = status.as_u16(), "response received");

        response
            .bytes()
            .map(|body| body.to_vec())
            .map_err(|source| HttpError::Request {
                url: url.to_owned(),
                source: source.into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("http://example.com/a")]
    #[case("https://example.com/b?q=1")]
    fn accepts_http_schemes(#[case] raw: &str) {
        assert!(parse_http_url(raw).is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        let error = parse_http_url("file:///etc/passwd").expect_err("file scheme rejected");
        assert!(matches!(error, HttpError::UnsupportedScheme { ref scheme, .. } if scheme == "file"));
    }

    #[test]
    fn rejects_unparseable_urls() {
        let error = parse_http_url("not a url").expect_err("garbage rejected");
        assert!(matches!(error, HttpError::InvalidUrl { .. }));
    }

    /// Serves a single canned HTTP response and returns the base URL.
    fn serve_once(response: &'static str) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buffer = [0_u8; 1024];
            let _ = stream.read(&mut buffer).expect("read request");
            stream.write_all(response.as_bytes()).expect("write response");
        });
        (format!("http://{addr}/"), handle)
    }

    #[test]
    fn returns_body_on_success() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        );
        let fetcher = ReqwestFetcher::new(Duration::from_secs(5)).expect("client");

        let body = fetcher.get(&url).expect("fetch");

        assert_eq!(body, b"hello");
        server.join().expect("server join");
    }

    #[test]
    fn returns_body_for_error_status() {
        let (url, server) = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found",
        );
        let fetcher = ReqwestFetcher::new(Duration::from_secs(5)).expect("client");

        let body = fetcher.get(&url).expect("error statuses still yield a body");

        assert_eq!(body, b"not found");
        server.join().expect("server join");
    }
}
