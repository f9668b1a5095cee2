//! Remote authoritative source consulted by `update`.

use std::sync::Arc;

use url::Url;

use crate::http::{HttpError, HttpFetcher};

/// Source of name entries fetched from outside the local files.
///
/// The body uses the same line grammar as the local source files.
pub trait RemoteFeed: Send + Sync {
    /// Fetches the raw feed body.
    fn fetch(&self) -> Result<Vec<u8>, HttpError>;

    /// Human-readable location used in logs.
    fn location(&self) -> String;
}

/// Feed served over HTTP.
pub struct HttpFeed {
    url: Url,
    fetcher: Arc<dyn HttpFetcher>,
}

impl HttpFeed {
    /// Creates a feed reading `url` through `fetcher`.
    pub fn new(url: Url, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { url, fetcher }
    }
}

impl RemoteFeed for HttpFeed {
    fn fetch(&self) -> Result<Vec<u8>, HttpError> {
        self.fetcher.get(self.url.as_str())
    }

    fn location(&self) -> String {
        self.url.to_string()
    }
}
