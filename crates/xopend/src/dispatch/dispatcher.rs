//! Verb routing with cache-through for memoised verbs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use crate::cache::ResultCache;
use crate::http::HttpFetcher;
use crate::names::NameTable;
use crate::pool::{PoolHandle, panic_message};
use crate::version_string;

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::fallback::{Fallback, NoFallback};
use super::outcome::Outcome;
use super::request::Request;
use super::verb::Verb;

/// Routes requests to verb handlers.
///
/// Cacheable verbs consult the [`ResultCache`] first and memoise whatever the
/// handler produced, failures included, so a failing URL is not refetched
/// until the entry is evicted.
pub struct Dispatcher {
    cache: Arc<ResultCache>,
    names: Arc<NameTable>,
    tasks: PoolHandle,
    fetcher: Arc<dyn HttpFetcher>,
    fallback: Arc<dyn Fallback>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cache", &self.cache)
            .field("names", &self.names)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with no fallback for unknown verbs.
    pub fn new(
        cache: Arc<ResultCache>,
        names: Arc<NameTable>,
        tasks: PoolHandle,
        fetcher: Arc<dyn HttpFetcher>,
    ) -> Self {
        Self {
            cache,
            names,
            tasks,
            fetcher,
            fallback: Arc::new(NoFallback),
        }
    }

    /// Replaces the handler for unknown verbs.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn Fallback>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Executes `request` and returns its outcome.
    ///
    /// Never panics: handler errors and panics are logged and reported as
    /// [`Outcome::Failure`].
    pub fn execute(&self, request: &Request) -> Outcome {
        match Verb::decode(request.verb()) {
            Some(verb) if verb.is_cacheable() => self.execute_cached(verb, request),
            Some(verb) => guarded(verb.as_str(), || {
                self.run(verb, request.payload()).map(Outcome::Success)
            }),
            None => guarded("fallback", || {
                Ok(self.fallback.execute(request.verb(), request.payload()))
            }),
        }
    }

    fn execute_cached(&self, verb: Verb, request: &Request) -> Outcome {
        let key = request.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            debug!(target: DISPATCH_TARGET, %verb, failure = hit.is_failure(), "cache hit");
            return hit;
        }
        let outcome = guarded(verb.as_str(), || {
            self.run(verb, request.payload()).map(Outcome::Success)
        });
        self.cache.insert(key, outcome.clone());
        outcome
    }

    fn run(&self, verb: Verb, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
        match verb {
            Verb::Version => Ok(version_string().into_bytes()),
            Verb::Reload => {
                let names = Arc::clone(&self.names);
                self.tasks.submit("reload", move || names.reload())?;
                Ok(Vec::new())
            }
            Verb::Update => {
                let names = Arc::clone(&self.names);
                self.tasks.submit("update", move || names.update())?;
                Ok(Vec::new())
            }
            Verb::HttpGet => {
                let url = std::str::from_utf8(payload)?.trim();
                if url.is_empty() {
                    return Err(DispatchError::MissingPayload {
                        verb: verb.as_str(),
                    });
                }
                Ok(self.fetcher.get(url)?)
            }
        }
    }
}

/// Runs `handler`, converting errors and panics into a logged failure.
fn guarded<F>(label: &'static str, handler: F) -> Outcome
where
    F: FnOnce() -> Result<Outcome, DispatchError>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(handler)).unwrap_or_else(|payload| {
        Err(DispatchError::Panic {
            message: panic_message(payload.as_ref()),
        })
    });
    match result {
        Ok(outcome) => outcome,
        Err(failure) => {
            error!(
                target: DISPATCH_TARGET,
                verb = label,
                error = %failure,
                "verb failed"
            );
            Outcome::Failure
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::http::{HttpError, MockHttpFetcher};
    use crate::names::NameTableSettings;
    use crate::pool::WorkerPool;

    struct Harness {
        _dir: TempDir,
        source: Utf8PathBuf,
        cache: Arc<ResultCache>,
        names: Arc<NameTable>,
        pool: WorkerPool,
    }

    impl Harness {
        fn dispatcher(&self, fetcher: MockHttpFetcher) -> Dispatcher {
            Dispatcher::new(
                Arc::clone(&self.cache),
                Arc::clone(&self.names),
                self.pool.handle(),
                Arc::new(fetcher),
            )
        }
    }

    #[fixture]
    fn harness() -> Harness {
        let dir = TempDir::new().expect("temp dir");
        let source = Utf8PathBuf::from_path_buf(dir.path().join("xopen.txt")).expect("utf8 path");
        fs::write(&source, "foo /old/foo.pdf\n").expect("write source");
        let settings = NameTableSettings::new(vec![source.clone()], 8, Duration::from_secs(60));
        Harness {
            _dir: dir,
            source,
            cache: Arc::new(ResultCache::new(8, Duration::from_secs(60))),
            names: Arc::new(NameTable::load(settings, None).expect("load names")),
            pool: WorkerPool::new(1).expect("pool"),
        }
    }

    fn refused(url: &str) -> HttpError {
        HttpError::Request {
            url: url.to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into(),
        }
    }

    #[rstest]
    fn version_is_stable(harness: Harness) {
        let dispatcher = harness.dispatcher(MockHttpFetcher::new());
        let first = dispatcher.execute(&Request::new("version", ""));
        let second = dispatcher.execute(&Request::new("version", "ignored"));

        assert!(first.as_bytes().starts_with(b"joker-xopen=="));
        assert_eq!(first, second);
        assert!(harness.cache.is_empty(), "version is not memoised");
    }

    #[rstest]
    fn http_get_is_fetched_once(harness: Harness) {
        let mut fetcher = MockHttpFetcher::new();
        fetcher
            .expect_get()
            .withf(|url| url == "https://example.com/a")
            .times(1)
            .returning(|_| Ok(b"body".to_vec()));
        let dispatcher = harness.dispatcher(fetcher);
        let request = Request::new("http-get", "https://example.com/a");

        let first = dispatcher.execute(&request);
        let second = dispatcher.execute(&request);

        assert_eq!(first, Outcome::Success(b"body".to_vec()));
        assert_eq!(first, second);
        assert_eq!(harness.cache.len(), 1);
    }

    #[rstest]
    fn failed_fetch_is_memoised(harness: Harness) {
        let mut fetcher = MockHttpFetcher::new();
        fetcher
            .expect_get()
            .times(1)
            .returning(|url| Err(refused(url)));
        let dispatcher = harness.dispatcher(fetcher);
        let request = Request::new("http-get", "https://example.com/missing");

        assert_eq!(dispatcher.execute(&request), Outcome::Failure);
        assert_eq!(dispatcher.execute(&request), Outcome::Failure);
        assert_eq!(
            harness.cache.get(&request.cache_key()),
            Some(Outcome::Failure)
        );
    }

    #[rstest]
    fn panicking_fetch_becomes_failure(harness: Harness) {
        let mut fetcher = MockHttpFetcher::new();
        fetcher
            .expect_get()
            .times(1)
            .returning(|_| panic!("fetcher exploded"));
        let dispatcher = harness.dispatcher(fetcher);

        let outcome = dispatcher.execute(&Request::new("http-get", "https://example.com"));

        assert_eq!(outcome, Outcome::Failure);
    }

    #[rstest]
    fn http_get_without_url_fails(harness: Harness) {
        let dispatcher = harness.dispatcher(MockHttpFetcher::new());
        assert_eq!(
            dispatcher.execute(&Request::new("http-get", "")),
            Outcome::Failure
        );
    }

    #[rstest]
    fn unknown_verb_uses_fallback(harness: Harness) {
        struct Echo;

        impl Fallback for Echo {
            fn execute(&self, verb: &[u8], payload: &[u8]) -> Outcome {
                Outcome::Success([verb, payload].concat())
            }
        }

        let dispatcher = harness.dispatcher(MockHttpFetcher::new());
        assert_eq!(
            dispatcher.execute(&Request::new("xyz", "")),
            Outcome::Failure
        );

        let dispatcher = dispatcher.with_fallback(Arc::new(Echo));
        assert_eq!(
            dispatcher.execute(&Request::new("ab", "cd")),
            Outcome::Success(b"abcd".to_vec())
        );
    }

    #[rstest]
    fn reload_runs_in_background(harness: Harness) {
        let dispatcher = harness.dispatcher(MockHttpFetcher::new());
        fs::write(&harness.source, "foo /new/foo.pdf\n").expect("rewrite source");

        let outcome = dispatcher.execute(&Request::new("reload", ""));
        let Harness { names, pool, .. } = harness;
        pool.shutdown().expect("drain pool");

        assert_eq!(outcome, Outcome::empty());
        assert_eq!(names.lookup("foo").as_deref(), Some("/new/foo.pdf"));
    }

    #[rstest]
    fn reload_after_pool_shutdown_fails(harness: Harness) {
        let Harness {
            _dir,
            cache,
            names,
            pool,
            ..
        } = harness;
        let dispatcher = Dispatcher::new(
            cache,
            names,
            pool.handle(),
            Arc::new(MockHttpFetcher::new()),
        );
        pool.shutdown().expect("shutdown");

        assert_eq!(
            dispatcher.execute(&Request::new("reload", "")),
            Outcome::Failure
        );
    }

    #[test]
    fn failure_message_names_the_cause_once() {
        let io = DispatchError::Io(std::io::Error::other("disk gone"));
        assert_eq!(io.to_string(), "IO error: disk gone");

        let http = DispatchError::Http(refused("https://example.com"));
        let rendered = http.to_string();
        assert!(rendered.starts_with("request to 'https://example.com' failed: "));
        assert_eq!(rendered.matches("https://example.com").count(), 1);
    }
}
