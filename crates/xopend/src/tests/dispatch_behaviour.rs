//! Behavioural tests for cache-through dispatch over the wire.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::cache::ResultCache;
use crate::client;
use crate::http::HttpFetcher;
use crate::names::{NameTable, NameTableSettings};
use crate::server::{RunningServer, Server};
use crate::transport::SocketListener;

use super::support::{CountingFetcher, SourceFile, wait_until};

const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

struct DispatchWorld {
    source: SourceFile,
    fetcher: Arc<CountingFetcher>,
    running: Option<RunningServer>,
    replies: Vec<Vec<u8>>,
}

impl DispatchWorld {
    fn new() -> Self {
        Self {
            source: SourceFile::new("foo /home/user/docs/foo.pdf\n"),
            fetcher: Arc::new(CountingFetcher::default()),
            running: None,
            replies: Vec::new(),
        }
    }

    fn start(&mut self) {
        let settings =
            NameTableSettings::new(vec![self.source.path().clone()], 64, Duration::from_secs(60))
                .with_home(None);
        let names = NameTable::load(settings, None).expect("load name table");
        let cache = ResultCache::new(64, Duration::from_secs(60));
        let fetcher = Arc::clone(&self.fetcher) as Arc<dyn HttpFetcher>;
        let server = Server::new(names, cache, fetcher, EVICTION_INTERVAL).expect("build server");
        let listener = SocketListener::bind_loopback(0).expect("bind listener");
        self.running = Some(server.serve(listener).expect("serve"));
    }

    fn addr(&self) -> SocketAddr {
        self.running().local_addr()
    }

    fn running(&self) -> &RunningServer {
        self.running.as_ref().expect("daemon should be running")
    }

    fn send(&mut self, content: &[u8]) {
        let reply = client::netcat(self.addr(), content);
        self.replies.push(reply);
    }

    fn last_reply(&self) -> &[u8] {
        self.replies.last().map(Vec::as_slice).unwrap_or_default()
    }
}

impl Drop for DispatchWorld {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown();
        }
    }
}

#[fixture]
fn world() -> RefCell<DispatchWorld> {
    RefCell::new(DispatchWorld::new())
}

#[given("a running daemon")]
fn given_running_daemon(world: &RefCell<DispatchWorld>) {
    world.borrow_mut().start();
}

#[given(r#"the URL "{url}" serves "{body}""#)]
fn given_url_serves(world: &RefCell<DispatchWorld>, url: String, body: String) {
    world.borrow().fetcher.serve(&url, body.as_bytes());
}

#[given(r#"the name source now reads "{line}""#)]
fn given_source_rewritten(world: &RefCell<DispatchWorld>, line: String) {
    world.borrow().source.rewrite(&format!("{line}\n"));
}

#[when(r#"a client sends "{content}""#)]
fn when_client_sends(world: &RefCell<DispatchWorld>, content: String) {
    world.borrow_mut().send(content.as_bytes());
}

#[when(r#"a client fetches "{url}" twice"#)]
fn when_client_fetches_twice(world: &RefCell<DispatchWorld>, url: String) {
    let mut world = world.borrow_mut();
    for _ in 0..2 {
        let reply = client::request(world.addr(), "http-get", &url);
        world.replies.push(reply);
    }
}

#[then(r#"the reply starts with "{prefix}""#)]
fn then_reply_starts_with(world: &RefCell<DispatchWorld>, prefix: String) {
    let world = world.borrow();
    let reply = String::from_utf8_lossy(world.last_reply());
    assert!(reply.starts_with(&prefix), "unexpected reply {reply:?}");
}

#[then("a second version reply is identical")]
fn then_version_stable(world: &RefCell<DispatchWorld>) {
    let mut world = world.borrow_mut();
    let first = world.last_reply().to_vec();
    world.send(b"#version");
    assert_eq!(world.last_reply(), first.as_slice());
}

#[then("the reply is empty")]
fn then_reply_empty(world: &RefCell<DispatchWorld>) {
    let world = world.borrow();
    assert!(
        world.last_reply().is_empty(),
        "expected empty reply, got {:?}",
        String::from_utf8_lossy(world.last_reply())
    );
}

#[then("the daemon still answers version")]
fn then_daemon_answers(world: &RefCell<DispatchWorld>) {
    assert!(client::check_server(world.borrow().addr()));
}

#[then(r#"both replies are "{body}""#)]
fn then_both_replies(world: &RefCell<DispatchWorld>, body: String) {
    let world = world.borrow();
    assert_eq!(world.replies.len(), 2);
    for reply in &world.replies {
        assert_eq!(reply.as_slice(), body.as_bytes());
    }
}

#[then(r#"the URL "{url}" was fetched once"#)]
fn then_fetched_once(world: &RefCell<DispatchWorld>, url: String) {
    assert_eq!(world.borrow().fetcher.calls_for(&url), 1);
}

#[then(r#"the name table eventually resolves "{key}" to "{value}""#)]
fn then_eventually_resolves(world: &RefCell<DispatchWorld>, key: String, value: String) {
    let world = world.borrow();
    let names = Arc::clone(world.running().names());
    assert!(
        wait_until(|| names.lookup(&key).as_deref() == Some(value.as_str())),
        "reload never exposed {key}"
    );
}

#[then(r#"the name table no longer resolves "{key}""#)]
fn then_no_longer_resolves(world: &RefCell<DispatchWorld>, key: String) {
    assert_eq!(world.borrow().running().names().lookup(&key), None);
}

#[scenario(
    path = "tests/features/cache_through.feature",
    name = "Version replies carry a stable prefix"
)]
fn version_prefix_is_stable(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/cache_through.feature",
    name = "Unknown verbs yield an empty reply"
)]
fn unknown_verb_yields_empty_reply(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/cache_through.feature",
    name = "Fetched pages are served from the cache"
)]
fn fetched_pages_are_cached(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/cache_through.feature",
    name = "Failed fetches are memoised"
)]
fn failed_fetches_are_memoised(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/cache_through.feature",
    name = "Reload picks up edited sources"
)]
fn reload_picks_up_edits(world: RefCell<DispatchWorld>) {
    drop(world);
}
