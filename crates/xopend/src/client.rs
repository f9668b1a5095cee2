//! Client side of the daemon wire protocol.
//!
//! Every helper swallows connection errors and reports them as an empty
//! reply, mirroring how the daemon itself reports failures. Callers that need
//! to distinguish "daemon missing" from "request failed" use
//! [`check_server`] first.

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use xopen_config::port_from_env;

use crate::VERSION_PREFIX;

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Largest reply a client reads.
pub const MAX_REPLY_BYTES: u64 = 64 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Loopback address of the daemon, honouring `XOPEN_PORT`.
#[must_use]
pub fn daemon_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port_from_env()))
}

/// Sends `content`, half-closes, and returns everything the daemon replies.
///
/// Any connection or IO failure yields an empty reply.
#[must_use]
pub fn netcat(addr: SocketAddr, content: &[u8]) -> Vec<u8> {
    match exchange(addr, content) {
        Ok(reply) => reply,
        Err(error) => {
            debug!(target: CLIENT_TARGET, %addr, %error, "request failed");
            Vec::new()
        }
    }
}

/// Sends `#<verb> <payload>` (or `#<verb>` with an empty payload).
#[must_use]
pub fn request(addr: SocketAddr, verb: &str, payload: &str) -> Vec<u8> {
    netcat(addr, &encode(verb, payload))
}

/// Returns true when a daemon answers `version` at `addr`.
#[must_use]
pub fn check_server(addr: SocketAddr) -> bool {
    request(addr, "version", "").starts_with(VERSION_PREFIX.as_bytes())
}

fn encode(verb: &str, payload: &str) -> Vec<u8> {
    let mut line = format!("#{verb}");
    if !payload.is_empty() {
        line.push(' ');
        line.push_str(payload);
    }
    line.into_bytes()
}

fn exchange(addr: SocketAddr, content: &[u8]) -> io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;
    stream.write_all(content)?;
    stream.shutdown(Shutdown::Write)?;
    let mut reply = Vec::new();
    stream.take(MAX_REPLY_BYTES).read_to_end(&mut reply)?;
    Ok(reply)
}
