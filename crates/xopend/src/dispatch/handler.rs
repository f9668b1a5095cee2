//! Connection handler that runs one request per connection.
//!
//! The client writes its request and half-closes the connection. The handler
//! reads to end of stream, dispatches, writes the reply bytes, and closes.
//! Nothing but the reply bytes is ever written: failures of any kind reach
//! the client as an empty reply.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::transport::ConnectionHandler;

use super::DISPATCH_TARGET;
use super::dispatcher::Dispatcher;
use super::errors::DispatchError;
use super::request::Request;

/// Maximum size of a single request in bytes.
pub(crate) const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// How long a client may stall before its request is abandoned.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection handler that parses requests and writes verb outcomes.
#[derive(Debug)]
pub struct DispatchConnectionHandler {
    dispatcher: Arc<Dispatcher>,
}

impl DispatchConnectionHandler {
    /// Creates a handler routing requests through `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    fn dispatch(&self, stream: &mut TcpStream) -> Result<(), DispatchError> {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let raw = read_request(stream)?;
        let request = Request::parse(&raw)?;
        debug!(
            target: DISPATCH_TARGET,
            verb = %String::from_utf8_lossy(request.verb()),
            payload_bytes = request.payload().len(),
            "dispatching request"
        );
        let outcome = self.dispatcher.execute(&request);
        stream.write_all(outcome.as_bytes())?;
        stream.flush()?;
        Ok(())
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, mut stream: TcpStream) {
        match self.dispatch(&mut stream) {
            Ok(()) => {}
            Err(DispatchError::EmptyRequest) => {
                debug!(target: DISPATCH_TARGET, "client disconnected without request");
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "request failed");
            }
        }
        // The peer may already be gone; closing is best effort.
        let _ = stream.shutdown(Shutdown::Both);
    }
}

/// Reads the whole request up to end of stream.
fn read_request(stream: &mut TcpStream) -> Result<Vec<u8>, DispatchError> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let bytes_read = read_with_retry(stream, &mut chunk)?;
        if bytes_read == 0 {
            return Ok(buffer);
        }
        buffer.extend_from_slice(&chunk[..bytes_read]);
        enforce_limit(buffer.len())?;
    }
}

/// Reads from the stream, retrying on interrupts.
fn read_with_retry(stream: &mut TcpStream, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Enforces the maximum request size limit.
fn enforce_limit(size: usize) -> Result<(), DispatchError> {
    if size > MAX_REQUEST_BYTES {
        return Err(DispatchError::RequestTooLarge {
            max_size: MAX_REQUEST_BYTES,
        });
    }
    Ok(())
}
