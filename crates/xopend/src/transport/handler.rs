//! Connection handling abstraction for the daemon listener.

use std::net::TcpStream;

/// Handles accepted connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream);
}
