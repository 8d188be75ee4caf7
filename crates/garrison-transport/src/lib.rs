//! Transport abstraction layer for Garrison.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how the client reaches a server (WebSocket in production, in-process
//! memory channels in tests).
//!
//! Unlike a server-side transport, there is no accept loop here: the client
//! *dials* a [`Target`] and gets back a single bidirectional connection.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryConnector};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where to dial: a host/port pair plus transport-level options.
///
/// `timeout` bounds the dial itself; per-call timeouts are the RPC
/// layer's concern.
#[derive(Debug, Clone)]
pub struct Target {
    /// Host name or IP of the remote endpoint.
    pub host: String,
    /// Port of the remote endpoint.
    pub port: u16,
    /// Whether to use a TLS-secured transport (`wss://` for WebSocket).
    pub secure: bool,
    /// How long to wait for the dial to complete.
    pub timeout: Duration,
}

impl Target {
    /// Creates a target with the given host and port, insecure, with a
    /// 10-second dial timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            secure: false,
            timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Dials a remote endpoint and produces a connection.
///
/// The returned futures are `Send`: tasks generic over a connector get
/// spawned onto the runtime's worker threads. Implementations can still
/// be written as plain `async fn`s.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Dials the target, bounded by `target.timeout`.
    fn connect(
        &self,
        target: &Target,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single connection that can send and receive bytes.
///
/// Like [`Connector`], the returned futures are `Send` so reader tasks
/// generic over the connection can be spawned.
pub trait Connection: Send + Sync + 'static {
    /// Sends data to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
