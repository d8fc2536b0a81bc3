//! Abstract transport layer driven by the server core
//!
//! The [`Transport`] trait is the capability boundary between the tick
//! driver and the machinery that actually moves bytes. The built-in
//! [`TcpTransport`](crate::tcp::TcpTransport) implements it over TCP;
//! tests implement it with a scripted in-memory double that injects
//! synthetic connect/data/disconnect events deterministically.

use bytes::Bytes;
use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Opaque identifier for one accepted connection.
///
/// Issued by the transport layer, owned by the server's connection table
/// once accepted. Identity equality; never reused while still registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw transport-issued id
    pub fn from_raw(raw: u64) -> Self {
        ConnectionId(raw)
    }

    /// The raw id value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One event popped from a connection's pending queue during a tick.
///
/// Events are transient: they carry no identity beyond the tick that
/// produced them and are never persisted. New connections are surfaced by
/// [`Transport::accept`], not as an event variant.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A payload received from the peer. The bytes are independently owned —
    /// the transport copies them out of its read buffer before emitting the
    /// event, so they stay valid after the tick's buffers are reclaimed.
    Data(Bytes),
    /// The peer disconnected. No further events follow for this handle.
    Disconnect,
}

/// Capability the server core drives to move bytes.
///
/// All methods are called from the single thread that drives
/// [`Server::advance`](crate::server::Server::advance); implementations need
/// no internal locking against the core.
pub trait Transport {
    /// Bind to `endpoint` and start listening.
    ///
    /// Allocates the transport's OS resources. On failure nothing may be
    /// left allocated, so the caller can retry with a corrected endpoint.
    fn bind(&mut self, endpoint: SocketAddr) -> io::Result<()>;

    /// Synchronization point called once at the start of every tick.
    ///
    /// Completes the transport's in-flight background work so that the
    /// `accept`/`poll_event` calls that follow observe everything that has
    /// arrived up to this point.
    fn advance(&mut self);

    /// Pop the next fully established incoming connection, if any.
    ///
    /// Called repeatedly until it returns `None`; each handle is returned
    /// exactly once.
    fn accept(&mut self) -> Option<ConnectionId>;

    /// Pop the next pending event for `conn`, in arrival order.
    ///
    /// Returns `None` when the queue is empty or the handle is unknown.
    /// After a [`TransportEvent::Disconnect`] is popped the transport may
    /// release all per-connection state for `conn`.
    fn poll_event(&mut self, conn: ConnectionId) -> Option<TransportEvent>;

    /// Best-effort send of `payload` to `conn`.
    ///
    /// May fail for a dead or unknown handle; callers treat every failure
    /// as a silent drop, so implementations must not block retrying.
    fn send(&mut self, conn: ConnectionId, payload: &[u8]) -> io::Result<()>;

    /// The local address this transport is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}
