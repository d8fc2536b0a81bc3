//! Tick-driven server core: lifecycle state machine, event dispatch, send path

use crate::config::ServerConfig;
use crate::connections::ConnectionTable;
use crate::error::{Result, ServerError};
use crate::transport::{ConnectionId, Transport, TransportEvent};

use bytes::Bytes;
use std::net::SocketAddr;
use tracing::{debug, info, trace, warn};

/// Lifecycle state of a [`Server`].
///
/// `Closed` is terminal: a closed server never listens again, a new
/// instance is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Initial state, no resources bound
    Idle,
    /// Bound and accepting; the tick driver is active
    Listening,
    /// Terminal state, resources released
    Closed,
}

/// Counters accumulated over a server's Listening lifetime
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Connections accepted
    pub connections_accepted: u64,
    /// Disconnect events dispatched
    pub disconnects: u64,
    /// Payload bytes delivered to the data callback
    pub bytes_received: u64,
    /// Payload bytes handed to the transport send path
    pub bytes_sent: u64,
}

type ConnectionFn = Box<dyn FnMut(ConnectionId)>;
type DataFn = Box<dyn FnMut(Bytes, ConnectionId)>;

/// Optional-subscriber callback registry. Zero subscribers is the default
/// and costs nothing.
#[derive(Default)]
struct Callbacks {
    connected: Option<ConnectionFn>,
    disconnected: Option<ConnectionFn>,
    data_received: Option<DataFn>,
}

impl Callbacks {
    fn connected(&mut self, conn: ConnectionId) {
        if let Some(callback) = &mut self.connected {
            callback(conn);
        }
    }

    fn disconnected(&mut self, conn: ConnectionId) {
        if let Some(callback) = &mut self.disconnected {
            callback(conn);
        }
    }

    fn data_received(&mut self, payload: Bytes, conn: ConnectionId) {
        if let Some(callback) = &mut self.data_received {
            callback(payload, conn);
        }
    }
}

/// Connection-oriented server core driven by per-tick polling.
///
/// The server owns its transport driver and connection table exclusively.
/// The host constructs it with [`with_transport`](Server::with_transport),
/// calls [`listen`](Server::listen) once, then drives
/// [`advance`](Server::advance) from its scheduling loop and finally calls
/// [`close`](Server::close). All methods must be called from the same
/// logical thread; no internal locking is provided or needed.
pub struct Server<T: Transport> {
    config: ServerConfig,
    state: ServerState,
    driver: Option<T>,
    connections: Option<ConnectionTable>,
    callbacks: Callbacks,
    stats: ServerStats,
}

impl<T: Transport> Server<T> {
    /// Create an idle server around an unbound transport driver
    pub fn with_transport(driver: T, config: ServerConfig) -> Self {
        Self {
            config,
            state: ServerState::Idle,
            driver: Some(driver),
            connections: None,
            callbacks: Callbacks::default(),
            stats: ServerStats::default(),
        }
    }

    /// Register the connected callback, replacing any previous one
    pub fn on_connected(&mut self, callback: impl FnMut(ConnectionId) + 'static) {
        self.callbacks.connected = Some(Box::new(callback));
    }

    /// Register the disconnected callback, replacing any previous one
    pub fn on_disconnected(&mut self, callback: impl FnMut(ConnectionId) + 'static) {
        self.callbacks.disconnected = Some(Box::new(callback));
    }

    /// Register the data callback, replacing any previous one.
    ///
    /// The payload is independently owned; it stays valid after the tick's
    /// transport buffers are reclaimed.
    pub fn on_data_received(&mut self, callback: impl FnMut(Bytes, ConnectionId) + 'static) {
        self.callbacks.data_received = Some(Box::new(callback));
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Number of currently valid connections
    pub fn connection_count(&self) -> usize {
        self.connections.as_ref().map_or(0, ConnectionTable::len)
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// The bound local address, once listening
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let driver = self
            .driver
            .as_ref()
            .ok_or_else(|| ServerError::state("server is closed"))?;
        Ok(driver.local_addr()?)
    }

    /// Bind the configured endpoint and start listening.
    ///
    /// Calling this while already listening is a warning-level no-op. A
    /// closed server cannot listen again. On bind failure the server stays
    /// Idle with nothing allocated, so the caller may fix the configuration
    /// and retry.
    pub fn listen(&mut self) -> Result<()> {
        match self.state {
            ServerState::Listening => {
                warn!("server is already listening, ignoring listen()");
                return Ok(());
            }
            ServerState::Closed => {
                return Err(ServerError::state(
                    "server is closed; create a new instance to listen again",
                ));
            }
            ServerState::Idle => {}
        }

        let endpoint = self.config.endpoint()?;
        let driver = self
            .driver
            .as_mut()
            .ok_or_else(|| ServerError::state("transport driver missing"))?;

        driver
            .bind(endpoint)
            .map_err(|source| ServerError::Bind { endpoint, source })?;

        // Allocate the table only after bind succeeds; a failed bind leaves
        // the server exactly as it was.
        self.connections = Some(ConnectionTable::with_capacity(self.config.table_capacity));
        self.state = ServerState::Listening;
        info!(%endpoint, "server listening");
        Ok(())
    }

    /// Release the transport driver and connection table.
    ///
    /// Closing an idle or already closed server is a no-op. After close,
    /// [`advance`](Server::advance) calls become no-ops and
    /// [`listen`](Server::listen) fails.
    pub fn close(&mut self) {
        match self.state {
            ServerState::Idle => {
                debug!("close() on idle server, nothing to release");
            }
            ServerState::Closed => {
                debug!("close() on closed server, nothing to release");
            }
            ServerState::Listening => {
                self.driver = None;
                self.connections = None;
                self.state = ServerState::Closed;
                info!("server closed");
            }
        }
    }

    /// Run one tick: advance the transport, compact the table, accept new
    /// connections, then drain every connection's pending events.
    ///
    /// Safe to drive unconditionally from a host scheduler — a no-op unless
    /// the server is listening. Must not be re-entered.
    pub fn advance(&mut self) {
        if self.state != ServerState::Listening {
            return;
        }
        let (Some(driver), Some(table)) = (self.driver.as_mut(), self.connections.as_mut())
        else {
            return;
        };

        // 1. Let the transport settle; later polls assume it is current.
        driver.advance();

        // 2. Reap handles invalidated during the previous tick. This runs
        //    before any dispatch so swap-remove can never shift a slot out
        //    from under an in-flight pass.
        let removed = table.compact();
        if removed > 0 {
            trace!(removed, "compacted connection table");
        }

        // 3. Accept phase: drain fully, a connection burst is absorbed in
        //    one tick.
        while let Some(conn) = driver.accept() {
            table.add(conn);
            self.stats.connections_accepted += 1;
            debug!(%conn, connections = table.len(), "accepted connection");
            self.callbacks.connected(conn);
        }

        // 4. Drain phase: one fixed-order pass over the current slots.
        //    Handles accepted above are included; handles disconnecting here
        //    are invalidated in place and removed next tick.
        for index in 0..table.slot_count() {
            let Some(conn) = table.get(index) else {
                continue;
            };
            while let Some(event) = driver.poll_event(conn) {
                match event {
                    TransportEvent::Data(payload) => {
                        if payload.is_empty() {
                            // Not expected from a well-behaved transport;
                            // skip rather than stall the drain.
                            trace!(%conn, "skipping empty data event");
                            continue;
                        }
                        self.stats.bytes_received += payload.len() as u64;
                        trace!(%conn, len = payload.len(), "data received");
                        self.callbacks.data_received(payload, conn);
                    }
                    TransportEvent::Disconnect => {
                        self.stats.disconnects += 1;
                        debug!(%conn, "peer disconnected");
                        self.callbacks.disconnected(conn);
                        table.invalidate(conn);
                    }
                }
            }
        }
    }

    /// Best-effort send of `payload` to one connection.
    ///
    /// Fire-and-forget: a send to a dead or unknown handle, or any transient
    /// transport failure, is silently dropped. No-op unless listening.
    pub fn send_bytes(&mut self, conn: ConnectionId, payload: &[u8]) {
        if self.state != ServerState::Listening {
            return;
        }
        let Some(driver) = self.driver.as_mut() else {
            return;
        };
        match driver.send(conn, payload) {
            Ok(()) => self.stats.bytes_sent += payload.len() as u64,
            Err(error) => trace!(%conn, %error, "send dropped"),
        }
    }

    /// Best-effort send of `payload` to every valid connection, in table
    /// order.
    ///
    /// Not atomic: a handle that dies mid-broadcast is skipped or dropped
    /// silently, never an error. No-op unless listening.
    pub fn broadcast_bytes(&mut self, payload: &[u8]) {
        if self.state != ServerState::Listening {
            return;
        }
        let (Some(driver), Some(table)) = (self.driver.as_mut(), self.connections.as_ref())
        else {
            return;
        };
        for conn in table.iter() {
            match driver.send(conn, payload) {
                Ok(()) => self.stats.bytes_sent += payload.len() as u64,
                Err(error) => trace!(%conn, %error, "broadcast send dropped"),
            }
        }
    }
}

impl<T: Transport> Drop for Server<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_tolerate_zero_subscribers() {
        let mut callbacks = Callbacks::default();
        let conn = ConnectionId::from_raw(1);
        callbacks.connected(conn);
        callbacks.disconnected(conn);
        callbacks.data_received(Bytes::from_static(b"payload"), conn);
    }
}
