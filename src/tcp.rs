//! TCP-backed [`Transport`] driver
//!
//! Socket work runs on a background tokio runtime owned by the transport:
//! an accept task plus one reader and one writer task per connection, all
//! feeding a single unbounded event channel. [`Transport::advance`] drains
//! that channel synchronously, which is the per-tick synchronization point
//! the server core relies on — everything the background tasks produced up
//! to that moment becomes visible to `accept`/`poll_event`.

use crate::config::ServerConfig;
use crate::transport::{ConnectionId, Transport, TransportEvent};

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Raw notification from a background task to the driving thread.
enum RawEvent {
    /// A connection finished establishing; carries its writer channel.
    Accepted {
        conn: ConnectionId,
        peer: SocketAddr,
        writer: mpsc::UnboundedSender<Bytes>,
    },
    /// A data or disconnect event for an established connection.
    Event {
        conn: ConnectionId,
        event: TransportEvent,
    },
}

/// [`Transport`] implementation over TCP.
///
/// Unbound until [`bind`](Transport::bind); dropping it aborts the accept
/// task and shuts the runtime down in the background.
pub struct TcpTransport {
    read_buffer_size: usize,
    runtime: Option<Runtime>,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
    event_rx: Option<mpsc::UnboundedReceiver<RawEvent>>,
    pending_accepts: VecDeque<ConnectionId>,
    events: HashMap<ConnectionId, VecDeque<TransportEvent>>,
    writers: HashMap<ConnectionId, mpsc::UnboundedSender<Bytes>>,
}

impl TcpTransport {
    /// Create an unbound transport with default buffer sizing
    pub fn new() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            runtime: None,
            local_addr: None,
            accept_task: None,
            event_rx: None,
            pending_accepts: VecDeque::new(),
            events: HashMap::new(),
            writers: HashMap::new(),
        }
    }

    /// Create an unbound transport sized from a server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut transport = Self::new();
        transport.read_buffer_size = config.read_buffer_size;
        transport
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    fn bind(&mut self, endpoint: SocketAddr) -> io::Result<()> {
        if self.runtime.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "transport is already bound",
            ));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("netloop-transport")
            .enable_all()
            .build()?;
        let listener = runtime.block_on(TcpListener::bind(endpoint))?;
        let local_addr = listener.local_addr()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let read_buffer_size = self.read_buffer_size;
        let accept_task = runtime.spawn(accept_loop(listener, event_tx, read_buffer_size));

        self.local_addr = Some(local_addr);
        self.event_rx = Some(event_rx);
        self.accept_task = Some(accept_task);
        self.runtime = Some(runtime);
        debug!(%local_addr, "tcp transport bound");
        Ok(())
    }

    fn advance(&mut self) {
        let Some(event_rx) = self.event_rx.as_mut() else {
            return;
        };
        while let Ok(raw) = event_rx.try_recv() {
            match raw {
                RawEvent::Accepted { conn, peer, writer } => {
                    trace!(%conn, %peer, "connection established");
                    self.writers.insert(conn, writer);
                    self.events.insert(conn, VecDeque::new());
                    self.pending_accepts.push_back(conn);
                }
                RawEvent::Event { conn, event } => {
                    // Queues are dropped once the Disconnect is polled;
                    // anything arriving after that is for a dead handle.
                    if let Some(queue) = self.events.get_mut(&conn) {
                        queue.push_back(event);
                    }
                }
            }
        }
    }

    fn accept(&mut self) -> Option<ConnectionId> {
        self.pending_accepts.pop_front()
    }

    fn poll_event(&mut self, conn: ConnectionId) -> Option<TransportEvent> {
        let queue = self.events.get_mut(&conn)?;
        let event = queue.pop_front()?;
        if matches!(event, TransportEvent::Disconnect) {
            // Disconnect is the last event a reader emits; release the
            // connection's queues and writer now.
            self.events.remove(&conn);
            self.writers.remove(&conn);
        }
        Some(event)
    }

    fn send(&mut self, conn: ConnectionId, payload: &[u8]) -> io::Result<()> {
        let writer = self.writers.get(&conn).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "unknown connection handle")
        })?;
        writer
            .send(Bytes::copy_from_slice(payload))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "connection writer closed"))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.local_addr
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport is not bound"))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
        // Dropping the senders lets writer tasks drain and exit.
        self.writers.clear();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Accept incoming sockets and spawn their reader/writer tasks.
///
/// Handle ids are assigned monotonically here and never reused.
async fn accept_loop(
    listener: TcpListener,
    event_tx: mpsc::UnboundedSender<RawEvent>,
    read_buffer_size: usize,
) {
    let mut next_id: u64 = 1;
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let conn = ConnectionId::from_raw(next_id);
                next_id += 1;
                let _ = stream.set_nodelay(true);

                let (reader, writer) = stream.into_split();
                let (writer_tx, writer_rx) = mpsc::unbounded_channel();
                if event_tx
                    .send(RawEvent::Accepted {
                        conn,
                        peer,
                        writer: writer_tx,
                    })
                    .is_err()
                {
                    // Driving side is gone, transport is shutting down.
                    break;
                }
                tokio::spawn(read_loop(conn, reader, event_tx.clone(), read_buffer_size));
                tokio::spawn(write_loop(conn, writer, writer_rx));
                debug!(%conn, %peer, "accepted tcp connection");
            }
            Err(error) => {
                warn!(%error, "accept failed");
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
}

/// Forward every read chunk as one owned Data event; EOF or a read error
/// becomes the connection's final Disconnect event.
async fn read_loop(
    conn: ConnectionId,
    mut reader: OwnedReadHalf,
    event_tx: mpsc::UnboundedSender<RawEvent>,
    read_buffer_size: usize,
) {
    let mut buf = vec![0u8; read_buffer_size];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                let _ = event_tx.send(RawEvent::Event {
                    conn,
                    event: TransportEvent::Disconnect,
                });
                break;
            }
            Ok(n) => {
                // Copy out of the task-local buffer; the Bytes handed to the
                // core owns its storage.
                let payload = Bytes::copy_from_slice(&buf[..n]);
                if event_tx
                    .send(RawEvent::Event {
                        conn,
                        event: TransportEvent::Data(payload),
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(error) => {
                trace!(%conn, %error, "read failed");
                let _ = event_tx.send(RawEvent::Event {
                    conn,
                    event: TransportEvent::Disconnect,
                });
                break;
            }
        }
    }
}

/// Drain the writer channel into the socket. Sends are best-effort: a write
/// failure stops the task, the reader side reports the disconnect.
async fn write_loop(
    conn: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut writer_rx: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(payload) = writer_rx.recv().await {
        if let Err(error) = writer.write_all(&payload).await {
            trace!(%conn, %error, "write failed, dropping writer");
            break;
        }
    }
}
