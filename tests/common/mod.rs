//! Shared test helpers: a scripted in-memory transport
//!
//! [`ScriptedTransport`] implements [`Transport`] without any sockets; the
//! paired [`Script`] handle injects synthetic connect/data/disconnect events
//! between ticks and records everything the server sent, including whether
//! the transport's resources were bound and released.

#![allow(dead_code)]

use bytes::Bytes;
use netloop::{ConnectionId, Transport, TransportEvent};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;

#[derive(Default)]
struct ScriptState {
    fail_bind: bool,
    bound: Option<SocketAddr>,
    released: bool,
    bind_calls: u64,
    advances: u64,
    next_id: u64,
    pending_accepts: VecDeque<ConnectionId>,
    events: HashMap<ConnectionId, VecDeque<TransportEvent>>,
    dead: HashSet<ConnectionId>,
    sent: Vec<(ConnectionId, Vec<u8>)>,
}

/// Deterministic in-memory transport for driving the server in tests
pub struct ScriptedTransport {
    state: Rc<RefCell<ScriptState>>,
}

/// Control handle kept by the test after the transport moves into the server
pub struct Script {
    state: Rc<RefCell<ScriptState>>,
}

/// Create a transport/script pair that binds successfully
pub fn scripted() -> (ScriptedTransport, Script) {
    let state = Rc::new(RefCell::new(ScriptState::default()));
    (
        ScriptedTransport {
            state: state.clone(),
        },
        Script { state },
    )
}

/// Create a transport/script pair whose bind fails until
/// [`Script::allow_bind`] is called
pub fn failing_bind() -> (ScriptedTransport, Script) {
    let (transport, script) = scripted();
    script.state.borrow_mut().fail_bind = true;
    (transport, script)
}

impl Script {
    /// Queue a new incoming connection, returning its handle
    pub fn connect(&self) -> ConnectionId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let conn = ConnectionId::from_raw(state.next_id);
        state.pending_accepts.push_back(conn);
        state.events.insert(conn, VecDeque::new());
        conn
    }

    /// Queue a data event; the payload is copied immediately, like a real
    /// transport copying out of its receive buffer
    pub fn data(&self, conn: ConnectionId, payload: &[u8]) {
        let mut state = self.state.borrow_mut();
        if let Some(queue) = state.events.get_mut(&conn) {
            queue.push_back(TransportEvent::Data(Bytes::copy_from_slice(payload)));
        }
    }

    /// Queue a disconnect event for `conn`
    pub fn disconnect(&self, conn: ConnectionId) {
        let mut state = self.state.borrow_mut();
        if let Some(queue) = state.events.get_mut(&conn) {
            queue.push_back(TransportEvent::Disconnect);
        }
    }

    /// Make sends to `conn` fail from now on
    pub fn kill(&self, conn: ConnectionId) {
        self.state.borrow_mut().dead.insert(conn);
    }

    /// Let a previously failing bind succeed
    pub fn allow_bind(&self) {
        self.state.borrow_mut().fail_bind = false;
    }

    /// Everything the server sent, in order
    pub fn sent(&self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.state.borrow().sent.clone()
    }

    /// Whether the transport currently holds a bound endpoint
    pub fn bound(&self) -> bool {
        self.state.borrow().bound.is_some()
    }

    /// Whether the transport instance has been dropped
    pub fn released(&self) -> bool {
        self.state.borrow().released
    }

    /// How many times the server called bind
    pub fn bind_calls(&self) -> u64 {
        self.state.borrow().bind_calls
    }

    /// How many ticks reached the transport
    pub fn advances(&self) -> u64 {
        self.state.borrow().advances
    }
}

impl Transport for ScriptedTransport {
    fn bind(&mut self, endpoint: SocketAddr) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.bind_calls += 1;
        if state.fail_bind {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                "scripted bind failure",
            ));
        }
        state.bound = Some(endpoint);
        Ok(())
    }

    fn advance(&mut self) {
        self.state.borrow_mut().advances += 1;
    }

    fn accept(&mut self) -> Option<ConnectionId> {
        self.state.borrow_mut().pending_accepts.pop_front()
    }

    fn poll_event(&mut self, conn: ConnectionId) -> Option<TransportEvent> {
        let mut state = self.state.borrow_mut();
        let event = state.events.get_mut(&conn)?.pop_front()?;
        if matches!(event, TransportEvent::Disconnect) {
            // Mirror a real transport: the handle is dead once its
            // Disconnect is popped, later events and sends target nothing.
            state.events.remove(&conn);
            state.dead.insert(conn);
        }
        Some(event)
    }

    fn send(&mut self, conn: ConnectionId, payload: &[u8]) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.dead.contains(&conn) || !state.events.contains_key(&conn) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "send to dead handle",
            ));
        }
        state.sent.push((conn, payload.to_vec()));
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.state
            .borrow()
            .bound
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "not bound"))
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.state.borrow_mut().released = true;
    }
}
