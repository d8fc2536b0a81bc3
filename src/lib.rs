//! # netloop — tick-driven connection-oriented server core
//!
//! A minimal network server core: bind a listening endpoint, accept client
//! connections, track their lifecycle, deliver payloads and disconnect
//! notifications to registered callbacks, and send payloads to one or all
//! connected clients. The host drives the whole thing by calling
//! [`Server::advance`] once per tick from its own scheduling loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netloop::{Server, ServerConfig, TcpTransport};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new().address("0.0.0.0").port(7777);
//!     let transport = TcpTransport::from_config(&config);
//!     let mut server = Server::with_transport(transport, config);
//!
//!     server.on_connected(|conn| println!("connected: {conn}"));
//!     server.on_data_received(|payload, conn| {
//!         println!("{} bytes from {conn}", payload.len());
//!     });
//!
//!     server.listen()?;
//!     loop {
//!         server.advance();
//!         std::thread::sleep(std::time::Duration::from_millis(16));
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │   Host scheduler     │  listen / advance / close, send paths
//! ├──────────────────────┤
//! │   Server core        │  lifecycle state machine, tick driver,
//! │                      │  connection table, callback registry
//! ├──────────────────────┤
//! │   Transport trait    │  advance / accept / poll_event / send
//! ├──────────────────────┤
//! │   TcpTransport       │  background tokio runtime, socket I/O
//! └──────────────────────┘
//! ```
//!
//! Each tick runs a fixed sequence: advance the transport, compact the
//! connection table, drain pending accepts, then drain every connection's
//! event queue. Disconnected handles are invalidated during dispatch and
//! physically removed at the start of the next tick, so the table is never
//! mutated structurally mid-pass.

pub mod config;
pub mod connections;
pub mod error;
pub mod server;
pub mod tcp;
pub mod transport;

// Re-exports
pub use config::{AddressFamily, ServerConfig};
pub use error::{Result, ServerError};
pub use server::{Server, ServerState, ServerStats};
pub use tcp::TcpTransport;
pub use transport::{ConnectionId, Transport, TransportEvent};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
