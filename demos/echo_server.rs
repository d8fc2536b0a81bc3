//! Echo server demo driven by a plain host loop
//!
//! Run with `cargo run --example echo_server [addr:port]`, then connect with
//! e.g. `nc 127.0.0.1 7777` — everything a client sends is echoed back to it.

use netloop::{AddressFamily, ConnectionId, Server, ServerConfig, TcpTransport};

use bytes::Bytes;
use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7777".to_string())
        .parse()?;
    let family = if addr.is_ipv6() {
        AddressFamily::Ipv6
    } else {
        AddressFamily::Ipv4
    };
    let config = ServerConfig::new()
        .address(addr.ip().to_string())
        .port(addr.port())
        .family(family);

    let transport = TcpTransport::from_config(&config);
    let mut server = Server::with_transport(transport, config);

    let inbox: Rc<RefCell<Vec<(Bytes, ConnectionId)>>> = Rc::new(RefCell::new(Vec::new()));
    let inbox_writer = inbox.clone();

    server.on_connected(|conn| info!(%conn, "client connected"));
    server.on_disconnected(|conn| info!(%conn, "client disconnected"));
    server.on_data_received(move |payload, conn| {
        inbox_writer.borrow_mut().push((payload, conn));
    });

    server.listen()?;
    let local_addr = server.local_addr()?;
    info!(%local_addr, "echo server up");

    loop {
        server.advance();
        for (payload, conn) in inbox.borrow_mut().drain(..) {
            server.send_bytes(conn, &payload);
        }
        std::thread::sleep(Duration::from_millis(16));
    }
}
