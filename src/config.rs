//! Configuration types for the server

use crate::error::{Result, ServerError};
use std::net::{IpAddr, SocketAddr};

/// Address family the endpoint is parsed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressFamily {
    /// IPv4 (default)
    #[default]
    Ipv4,
    /// IPv6
    Ipv6,
}

/// Server configuration builder.
///
/// Consumed at [`listen`](crate::server::Server::listen) time; immutable for
/// the rest of that session.
///
/// ```
/// use netloop::config::{AddressFamily, ServerConfig};
///
/// let config = ServerConfig::new()
///     .address("127.0.0.1")
///     .port(9000)
///     .family(AddressFamily::Ipv4);
/// assert!(config.endpoint().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address family the endpoint must belong to
    pub family: AddressFamily,
    /// Listen address, e.g. `"0.0.0.0"` or `"::"`
    pub address: String,
    /// Listen port (0 asks the OS for an ephemeral port)
    pub port: u16,
    /// Initial capacity of the connection table
    pub table_capacity: usize,
    /// Size of the transport's per-connection read buffer
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            family: AddressFamily::Ipv4,
            address: "0.0.0.0".to_string(),
            port: 7777,
            table_capacity: 16,
            read_buffer_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listen address
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the listen port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the address family
    pub fn family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    /// Shortcut for an IPv6 configuration listening on `"::"`
    pub fn ipv6(mut self) -> Self {
        self.family = AddressFamily::Ipv6;
        self.address = "::".to_string();
        self
    }

    /// Set the initial connection table capacity
    pub fn table_capacity(mut self, capacity: usize) -> Self {
        self.table_capacity = capacity;
        self
    }

    /// Set the transport read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Parse the configured address/port into a concrete endpoint.
    ///
    /// Fails if the address does not parse or does not belong to the
    /// configured family.
    pub fn endpoint(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.address.parse().map_err(|_| {
            ServerError::config(format!("invalid listen address: {:?}", self.address))
        })?;

        match (self.family, ip) {
            (AddressFamily::Ipv4, IpAddr::V4(_)) | (AddressFamily::Ipv6, IpAddr::V6(_)) => {}
            (family, _) => {
                return Err(ServerError::config(format!(
                    "address {} does not match family {:?}",
                    self.address, family
                )));
            }
        }

        Ok(SocketAddr::new(ip, self.port))
    }
}
