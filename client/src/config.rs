use shared::{
    NetError, CLIENT_PEER_TIMEOUT, DEFAULT_SERVER_PORT, INTERPOLATION_BLEND, UPDATE_TICK,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Client session configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    /// Sent with every position report; the server substitutes a default when absent
    pub display_name: Option<String>,
    pub model_tag: Option<String>,
    /// Update cycle period
    pub tick: Duration,
    /// Remote peers missing from snapshots this long are dropped
    pub peer_timeout: Duration,
    /// Interpolation blend factor, in (0, 1]
    pub blend: f32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_SERVER_PORT),
            display_name: None,
            model_tag: None,
            tick: UPDATE_TICK,
            peer_timeout: CLIENT_PEER_TIMEOUT,
            blend: INTERPOLATION_BLEND,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), NetError> {
        if !(self.blend > 0.0 && self.blend <= 1.0) {
            return Err(NetError::InvalidConfig(format!(
                "blend factor {} outside (0, 1]",
                self.blend
            )));
        }
        if self.tick.is_zero() {
            return Err(NetError::InvalidConfig("tick period must be positive".into()));
        }
        Ok(())
    }
}

/// Resolves `host:port`, accepting hostnames as well as literal addresses.
pub fn resolve_server_addr(input: &str) -> Result<SocketAddr, NetError> {
    input
        .to_socket_addrs()
        .map_err(|e| NetError::InvalidAddress(format!("{}: {}", input, e)))?
        .next()
        .ok_or_else(|| NetError::InvalidAddress(input.to_string()))
}
