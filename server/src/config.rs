use shared::{NetError, DEFAULT_SERVER_PORT, LIVENESS_SWEEP_INTERVAL, SERVER_CLIENT_TIMEOUT};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Ports the interactive prompt accepts. `--port` is not restricted.
pub const PROMPT_PORT_RANGE: RangeInclusive<u16> = 3000..=9999;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the socket to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Silence after which a peer is evicted
    pub client_timeout: Duration,
    /// Period of the liveness sweep
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_SERVER_PORT,
            client_timeout: SERVER_CLIENT_TIMEOUT,
            sweep_interval: LIVENESS_SWEEP_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Parses the operator's answer to the startup port prompt.
/// An empty answer selects the default port.
pub fn parse_port_input(input: &str) -> Result<u16, NetError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_SERVER_PORT);
    }

    let port = trimmed
        .parse::<u16>()
        .map_err(|_| NetError::InvalidAddress(format!("invalid port {:?}", trimmed)))?;

    if !PROMPT_PORT_RANGE.contains(&port) {
        return Err(NetError::InvalidConfig(format!(
            "port {} outside {}-{}",
            port,
            PROMPT_PORT_RANGE.start(),
            PROMPT_PORT_RANGE.end()
        )));
    }
    Ok(port)
}
