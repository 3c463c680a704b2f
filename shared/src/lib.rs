//! Types and constants shared by the sync server and its clients.
//!
//! Holds the wire protocol (`protocol`), the error taxonomy (`error`), the
//! small vector type positions travel in, and the helpers both endpoints use
//! to name a peer by its network address.

pub mod error;
pub mod protocol;

pub use error::NetError;
pub use protocol::{decode, encode, DoorEvent, Message, PlayerEntry, PositionReport, Snapshot};

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::ops::{Add, Mul, Sub};
use std::time::Duration;

/// Server drops a peer after this much silence.
pub const SERVER_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
/// Period of the server's independent liveness sweep.
pub const LIVENESS_SWEEP_INTERVAL: Duration = Duration::from_secs(10);
/// Client drops a remote peer missing from snapshots for this long.
pub const CLIENT_PEER_TIMEOUT: Duration = Duration::from_secs(3);
/// Client update cycle period.
pub const UPDATE_TICK: Duration = Duration::from_millis(10);
/// Fraction of the remaining distance closed per update tick.
pub const INTERPOLATION_BLEND: f32 = 0.25;

pub const DEFAULT_DISPLAY_NAME: &str = "Player";
pub const DEFAULT_MODEL_TAG: &str = "default";
pub const DEFAULT_SERVER_PORT: u16 = 9999;
pub const MAX_DATAGRAM_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(&self, other: Vec3) -> f32 {
        (*self - other).length()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Formats an address as the `"ip:port"` peer identifier used on the wire.
///
/// IPv6 addresses are written without brackets so that server-side ids and
/// client self-identification agree character for character.
pub fn peer_id(addr: SocketAddr) -> String {
    format!("{}:{}", addr.ip(), addr.port())
}

/// Returns the local interface address the OS would route `target` through.
///
/// Connecting a UDP socket sends nothing; it only resolves the route. Falls
/// back to loopback when no route exists (offline machine, firewalled probe).
pub fn local_ip_towards(target: SocketAddr) -> IpAddr {
    let unspecified = match target {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };

    let probe = UdpSocket::bind(unspecified).and_then(|socket| {
        socket.connect(target)?;
        socket.local_addr()
    });

    match probe {
        Ok(addr) if !addr.ip().is_unspecified() => addr.ip(),
        _ => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}
