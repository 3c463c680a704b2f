//! Authoritative record of every peer that has reported a position.
//!
//! Peers are keyed by the source address of their datagrams. A record is
//! created by the first valid `pos` message from an address, refreshed by every
//! later one, and removed by timeout, by an explicit leave request, or when
//! sending to the address fails.

use log::info;
use shared::{peer_id, PlayerEntry, Vec3, DEFAULT_DISPLAY_NAME, DEFAULT_MODEL_TAG};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Last known state of one peer
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    pub position: Vec3,
    pub display_name: String,
    pub model_tag: String,
    /// Time of the last valid position report from this address
    pub last_seen: Instant,
}

impl PeerRecord {
    /// A record at exactly `timeout` age is still live; eviction needs strictly more.
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }
}

/// All known peers, ordered by address so snapshots list them stably.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    peers: BTreeMap<SocketAddr, PeerRecord>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the record for `addr`.
    ///
    /// The whole record is replaced: a report without a display name resets
    /// the name to the default rather than keeping the previous one. Returns
    /// true when the address was not known before.
    pub fn record_position(
        &mut self,
        addr: SocketAddr,
        position: Vec3,
        player: Option<String>,
        model: Option<String>,
        now: Instant,
    ) -> bool {
        let record = PeerRecord {
            position,
            display_name: player.unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            model_tag: model.unwrap_or_else(|| DEFAULT_MODEL_TAG.to_string()),
            last_seen: now,
        };

        let is_new = self.peers.insert(addr, record).is_none();
        if is_new {
            info!("Peer {} joined", peer_id(addr));
        }
        is_new
    }

    /// Removes every record whose display name equals `name`.
    ///
    /// Names are not unique, so two peers sharing a name are both removed.
    pub fn remove_by_display_name(&mut self, name: &str) -> usize {
        let before = self.peers.len();
        self.peers.retain(|_, record| record.display_name != name);
        let removed = before - self.peers.len();

        if removed > 0 {
            info!("Removed {} peer(s) named {:?} on request", removed, name);
        }
        removed
    }

    /// Removes one peer, e.g. after a failed send. Returns false if unknown.
    pub fn remove(&mut self, addr: &SocketAddr) -> bool {
        self.peers.remove(addr).is_some()
    }

    /// Removes and returns every address silent for longer than `timeout`.
    pub fn evict_stale(&mut self, now: Instant, timeout: Duration) -> Vec<SocketAddr> {
        let stale: Vec<SocketAddr> = self
            .peers
            .iter()
            .filter(|(_, record)| record.is_timed_out(now, timeout))
            .map(|(addr, _)| *addr)
            .collect();

        for addr in &stale {
            if let Some(record) = self.peers.remove(addr) {
                info!(
                    "Peer {} ({}) inactive, removed",
                    peer_id(*addr),
                    record.display_name
                );
            }
        }

        stale
    }

    /// Every current record in wire form, ordered by address.
    pub fn snapshot(&self) -> Vec<PlayerEntry> {
        self.peers
            .iter()
            .map(|(addr, record)| PlayerEntry {
                id: peer_id(*addr),
                player: record.display_name.clone(),
                model: record.model_tag.clone(),
                x: record.position.x,
                y: record.position.y,
                z: record.position.z,
            })
            .collect()
    }

    /// Broadcast targets.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.peers.keys().copied().collect()
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&PeerRecord> {
        self.peers.get(addr)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
