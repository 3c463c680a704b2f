//! Client-side table of remote peers, reconciled against server snapshots.
//!
//! Owned exclusively by the session's update cycle; the network listener
//! never touches it, so it needs no lock.

use crate::interpolation::blend_towards;
use shared::{PlayerEntry, Vec3};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct RemotePeer {
    pub display_name: String,
    pub model_tag: String,
    /// Position from the most recent snapshot
    pub target_position: Vec3,
    /// Position shown to the player, chasing `target_position`
    pub render_position: Vec3,
    /// Local time of the last snapshot that listed this peer
    pub last_update: Instant,
}

/// What a snapshot changed, for the session to forward to the scene.
#[derive(Debug, Default, PartialEq)]
pub struct PeerChanges {
    pub joined: Vec<String>,
    pub left: Vec<String>,
}

#[derive(Debug)]
pub struct RemotePeers {
    local_id: String,
    peers: BTreeMap<String, RemotePeer>,
}

impl RemotePeers {
    /// `local_id` is this client's own `"ip:port"`; snapshot entries with
    /// that id are skipped.
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            peers: BTreeMap::new(),
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Reconciles the table with a full player list.
    ///
    /// Known peers get a new target and timestamp. Unknown peers are added
    /// with their render position already at the target. Peers missing from
    /// the list are removed.
    pub fn apply_snapshot(&mut self, players: &[PlayerEntry], now: Instant) -> PeerChanges {
        let mut changes = PeerChanges::default();
        let listed: HashSet<&str> = players.iter().map(|entry| entry.id.as_str()).collect();

        for entry in players {
            if entry.id == self.local_id {
                continue;
            }

            let target = entry.position();
            match self.peers.get_mut(&entry.id) {
                Some(peer) => {
                    peer.target_position = target;
                    peer.last_update = now;
                    peer.display_name.clone_from(&entry.player);
                    peer.model_tag.clone_from(&entry.model);
                }
                None => {
                    self.peers.insert(
                        entry.id.clone(),
                        RemotePeer {
                            display_name: entry.player.clone(),
                            model_tag: entry.model.clone(),
                            target_position: target,
                            render_position: target,
                            last_update: now,
                        },
                    );
                    changes.joined.push(entry.id.clone());
                }
            }
        }

        let departed: Vec<String> = self
            .peers
            .keys()
            .filter(|id| !listed.contains(id.as_str()))
            .cloned()
            .collect();
        for id in departed {
            self.peers.remove(&id);
            changes.left.push(id);
        }

        changes
    }

    /// Advances every render position one blend step toward its target.
    pub fn interpolate(&mut self, blend: f32) {
        for peer in self.peers.values_mut() {
            peer.render_position = blend_towards(peer.render_position, peer.target_position, blend);
        }
    }

    /// Removes peers not listed in any snapshot for longer than `timeout`.
    pub fn evict_stale(&mut self, now: Instant, timeout: Duration) -> Vec<String> {
        let stale: Vec<String> = self
            .peers
            .iter()
            .filter(|(_, peer)| now.saturating_duration_since(peer.last_update) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            self.peers.remove(id);
        }
        stale
    }

    pub fn get(&self, id: &str) -> Option<&RemotePeer> {
        self.peers.get(id)
    }

    /// Id and current render position of every remote peer.
    pub fn render_positions(&self) -> impl Iterator<Item = (&str, Vec3)> + '_ {
        self.peers
            .iter()
            .map(|(id, peer)| (id.as_str(), peer.render_position))
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{DEFAULT_DISPLAY_NAME, DEFAULT_MODEL_TAG, INTERPOLATION_BLEND};

    const LOCAL: &str = "127.0.0.1:5000";

    fn entry(id: &str, x: f32, y: f32, z: f32) -> PlayerEntry {
        PlayerEntry {
            id: id.to_string(),
            player: DEFAULT_DISPLAY_NAME.to_string(),
            model: DEFAULT_MODEL_TAG.to_string(),
            x,
            y,
            z,
        }
    }

    #[test]
    fn test_new_peer_starts_at_target() {
        let mut peers = RemotePeers::new(LOCAL);
        let now = Instant::now();

        let changes = peers.apply_snapshot(&[entry("10.0.0.2:4000", 1.0, 2.0, 3.0)], now);

        assert_eq!(changes.joined, vec!["10.0.0.2:4000".to_string()]);
        assert!(changes.left.is_empty());
        let peer = peers.get("10.0.0.2:4000").unwrap();
        assert_eq!(peer.render_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(peer.target_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(peer.last_update, now);
    }

    #[test]
    fn test_own_entry_is_skipped() {
        let mut peers = RemotePeers::new(LOCAL);

        let changes = peers.apply_snapshot(
            &[entry(LOCAL, 0.0, 0.0, 0.0), entry("10.0.0.2:4000", 0.0, 0.0, 0.0)],
            Instant::now(),
        );

        assert_eq!(changes.joined.len(), 1);
        assert!(peers.get(LOCAL).is_none());
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn test_existing_peer_gets_new_target_but_keeps_render() {
        let mut peers = RemotePeers::new(LOCAL);
        let start = Instant::now();
        peers.apply_snapshot(&[entry("b:1", 0.0, 0.0, 0.0)], start);

        let later = start + Duration::from_millis(50);
        let changes = peers.apply_snapshot(&[entry("b:1", 4.0, 0.0, 0.0)], later);

        assert_eq!(changes, PeerChanges::default());
        let peer = peers.get("b:1").unwrap();
        assert_eq!(peer.target_position, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(peer.render_position, Vec3::ZERO);
        assert_eq!(peer.last_update, later);
    }

    #[test]
    fn test_peer_missing_from_snapshot_is_removed() {
        let mut peers = RemotePeers::new(LOCAL);
        let now = Instant::now();
        peers.apply_snapshot(&[entry("b:1", 0.0, 0.0, 0.0), entry("c:1", 0.0, 0.0, 0.0)], now);

        let changes = peers.apply_snapshot(&[entry("c:1", 1.0, 0.0, 0.0)], now);

        assert_eq!(changes.left, vec!["b:1".to_string()]);
        assert!(peers.get("b:1").is_none());
        assert!(peers.get("c:1").is_some());
    }

    #[test]
    fn test_empty_snapshot_clears_table() {
        let mut peers = RemotePeers::new(LOCAL);
        let now = Instant::now();
        peers.apply_snapshot(&[entry("b:1", 0.0, 0.0, 0.0)], now);

        let changes = peers.apply_snapshot(&[], now);

        assert_eq!(changes.left.len(), 1);
        assert!(peers.is_empty());
    }

    #[test]
    fn test_interpolate_moves_render_toward_target() {
        let mut peers = RemotePeers::new(LOCAL);
        let now = Instant::now();
        peers.apply_snapshot(&[entry("b:1", 0.0, 0.0, 0.0)], now);
        peers.apply_snapshot(&[entry("b:1", 8.0, 0.0, -4.0)], now);

        peers.interpolate(INTERPOLATION_BLEND);

        let render: Vec<(&str, Vec3)> = peers.render_positions().collect();
        assert_eq!(render, vec![("b:1", Vec3::new(2.0, 0.0, -1.0))]);
    }

    #[test]
    fn test_evict_stale_after_timeout() {
        let mut peers = RemotePeers::new(LOCAL);
        let start = Instant::now();
        let timeout = Duration::from_secs(3);
        peers.apply_snapshot(&[entry("b:1", 0.0, 0.0, 0.0)], start);

        assert!(peers.evict_stale(start + timeout, timeout).is_empty());
        assert_eq!(peers.len(), 1);

        let evicted = peers.evict_stale(start + timeout + Duration::from_millis(1), timeout);
        assert_eq!(evicted, vec!["b:1".to_string()]);
        assert!(peers.is_empty());
    }
}
