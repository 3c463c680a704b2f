//! Open/closed state of every door that has been toggled at least once.

use std::collections::BTreeMap;

/// Door id -> open. Last write wins: there is no per-door version, so a
/// reordered older toggle overrides a newer one.
#[derive(Debug, Default, Clone)]
pub struct DoorTable {
    states: BTreeMap<u32, bool>,
}

impl DoorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally overwrites the state and returns the previous one.
    pub fn set_state(&mut self, door_id: u32, open: bool) -> Option<bool> {
        self.states.insert(door_id, open)
    }

    pub fn get(&self, door_id: u32) -> Option<bool> {
        self.states.get(&door_id).copied()
    }

    pub fn snapshot_all(&self) -> BTreeMap<u32, bool> {
        self.states.clone()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
