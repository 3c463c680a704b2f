//! Seams between the sync session and the game it runs inside.
//!
//! The session never touches scene objects directly. It reads the local
//! player position, looks doors up by id, and announces remote peers
//! appearing and disappearing through the `World` trait.

use shared::{NetError, Vec3};

/// A door owned by the game scene.
pub trait Door {
    fn is_open(&self) -> bool;
    fn open(&mut self);
    fn close(&mut self);
}

pub trait World {
    /// Current position of the local player.
    fn local_position(&self) -> Vec3;

    fn door_mut(&mut self, door_id: u32) -> Option<&mut dyn Door>;

    /// A remote peer was seen for the first time; load its visual.
    fn peer_joined(&mut self, _id: &str, _model: &str, _position: Vec3) {}

    /// A remote peer left or timed out; remove its visual.
    fn peer_left(&mut self, _id: &str) {}
}

/// Brings a local door to `open`, doing nothing if it is already there.
///
/// Returns whether the door moved. Idempotent, so a `door_sync` racing a
/// lagging snapshot cannot flap the door.
pub fn apply_door_state<W: World + ?Sized>(
    world: &mut W,
    door_id: u32,
    open: bool,
) -> Result<bool, NetError> {
    let door = world
        .door_mut(door_id)
        .ok_or(NetError::UnknownDoor(door_id))?;

    match (open, door.is_open()) {
        (true, false) => {
            door.open();
            Ok(true)
        }
        (false, true) => {
            door.close();
            Ok(true)
        }
        _ => Ok(false),
    }
}
