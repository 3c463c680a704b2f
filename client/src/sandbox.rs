//! Headless stand-in for the game scene.
//!
//! Lets the client binary (and tests) run a full sync session without a
//! renderer: the local player wanders around a flat arena, doors are plain
//! flags, and remote peer "models" are just a set of loaded ids.

use crate::world::{Door, World};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{DoorEvent, Vec3};
use std::collections::BTreeMap;

/// Half-width of the square arena the wanderer stays inside.
pub const ARENA_HALF_EXTENT: f32 = 20.0;
/// Doors farther than this cannot be toggled by the local player.
pub const DOOR_INTERACTION_RADIUS: f32 = 1.0;
const WALK_SPEED: f32 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxDoor {
    pub id: u32,
    pub position: Vec3,
    pub open: bool,
}

impl Door for SandboxDoor {
    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) {
        debug!("Door {} opening", self.id);
        self.open = true;
    }

    fn close(&mut self) {
        debug!("Door {} closing", self.id);
        self.open = false;
    }
}

pub struct SandboxWorld {
    position: Vec3,
    heading: f32,
    doors: BTreeMap<u32, SandboxDoor>,
    /// Remote peer id -> model tag of the visual loaded for it
    loaded_models: BTreeMap<String, String>,
    rng: StdRng,
}

impl SandboxWorld {
    pub fn new(seed: u64) -> Self {
        Self {
            position: Vec3::ZERO,
            heading: 0.0,
            doors: BTreeMap::new(),
            loaded_models: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sandbox with doors 1-4 placed along the arena's walls.
    pub fn with_default_doors(seed: u64) -> Self {
        let mut world = Self::new(seed);
        world.add_door(1, Vec3::new(10.0, 0.0, 0.0));
        world.add_door(2, Vec3::new(-10.0, 0.0, 0.0));
        world.add_door(3, Vec3::new(0.0, 0.0, 10.0));
        world.add_door(4, Vec3::new(0.0, 0.0, -10.0));
        world
    }

    pub fn add_door(&mut self, id: u32, position: Vec3) {
        self.doors.insert(
            id,
            SandboxDoor {
                id,
                position,
                open: false,
            },
        );
    }

    pub fn door(&self, id: u32) -> Option<&SandboxDoor> {
        self.doors.get(&id)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn has_model(&self, peer_id: &str) -> bool {
        self.loaded_models.contains_key(peer_id)
    }

    pub fn loaded_model_count(&self) -> usize {
        self.loaded_models.len()
    }

    /// Random walk on the ground plane, kept inside the arena.
    pub fn step(&mut self, dt: f32) {
        self.heading += self.rng.gen_range(-0.5..0.5);
        let direction = Vec3::new(self.heading.cos(), 0.0, self.heading.sin());
        let next = self.position + direction * (WALK_SPEED * dt);

        self.position = Vec3::new(
            next.x.clamp(-ARENA_HALF_EXTENT, ARENA_HALF_EXTENT),
            next.y,
            next.z.clamp(-ARENA_HALF_EXTENT, ARENA_HALF_EXTENT),
        );
    }

    /// Flips the nearest door within reach and returns its final state, which
    /// is what gets sent to the server.
    pub fn toggle_nearest_door(&mut self) -> Option<DoorEvent> {
        let position = self.position;
        let door = self
            .doors
            .values_mut()
            .filter(|door| door.position.distance(position) < DOOR_INTERACTION_RADIUS)
            .min_by(|a, b| {
                a.position
                    .distance(position)
                    .total_cmp(&b.position.distance(position))
            })?;

        if door.open {
            door.close();
        } else {
            door.open();
        }

        Some(DoorEvent {
            door_id: door.id,
            state: door.open,
        })
    }
}

impl World for SandboxWorld {
    fn local_position(&self) -> Vec3 {
        self.position
    }

    fn door_mut(&mut self, door_id: u32) -> Option<&mut dyn Door> {
        self.doors
            .get_mut(&door_id)
            .map(|door| door as &mut dyn Door)
    }

    fn peer_joined(&mut self, id: &str, model: &str, position: Vec3) {
        info!(
            "Loading model {:?} for {} at ({:.2}, {:.2}, {:.2})",
            model, id, position.x, position.y, position.z
        );
        self.loaded_models.insert(id.to_string(), model.to_string());
    }

    fn peer_left(&mut self, id: &str) {
        if self.loaded_models.remove(id).is_some() {
            info!("Removed model for {}", id);
        }
    }
}
