//! Wire protocol: one JSON object per UDP datagram, discriminated by `type`.
//!
//! ```json
//! {"type":"pos","id":"10.0.0.4:53011","x":1.0,"y":2.0,"z":0.5}
//! {"type":"door_toggle","door_id":5,"state":true}
//! {"type":"door_sync","door_id":5,"state":true}
//! {"type":"remove_player","player":"Alice"}
//! {"type":"players","players":[{"id":"10.0.0.4:53011","player":"Alice","model":"default","x":1.0,"y":2.0,"z":0.5}],"doors":{"5":true}}
//! ```

use crate::error::NetError;
use crate::{Vec3, DEFAULT_DISPLAY_NAME, DEFAULT_MODEL_TAG};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Client -> server position report.
    Pos(PositionReport),
    /// Client -> server intent to set a door.
    DoorToggle(DoorEvent),
    /// Server -> client confirmation of a door change.
    DoorSync(DoorEvent),
    /// Client -> server request to drop every record with this display name.
    RemovePlayer { player: String },
    /// Server -> client full snapshot.
    Players(Snapshot),
}

impl Message {
    /// Value of the `type` discriminator, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Pos(_) => "pos",
            Message::DoorToggle(_) => "door_toggle",
            Message::DoorSync(_) => "door_sync",
            Message::RemovePlayer { .. } => "remove_player",
            Message::Players(_) => "players",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    /// Sender's self-identification. Ignored by the server, which keys on
    /// the datagram's source address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl PositionReport {
    pub fn new(id: Option<String>, position: Vec3) -> Self {
        Self {
            id,
            x: position.x,
            y: position.y,
            z: position.z,
            player: None,
            model: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Payload shared by `door_toggle` and `door_sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorEvent {
    pub door_id: u32,
    /// `true` means open.
    pub state: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub players: Vec<PlayerEntry>,
    #[serde(default, deserialize_with = "door_ids::deserialize")]
    pub doors: BTreeMap<u32, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    /// `"ip:port"` of the peer as seen by the server.
    pub id: String,
    #[serde(default = "default_display_name")]
    pub player: String,
    #[serde(default = "default_model_tag")]
    pub model: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl PlayerEntry {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}

fn default_model_tag() -> String {
    DEFAULT_MODEL_TAG.to_string()
}

/// JSON object keys are always strings. Serializing `u32` keys is handled by
/// serde_json, but the tagged enum buffers its content before the map is
/// read, so keys arrive as plain strings and are parsed here.
mod door_ids {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use std::collections::BTreeMap;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u32, bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, bool>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, state)| {
                key.parse::<u32>()
                    .map(|door_id| (door_id, state))
                    .map_err(|_| D::Error::custom(format!("invalid door id {:?}", key)))
            })
            .collect()
    }
}

/// Serializes one message. Failures are `EncodeFailure`, never
/// `MalformedMessage`, which is reserved for inbound datagrams.
pub fn encode(message: &Message) -> Result<Vec<u8>, NetError> {
    serde_json::to_vec(message).map_err(NetError::EncodeFailure)
}

/// Decodes one datagram. Anything that is not a known, well-formed message
/// is a `MalformedMessage`; callers drop it and carry on.
pub fn decode(bytes: &[u8]) -> Result<Message, NetError> {
    Ok(serde_json::from_slice(bytes)?)
}
