//! # Sync Server Library
//!
//! Authoritative side of the position and door synchronization layer. The
//! server keeps the canonical list of connected peers and door states, and
//! pushes consolidated snapshots of both to every peer.
//!
//! ## Core Responsibilities
//!
//! ### Peer Registry
//! Every address that sends a valid `pos` datagram gets a record holding its
//! last position, display name, model tag and the time it was last heard
//! from. Records disappear when the peer goes silent for longer than the
//! client timeout, when a `remove_player` request names it, or when sending
//! to it fails.
//!
//! ### Door Replication
//! `door_toggle` requests overwrite the door table (last write wins) and are
//! echoed immediately to all peers as `door_sync`, without waiting for the
//! next snapshot.
//!
//! ### Snapshot Broadcasting
//! After each position report the server evicts stale peers and broadcasts a
//! `players` snapshot containing every peer and every known door. The
//! broadcast is symmetric; clients filter out their own entry.
//!
//! ## Architecture Design
//!
//! Two concurrent tasks share the registry and door table through one
//! `tokio::sync::RwLock`:
//! - **Listener**: awaits datagrams, decodes and dispatches them, and does
//!   the inline eviction + broadcast.
//! - **Liveness Sweep**: evicts stale peers on a fixed period even when no
//!   traffic arrives.
//!
//! Malformed datagrams and failed sends never stop either task.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod doors;
pub mod network;
pub mod registry;
