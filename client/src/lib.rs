//! # Sync Client Library
//!
//! Client side of the position and door synchronization layer. A session
//! uploads the local player's position every update tick, keeps a table of
//! remote peers reconciled against the server's snapshots, smooths their
//! motion, and mirrors door states into the game scene.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The `SyncSession`: socket, background listener and the update cycle that
//! ties everything else together.
//!
//! ### Peers Module (`peers`)
//! Remote peer table. Only the update cycle touches it, so it lives outside
//! any lock; the listener hands messages over through a channel.
//!
//! ### Interpolation Module (`interpolation`)
//! Exponential smoothing of render positions toward snapshot targets.
//!
//! ### World Module (`world`)
//! The `World` and `Door` traits the session drives the scene through.
//!
//! ### Sandbox Module (`sandbox`)
//! A headless `World` used by the client binary and the tests.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::network::SyncSession;
//! use client::sandbox::SandboxWorld;
//! use std::time::Instant;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = SyncSession::connect(ClientConfig::default()).await?;
//!     let mut world = SandboxWorld::with_default_doors(0);
//!     let mut ticker = session.ticker();
//!
//!     loop {
//!         ticker.tick().await;
//!         session.tick(Instant::now(), &mut world).await;
//!     }
//! }
//! ```

pub mod config;
pub mod interpolation;
pub mod network;
pub mod peers;
pub mod sandbox;
pub mod world;
