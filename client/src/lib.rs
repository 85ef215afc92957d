//! # Simulation Client Library
//!
//! The client runs its own copy of the world: the ground, its own jumping
//! player, and puppets for everything the server reports. Every frame it
//! steps the local simulation, reports its player's position to the server
//! and mirrors the snapshot that comes back.
//!
//! ## Frame Flow
//!
//! 1. Sample the keyboard and turn it into [`shared::Controls`] and hot-keys
//! 2. Step the local world (input phase, then movement phase)
//! 3. Draw the store
//! 4. Send `"{name} {tag} {x} {y}"` on the dedicated port
//! 5. Merge the snapshot reply: move known entities, create puppets for new
//!    ones, drop players the server no longer reports
//!
//! The server may reject a move that collides on its side. In that case the
//! snapshot carries the reverted position and the merge snaps the local
//! player back to it.
//!
//! ## Time Control
//!
//! Pausing acts on the root clock, so every entity freezes together. Time
//! scaling acts on the local player's clock only.
//!
//! ## Module Organization
//!
//! - `game`: local world, snapshot merging, pause and time scale
//! - `input`: keyboard sampling and hot-key edge detection
//! - `network`: handshake and request/reply exchange with the server
//! - `peer`: direct two-peer position exchange without a server
//! - `rendering`: macroquad drawing of the store and HUD
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientGame;
//! use client::network::{ClientSync, SyncConfig};
//! use shared::Controls;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let sync = ClientSync::connect("127.0.0.1", 5555, SyncConfig::default()).await?;
//! let mut game = ClientGame::with_wall_clock(sync.player_name(), sync.ordinal())?;
//!
//! game.step(&Controls::default());
//! if let Some(report) = game.outgoing_input() {
//!     let snapshot = sync
//!         .send_input(&report.name, report.kind(), (report.x, report.y))
//!         .await?;
//!     game.merge_snapshot(&snapshot);
//! }
//! # Ok(())
//! # }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod peer;
pub mod rendering;
