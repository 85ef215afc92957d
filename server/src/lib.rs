//! # Authoritative Simulation Server
//!
//! This library hosts the authoritative copy of the shared world. Clients
//! report the position of the entity they own; the server validates every
//! report against its own collision state and answers with a snapshot of all
//! synchronized entities.
//!
//! ## Connection Lifecycle
//!
//! A peer sends `READY` to the rendezvous port. The server assigns the next
//! ordinal `n`, binds a dedicated socket on `base_port + n`, creates the
//! player entity `Player{n}` at its spawn point and replies `"{n} {port}"`.
//! From then on the peer talks only to its dedicated port, in strict
//! request/reply alternation:
//!
//! ```text
//! client                      server
//!   | "Player1 <tag> 120 100"  |
//!   |------------------------->|  apply, revert on collision
//!   |  "Player1 <tag> 100 100;platform <tag> 530 200;"
//!   |<-------------------------|
//! ```
//!
//! A report of `(-1, -1)` deletes the entity. A peer that stays silent for
//! longer than the idle timeout is dropped and its entity removed.
//!
//! ## Architecture
//!
//! One task listens on the rendezvous socket and one task per peer listens
//! on its dedicated socket. None of them touch the world. They forward each
//! request over an `mpsc` channel to a single loop that owns the
//! [`game::GameState`], and wait for the reply text on a `oneshot` channel.
//! The same loop runs the movement tick and the idle-timeout sweep, so world
//! mutation is serialized without any lock.
//!
//! ## Module Organization
//!
//! - `peer_manager`: ordinals, dedicated ports, last-seen times and listener tasks
//! - `game`: the authoritative world, input validation and snapshots
//! - `network`: sockets, listener tasks and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::bind(ServerConfig::default()).await?;
//!     server.game_mut().populate_default_scene()?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
pub mod peer_manager;
