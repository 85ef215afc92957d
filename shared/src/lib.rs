//! # Shared simulation core
//!
//! Everything the authoritative server and its clients must agree on: the
//! virtual clock tree, the entity store, collision and stepped movement, the
//! phase stepper, and the text wire protocol.

pub mod behavior;
pub mod clock;
pub mod physics;
pub mod protocol;
pub mod scene;
pub mod simulation;
pub mod world;

pub use behavior::{Controls, InputRule, MovementRule, SpeedModifier};
pub use clock::{ClockError, ClockId, ClockTree, ManualTime, MonotonicTime, Phase, TimeSource};
pub use physics::{PhysicsEngine, StepPlan};
pub use protocol::{HandshakeReply, InputMessage, PeerPosition, ProtocolError, Snapshot, SnapshotEntry};
pub use simulation::{Simulation, SimulationStepper};
pub use world::{Entity, EntityKind, EntityStore, Motion, Rect, WorldBounds};

pub const WORLD_WIDTH: f64 = 800.0;
pub const WORLD_HEIGHT: f64 = 600.0;
pub const DEFAULT_BASE_PORT: u16 = 5555;

pub const ENTITY_SIZE: f64 = 50.0;
pub const GROUND_HEIGHT: f64 = 50.0;

pub const GRAVITY: f64 = 0.05;
pub const PIXELS_PER_METER: f64 = 16.0;
pub const MAX_STEP_PIXELS: f64 = 20.0;

pub const PLAYER_RUN_SPEED: f64 = 0.45;
pub const JUMP_VELOCITY: f64 = 1.5;
pub const PLATFORM_SPEED: f64 = 0.30;
pub const DASH_MULTIPLIER: f64 = 3.0;
pub const DASH_DURATION_MS: i64 = 500;

/// Wall milliseconds per root tic.
pub const ROOT_CLOCK_TIC: i64 = 1;
pub const PLAYER_CLOCK_TIC: i64 = 10;
pub const PLATFORM_CLOCK_TIC: i64 = 10;
pub const GROUND_CLOCK_TIC: i64 = 64;

pub const MIN_TIME_SCALE: f64 = 0.5;
pub const MAX_TIME_SCALE: f64 = 2.0;
pub const TIME_SCALE_STEP: f64 = 0.1;

/// Physics tuning shared by server and client scenes.
pub fn scene_physics() -> PhysicsEngine {
    PhysicsEngine::new(GRAVITY, PIXELS_PER_METER, MAX_STEP_PIXELS)
}
