//! Builders for the entities both server and client populate their worlds with.

use crate::behavior::{InputRule, MovementRule};
use crate::clock::{ClockError, ClockId, ClockTree};
use crate::world::{Entity, EntityKind, Motion, Rect, WorldBounds};
use crate::{
    DASH_DURATION_MS, DASH_MULTIPLIER, ENTITY_SIZE, GROUND_CLOCK_TIC, GROUND_HEIGHT,
    JUMP_VELOCITY, PLATFORM_CLOCK_TIC, PLATFORM_SPEED, PLAYER_CLOCK_TIC, PLAYER_RUN_SPEED,
    WORLD_HEIGHT, WORLD_WIDTH,
};

pub const GROUND_NAME: &str = "ground";
pub const PLATFORM_NAME: &str = "platform";

/// Deterministic spawn point for the player of peer `ordinal`.
///
/// Ordinals fill a column of slots above the ground, top to bottom, then
/// move one column right. Past the last column they wrap to the first slot.
pub fn spawn_rect(ordinal: u32) -> Rect {
    let rows = ((WORLD_HEIGHT - GROUND_HEIGHT) / ENTITY_SIZE) as u32 - 1;
    let columns = ((WORLD_WIDTH - ENTITY_SIZE) / (2.0 * ENTITY_SIZE)) as u32;

    let slot = ordinal.saturating_sub(1) % (rows * columns);
    let row = slot % rows + 1;
    let column = slot / rows;

    Rect::new(
        ENTITY_SIZE + f64::from(column) * 2.0 * ENTITY_SIZE,
        f64::from(row) * ENTITY_SIZE,
        ENTITY_SIZE,
        ENTITY_SIZE,
    )
}

/// Fixed floor spanning the bottom of the world.
pub fn ground(clocks: &mut ClockTree, bounds: WorldBounds) -> Result<Entity, ClockError> {
    let clock = clocks.add_clock(ClockId::ROOT, GROUND_CLOCK_TIC)?;
    Ok(Entity::new(
        GROUND_NAME,
        EntityKind::Fixed,
        Rect::new(0.0, bounds.height - GROUND_HEIGHT, bounds.width, GROUND_HEIGHT),
        clock,
    ))
}

pub fn bouncing_platform(clocks: &mut ClockTree) -> Result<Entity, ClockError> {
    let clock = clocks.add_clock(ClockId::ROOT, PLATFORM_CLOCK_TIC)?;
    Ok(Entity::new(
        PLATFORM_NAME,
        EntityKind::Platform,
        Rect::new(500.0, 200.0, ENTITY_SIZE, ENTITY_SIZE),
        clock,
    )
    .with_motion(Motion::new(PLATFORM_SPEED, 0.0))
    .with_movement(MovementRule::Bouncing))
}

/// Locally controlled player: runs, jumps and dashes on its own clock.
pub fn jumper(
    clocks: &mut ClockTree,
    name: impl Into<String>,
    rect: Rect,
) -> Result<Entity, ClockError> {
    let clock = clocks.add_clock(ClockId::ROOT, PLAYER_CLOCK_TIC)?;
    let dash_duration = clocks.millis_to_tics(clock, DASH_DURATION_MS);

    Ok(Entity::new(name, EntityKind::Player, rect, clock)
        .with_motion(Motion::new(PLAYER_RUN_SPEED, 0.0))
        .with_movement(MovementRule::Jumper)
        .with_input(InputRule::Jumper {
            jump_velocity: JUMP_VELOCITY,
            dash_multiplier: DASH_MULTIPLIER,
            dash_duration,
        }))
}

/// Player entity whose position is only ever set from the network.
pub fn puppet(name: impl Into<String>, kind: EntityKind, x: f64, y: f64) -> Entity {
    Entity::new(
        name,
        kind,
        Rect::new(x, y, ENTITY_SIZE, ENTITY_SIZE),
        ClockId::ROOT,
    )
}
