//! Movement and input rules, owned by value by each entity.
//!
//! Every rule moves its entity through [`PhysicsEngine::plan`] so no single
//! sub-step exceeds `max_step_pixels`. Each sub-step is validated against the
//! world bounds and every other entity; the last valid position is kept.

use crate::physics::PhysicsEngine;
use crate::world::{Entity, EntityStore};

/// Device-independent input for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub jump: bool,
    pub dash_left: bool,
    pub dash_right: bool,
}

impl Controls {
    fn horizontal(&self) -> f64 {
        let right = (self.right || self.dash_right) as i8;
        let left = (self.left || self.dash_left) as i8;
        f64::from(right - left)
    }

    fn vertical(&self) -> f64 {
        f64::from(self.down as i8 - self.up as i8)
    }
}

/// Temporary speed boost that expires after `remaining` clock tics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedModifier {
    pub multiplier: f64,
    pub remaining: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovementRule {
    /// Moves at constant velocity, reflecting off walls and other entities.
    Bouncing,
    /// Falls under gravity and lands on whatever is below.
    Jumper,
}

impl MovementRule {
    pub fn apply(&self, entity: &mut Entity, others: &EntityStore, physics: &PhysicsEngine, dt: f64) {
        match self {
            MovementRule::Bouncing => bounce(entity, others, physics, dt),
            MovementRule::Jumper => fall(entity, others, physics, dt),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputRule {
    /// Runs left and right, jumps when grounded, dashes for `dash_duration` tics.
    Jumper {
        jump_velocity: f64,
        dash_multiplier: f64,
        dash_duration: f64,
    },
    /// Moves freely in four directions at `speed`.
    Flyer { speed: f64 },
}

impl InputRule {
    pub fn apply(
        &self,
        entity: &mut Entity,
        controls: &Controls,
        others: &EntityStore,
        physics: &PhysicsEngine,
        dt: f64,
    ) {
        expire_dash(entity, dt);

        match *self {
            InputRule::Jumper {
                jump_velocity,
                dash_multiplier,
                dash_duration,
            } => {
                if controls.jump && entity.motion.on_ground {
                    entity.motion.dy = jump_velocity;
                    entity.motion.on_ground = false;
                    entity.motion.jumping = true;
                }

                if (controls.dash_left || controls.dash_right) && entity.dash.is_none() {
                    entity.dash = Some(SpeedModifier {
                        multiplier: dash_multiplier,
                        remaining: dash_duration,
                    });
                }

                let move_x =
                    controls.horizontal() * entity.effective_speed() * dt * physics.pixels_per_meter;
                walk(entity, others, physics, move_x, 0.0);
            }
            InputRule::Flyer { speed } => {
                let distance = speed * dt * physics.pixels_per_meter;
                walk(
                    entity,
                    others,
                    physics,
                    controls.horizontal() * distance,
                    controls.vertical() * distance,
                );
            }
        }
    }
}

fn expire_dash(entity: &mut Entity, dt: f64) {
    if let Some(dash) = entity.dash.as_mut() {
        dash.remaining -= dt;
        if dash.remaining <= 0.0 {
            entity.dash = None;
        }
    }
}

/// Tries to move `entity` by `(dx, dy)` and reports whether it moved.
fn try_step(entity: &mut Entity, others: &EntityStore, physics: &PhysicsEngine, dx: f64, dy: f64) -> bool {
    let candidate = entity.rect.translated(dx, dy);
    if physics.is_blocked(entity.name(), &candidate, others) {
        return false;
    }
    entity.rect = candidate;
    true
}

fn bounce(entity: &mut Entity, others: &EntityStore, physics: &PhysicsEngine, dt: f64) {
    let move_x = entity.motion.dx * dt * physics.pixels_per_meter;
    let move_y = -entity.motion.dy * dt * physics.pixels_per_meter;
    let plan = physics.plan(move_x, move_y);

    let mut x_live = plan.increment_x != 0.0;
    let mut y_live = plan.increment_y != 0.0;

    for _ in 0..plan.steps {
        if x_live && !try_step(entity, others, physics, plan.increment_x, 0.0) {
            entity.motion.dx = -entity.motion.dx;
            x_live = false;
        }
        if y_live && !try_step(entity, others, physics, 0.0, plan.increment_y) {
            entity.motion.dy = -entity.motion.dy;
            y_live = false;
        }
        if !x_live && !y_live {
            break;
        }
    }
}

fn fall(entity: &mut Entity, others: &EntityStore, physics: &PhysicsEngine, dt: f64) {
    physics.apply_gravity_velocity(entity, dt);

    let move_y = -entity.motion.dy * dt * physics.pixels_per_meter;
    let plan = physics.plan(0.0, move_y);
    let descending = plan.increment_y > 0.0;

    for _ in 0..plan.steps {
        if !try_step(entity, others, physics, 0.0, plan.increment_y) {
            entity.motion.dy = 0.0;
            if descending {
                entity.motion.on_ground = true;
                entity.motion.jumping = false;
            }
            break;
        }
        if descending {
            entity.motion.on_ground = false;
        }
    }
}

/// Input-driven motion: each axis stops at its first blocked sub-step.
fn walk(entity: &mut Entity, others: &EntityStore, physics: &PhysicsEngine, move_x: f64, move_y: f64) {
    let plan = physics.plan(move_x, move_y);
    let mut x_live = plan.increment_x != 0.0;
    let mut y_live = plan.increment_y != 0.0;

    for _ in 0..plan.steps {
        if x_live {
            x_live = try_step(entity, others, physics, plan.increment_x, 0.0);
        }
        if y_live {
            y_live = try_step(entity, others, physics, 0.0, plan.increment_y);
        }
        if !x_live && !y_live {
            break;
        }
    }
}
