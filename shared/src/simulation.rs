use log::trace;
use std::collections::HashMap;

use crate::behavior::Controls;
use crate::clock::{ClockId, ClockTree, Phase};
use crate::physics::PhysicsEngine;
use crate::world::EntityStore;

/// The mutable world of one process: its clocks, its entities and its physics tuning.
#[derive(Debug)]
pub struct Simulation {
    pub clocks: ClockTree,
    pub store: EntityStore,
    pub physics: PhysicsEngine,
}

impl Simulation {
    pub fn new(clocks: ClockTree, store: EntityStore, physics: PhysicsEngine) -> Self {
        Self {
            clocks,
            store,
            physics,
        }
    }
}

/// Runs the input and movement phases over every entity.
///
/// Each phase samples a clock's delta at most once per frame, so entities
/// sharing a clock advance by the same amount regardless of iteration order.
#[derive(Debug, Default)]
pub struct SimulationStepper {
    frame: u64,
}

impl SimulationStepper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Runs both phases, input first, and advances the frame counter.
    pub fn step(&mut self, sim: &mut Simulation, controls: &Controls) {
        self.step_input(sim, controls);
        self.step_movement(sim);
        self.frame += 1;
        trace!("Completed simulation frame {}", self.frame);
    }

    pub fn step_input(&mut self, sim: &mut Simulation, controls: &Controls) {
        let mut deltas = HashMap::new();

        for name in sim.store.names() {
            let Some(mut entity) = sim.store.detach(&name) else {
                continue;
            };

            if let Some(rule) = entity.input {
                let dt = sample(&mut deltas, &mut sim.clocks, entity.clock, Phase::Input);
                rule.apply(&mut entity, controls, &sim.store, &sim.physics, dt);
            }

            sim.store.attach(entity);
        }
    }

    pub fn step_movement(&mut self, sim: &mut Simulation) {
        let mut deltas = HashMap::new();

        for name in sim.store.names() {
            let Some(mut entity) = sim.store.detach(&name) else {
                continue;
            };

            if let Some(rule) = entity.movement {
                let dt = sample(&mut deltas, &mut sim.clocks, entity.clock, Phase::Movement);
                rule.apply(&mut entity, &sim.store, &sim.physics, dt);
            }

            sim.store.attach(entity);
        }
    }
}

fn sample(deltas: &mut HashMap<ClockId, f64>, clocks: &mut ClockTree, id: ClockId, phase: Phase) -> f64 {
    *deltas
        .entry(id)
        .or_insert_with(|| clocks.delta(id, phase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{InputRule, MovementRule};
    use crate::clock::ManualTime;
    use crate::world::{Entity, EntityKind, Motion, Rect};
    use assert_approx_eq::assert_approx_eq;

    fn setup() -> (ManualTime, Simulation, ClockId) {
        let time = ManualTime::new(0);
        let mut clocks = ClockTree::new(time.clone(), 1).unwrap();
        let clock = clocks.add_clock(ClockId::ROOT, 10).unwrap();
        let sim = Simulation::new(
            clocks,
            EntityStore::default(),
            PhysicsEngine::new(0.05, 16.0, 20.0),
        );
        (time, sim, clock)
    }

    fn platform(name: &str, x: f64, y: f64, clock: ClockId) -> Entity {
        Entity::new(name, EntityKind::Platform, Rect::new(x, y, 50.0, 50.0), clock)
            .with_motion(Motion::new(0.3, 0.0))
            .with_movement(MovementRule::Bouncing)
    }

    #[test]
    fn test_shared_clock_gives_equal_deltas() {
        let (time, mut sim, clock) = setup();
        sim.store.add(platform("a", 100.0, 0.0, clock));
        sim.store.add(platform("b", 100.0, 200.0, clock));
        let mut stepper = SimulationStepper::new();

        time.advance(100);
        stepper.step_movement(&mut sim);

        let a = sim.store.get("a").unwrap().rect.x;
        let b = sim.store.get("b").unwrap().rect.x;
        assert_approx_eq!(a, 148.0);
        assert_approx_eq!(b, 148.0);
    }

    #[test]
    fn test_paused_clock_freezes_entities() {
        let (time, mut sim, clock) = setup();
        sim.store.add(platform("a", 100.0, 0.0, clock));
        let mut stepper = SimulationStepper::new();

        sim.clocks.pause(ClockId::ROOT);
        time.advance(1_000);
        stepper.step(&mut sim, &Controls::default());

        assert_eq!(sim.store.get("a").unwrap().rect.x, 100.0);
        assert_eq!(stepper.frame(), 1);
    }

    #[test]
    fn test_input_visible_to_same_frame_movement() {
        let (time, mut sim, clock) = setup();
        sim.store.add(Entity::new(
            "ground",
            EntityKind::Fixed,
            Rect::new(0.0, 550.0, 800.0, 50.0),
            clock,
        ));

        let mut player = Entity::new(
            "Player1",
            EntityKind::Player,
            Rect::new(100.0, 500.0, 50.0, 50.0),
            clock,
        )
        .with_movement(MovementRule::Jumper)
        .with_input(InputRule::Jumper {
            jump_velocity: 1.5,
            dash_multiplier: 3.0,
            dash_duration: 50.0,
        });
        player.motion.on_ground = true;
        sim.store.add(player);

        let mut stepper = SimulationStepper::new();
        let jump = Controls {
            jump: true,
            ..Controls::default()
        };

        time.advance(100);
        stepper.step(&mut sim, &jump);

        let player = sim.store.get("Player1").unwrap();
        assert!(player.rect.y < 500.0);
        assert!(player.motion.jumping);
    }

    #[test]
    fn test_entities_without_rules_are_untouched() {
        let (time, mut sim, clock) = setup();
        sim.store.add(Entity::new(
            "rock",
            EntityKind::Fixed,
            Rect::new(10.0, 10.0, 50.0, 50.0),
            clock,
        ));
        let mut stepper = SimulationStepper::new();

        time.advance(500);
        stepper.step(&mut sim, &Controls::default());

        assert_eq!(sim.store.get("rock").unwrap().position(), (10.0, 10.0));
        assert_eq!(sim.store.len(), 1);
    }
}
