use log::{debug, info};
use shared::protocol::{player_name, InputMessage};
use shared::{
    scene, ClockError, ClockTree, Controls, Entity, EntityStore, PhysicsEngine, Simulation,
    SimulationStepper, Snapshot, WorldBounds, ROOT_CLOCK_TIC,
};

/// What the server did with one reported position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Accepted,
    /// The reported position collided and the previous one was kept.
    Rejected,
    Deleted,
    /// No entity with that name exists. Nothing was created.
    Unknown,
}

/// Authoritative world owned by the server loop.
#[derive(Debug)]
pub struct GameState {
    pub tick: u64,
    sim: Simulation,
    stepper: SimulationStepper,
}

impl GameState {
    pub fn new(bounds: WorldBounds, physics: PhysicsEngine) -> Result<Self, ClockError> {
        Ok(Self::with_clocks(ClockTree::wall(ROOT_CLOCK_TIC)?, bounds, physics))
    }

    pub fn with_clocks(clocks: ClockTree, bounds: WorldBounds, physics: PhysicsEngine) -> Self {
        Self {
            tick: 0,
            sim: Simulation::new(clocks, EntityStore::new(bounds), physics),
            stepper: SimulationStepper::new(),
        }
    }

    /// Adds the fixed ground and the bouncing platform every client also knows.
    pub fn populate_default_scene(&mut self) -> Result<(), ClockError> {
        let bounds = self.sim.store.bounds();
        let ground = scene::ground(&mut self.sim.clocks, bounds)?;
        let platform = scene::bouncing_platform(&mut self.sim.clocks)?;
        self.add_entity(ground);
        self.add_entity(platform);
        Ok(())
    }

    pub fn add_entity(&mut self, entity: Entity) {
        info!(
            "Added {:?} entity {} at ({}, {})",
            entity.kind(),
            entity.name(),
            entity.rect.x,
            entity.rect.y
        );
        self.sim.store.add(entity);
    }

    /// Creates the player entity for peer `ordinal` at its spawn point.
    pub fn add_player(&mut self, ordinal: u32) -> String {
        let name = player_name(ordinal);
        let spawn = scene::spawn_rect(ordinal);
        self.add_entity(scene::puppet(
            name.clone(),
            shared::EntityKind::Player,
            spawn.x,
            spawn.y,
        ));
        name
    }

    pub fn remove_entity(&mut self, name: &str) -> bool {
        let removed = self.sim.store.remove(name).is_some();
        if removed {
            info!("Removed entity {}", name);
        }
        removed
    }

    /// Applies a client's reported position, keeping the old one if it collides.
    pub fn apply_input(&mut self, input: &InputMessage) -> InputOutcome {
        if input.is_deletion() {
            return if self.remove_entity(&input.name) {
                InputOutcome::Deleted
            } else {
                InputOutcome::Unknown
            };
        }

        let Some(mut entity) = self.sim.store.detach(&input.name) else {
            debug!("Ignoring input for unknown entity {}", input.name);
            return InputOutcome::Unknown;
        };

        let previous = entity.rect;
        entity.set_position(input.x, input.y);

        let finite = input.x.is_finite() && input.y.is_finite();
        let outcome = if !finite || self.sim.physics.check_collisions(&entity, &self.sim.store) {
            debug!(
                "Rejected {} at ({}, {}), keeping ({}, {})",
                input.name, input.x, input.y, previous.x, previous.y
            );
            entity.rect = previous;
            InputOutcome::Rejected
        } else {
            InputOutcome::Accepted
        };

        self.sim.store.attach(entity);
        outcome
    }

    /// Advances server-owned movement by one tick.
    pub fn update(&mut self) {
        self.stepper.step_input(&mut self.sim, &Controls::default());
        self.stepper.step_movement(&mut self.sim);
        self.tick += 1;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.sim.store)
    }

    pub fn store(&self) -> &EntityStore {
        &self.sim.store
    }

    pub fn clocks_mut(&mut self) -> &mut ClockTree {
        &mut self.sim.clocks
    }

    pub fn entity_count(&self) -> usize {
        self.sim.store.len()
    }
}
