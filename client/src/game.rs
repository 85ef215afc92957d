use log::{debug, info};
use shared::protocol::{is_player_name, InputMessage, Snapshot};
use shared::{
    scene, ClockError, ClockId, ClockTree, Controls, Entity, EntityStore, PhysicsEngine,
    Simulation, SimulationStepper, WorldBounds, ROOT_CLOCK_TIC,
};

/// Counts of what one snapshot merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// The client's local world: its own player, the ground and server-driven puppets.
#[derive(Debug)]
pub struct ClientGame {
    sim: Simulation,
    stepper: SimulationStepper,
    player_name: String,
}

impl ClientGame {
    pub fn new(
        player_name: impl Into<String>,
        ordinal: u32,
        mut clocks: ClockTree,
        bounds: WorldBounds,
        physics: PhysicsEngine,
    ) -> Result<Self, ClockError> {
        let player_name = player_name.into();
        let mut store = EntityStore::new(bounds);

        store.add(scene::ground(&mut clocks, bounds)?);
        store.add(scene::jumper(
            &mut clocks,
            player_name.clone(),
            scene::spawn_rect(ordinal),
        )?);

        Ok(Self {
            sim: Simulation::new(clocks, store, physics),
            stepper: SimulationStepper::new(),
            player_name,
        })
    }

    /// Game on the process's wall clock with the shared scene tuning.
    pub fn with_wall_clock(player_name: impl Into<String>, ordinal: u32) -> Result<Self, ClockError> {
        Self::new(
            player_name,
            ordinal,
            ClockTree::wall(ROOT_CLOCK_TIC)?,
            WorldBounds::default(),
            shared::scene_physics(),
        )
    }

    pub fn step(&mut self, controls: &Controls) {
        self.stepper.step(&mut self.sim, controls);
    }

    pub fn local_player(&self) -> Option<&Entity> {
        self.sim.store.get(&self.player_name)
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    /// Position report for the local player, if it still exists.
    pub fn outgoing_input(&self) -> Option<InputMessage> {
        self.local_player().map(|player| {
            InputMessage::new(player.name(), player.kind(), player.rect.x, player.rect.y)
        })
    }

    /// Mirrors the server's view into the local store.
    ///
    /// Known entities are moved to the reported position without running any
    /// rule, unknown ones become puppets, and players missing from the
    /// snapshot are dropped. The local player is never dropped.
    pub fn merge_snapshot(&mut self, snapshot: &Snapshot) -> MergeReport {
        let mut report = MergeReport::default();

        for entry in &snapshot.entries {
            if entry.is_deletion() {
                continue;
            }

            match self.sim.store.get_mut(&entry.name) {
                Some(entity) => {
                    entity.set_position(entry.x, entry.y);
                    report.updated += 1;
                }
                None => {
                    debug!("Creating puppet {} at ({}, {})", entry.name, entry.x, entry.y);
                    self.sim
                        .store
                        .add(scene::puppet(entry.name.clone(), entry.kind(), entry.x, entry.y));
                    report.created += 1;
                }
            }
        }

        let departed: Vec<String> = self
            .sim
            .store
            .names()
            .into_iter()
            .filter(|name| {
                is_player_name(name) && *name != self.player_name && !snapshot.contains(name)
            })
            .collect();

        for name in departed {
            info!("{} left the game", name);
            self.sim.store.remove(&name);
            report.removed += 1;
        }

        report
    }

    /// Pauses or resumes the whole world. Returns whether it is now paused.
    pub fn toggle_pause(&mut self) -> bool {
        let paused = self.sim.clocks.toggle_pause(ClockId::ROOT);
        info!("Game {}", if paused { "paused" } else { "resumed" });
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.sim.clocks.is_paused(ClockId::ROOT)
    }

    /// Speeds up or slows down only the local player. Returns the new scale.
    pub fn adjust_player_time_scale(&mut self, step: f64) -> Option<f64> {
        let clock = self.local_player()?.clock;
        let scale = self.sim.clocks.adjust_time_scale(clock, step);
        info!("Player time scale {:.1}", scale);
        Some(scale)
    }

    pub fn player_time_scale(&self) -> Option<f64> {
        self.local_player()
            .map(|player| self.sim.clocks.time_scale(player.clock))
    }

    pub fn store(&self) -> &EntityStore {
        &self.sim.store
    }

    pub fn frame(&self) -> u64 {
        self.stepper.frame()
    }
}
