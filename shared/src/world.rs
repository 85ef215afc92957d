use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::behavior::{InputRule, MovementRule, SpeedModifier};
use crate::clock::ClockId;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable 64-bit FNV-1a hash, identical on every platform and process.
pub const fn kind_tag(label: &str) -> u64 {
    let bytes = label.as_bytes();
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

const PLAYER_TAG: u64 = kind_tag("player");
const PLATFORM_TAG: u64 = kind_tag("platform");
const FIXED_TAG: u64 = kind_tag("fixed");

/// Classification of an entity. Travels on the wire as a numeric tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Platform,
    Fixed,
    Custom(u64),
}

impl EntityKind {
    pub fn tag(self) -> u64 {
        match self {
            EntityKind::Player => PLAYER_TAG,
            EntityKind::Platform => PLATFORM_TAG,
            EntityKind::Fixed => FIXED_TAG,
            EntityKind::Custom(tag) => tag,
        }
    }

    pub fn from_tag(tag: u64) -> Self {
        match tag {
            PLAYER_TAG => EntityKind::Player,
            PLATFORM_TAG => EntityKind::Platform,
            FIXED_TAG => EntityKind::Fixed,
            other => EntityKind::Custom(other),
        }
    }

    /// Resolves a human-readable label, case-insensitively.
    pub fn from_label(label: &str) -> Self {
        Self::from_tag(kind_tag(&label.to_ascii_lowercase()))
    }

    /// Whether entities of this kind are mirrored between server and clients.
    pub fn is_synchronized(self) -> bool {
        matches!(self, EntityKind::Player | EntityKind::Platform)
    }
}

/// Axis-aligned bounding box. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn with_position(&self, x: f64, y: f64) -> Rect {
        Rect { x, y, ..*self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width: f64,
    pub height: f64,
}

impl WorldBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, rect: &Rect) -> bool {
        rect.x >= 0.0
            && rect.y >= 0.0
            && rect.x + rect.width <= self.width
            && rect.y + rect.height <= self.height
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::new(crate::WORLD_WIDTH, crate::WORLD_HEIGHT)
    }
}

/// Velocity and contact state. Positive `dy` points up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motion {
    pub dx: f64,
    pub dy: f64,
    pub on_ground: bool,
    pub jumping: bool,
}

impl Motion {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    kind: EntityKind,
    pub rect: Rect,
    pub motion: Motion,
    pub movement: Option<MovementRule>,
    pub input: Option<InputRule>,
    pub clock: ClockId,
    pub dash: Option<SpeedModifier>,
}

impl Entity {
    pub fn new(name: impl Into<String>, kind: EntityKind, rect: Rect, clock: ClockId) -> Self {
        Self {
            name: name.into(),
            kind,
            rect,
            motion: Motion::default(),
            movement: None,
            input: None,
            clock,
            dash: None,
        }
    }

    pub fn with_movement(mut self, rule: MovementRule) -> Self {
        self.movement = Some(rule);
        self
    }

    pub fn with_input(mut self, rule: InputRule) -> Self {
        self.input = Some(rule);
        self
    }

    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = motion;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn position(&self) -> (f64, f64) {
        (self.rect.x, self.rect.y)
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.rect.x = x;
        self.rect.y = y;
    }

    /// Horizontal speed including any active dash boost.
    pub fn effective_speed(&self) -> f64 {
        match &self.dash {
            Some(dash) => self.motion.dx * dash.multiplier,
            None => self.motion.dx,
        }
    }
}

/// Every entity of one process, keyed by unique name.
#[derive(Debug, Clone)]
pub struct EntityStore {
    entities: HashMap<String, Entity>,
    bounds: WorldBounds,
}

impl EntityStore {
    pub fn new(bounds: WorldBounds) -> Self {
        Self {
            entities: HashMap::new(),
            bounds,
        }
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Inserts `entity`, returning any entity it replaced under the same name.
    pub fn add(&mut self, entity: Entity) -> Option<Entity> {
        self.entities.insert(entity.name.clone(), entity)
    }

    pub fn remove(&mut self, name: &str) -> Option<Entity> {
        self.entities.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    /// Takes `name` out of the store so it can be mutated while the rest is read.
    /// Must be paired with [`EntityStore::attach`].
    pub fn detach(&mut self, name: &str) -> Option<Entity> {
        self.entities.remove(name)
    }

    pub fn attach(&mut self, entity: Entity) {
        self.entities.insert(entity.name.clone(), entity);
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new(WorldBounds::default())
    }
}
