//! Hierarchical virtual clocks.
//!
//! Every clock lives in a [`ClockTree`] arena and is addressed by a [`ClockId`].
//! The root (index 0) converts wall time into tics; every other clock rescales
//! its parent's time through its own tic rate. A tic rate is the number of
//! milliseconds one local unit represents, so `parent_now * parent_tic / tic`
//! re-expresses the parent's reading at this clock's granularity and composes
//! through any depth of nesting.
//!
//! Each clock can be paused independently. Pausing a clock freezes its own
//! reading and, through the rescaling above, the readings of all descendants.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::{MAX_TIME_SCALE, MIN_TIME_SCALE};

/// Source of wall-clock milliseconds for root clocks.
pub trait TimeSource: Send + Sync {
    /// Milliseconds elapsed on a monotonic clock. Must never decrease.
    fn now_millis(&self) -> i64;
}

/// Monotonic wall time measured from the moment the source was created.
#[derive(Debug, Clone)]
pub struct MonotonicTime {
    epoch: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now_millis(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

/// Manually driven time, shared between clones.
///
/// Lets tests advance "wall time" deterministically while a [`ClockTree`]
/// holds another handle to the same counter.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    millis: Arc<AtomicI64>,
}

impl ManualTime {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start_millis)),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClockError {
    #[error("tic rate must be positive, got {0}")]
    NonPositiveTicRate(i64),

    #[error("no clock {0:?} in this tree")]
    UnknownClock(ClockId),

    #[error("time scale must be finite and non-negative, got {0}")]
    InvalidTimeScale(f64),
}

/// Stable handle to a clock inside the [`ClockTree`] that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockId(usize);

impl ClockId {
    /// The root clock, rooted at wall time.
    pub const ROOT: ClockId = ClockId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Independently tracked delta-time cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Input,
    Movement,
}

#[derive(Debug, Clone)]
struct ClockRecord {
    parent: Option<ClockId>,
    tic_rate: i64,
    /// Root: raw tics at creation, subtracted from every reading.
    /// Nested: offset added to the rescaled parent reading.
    origin: i64,
    /// Raw reading captured when the clock was paused.
    paused_at: Option<i64>,
    paused_total: i64,
    time_scale: f64,
    input_cursor: i64,
    movement_cursor: i64,
}

impl ClockRecord {
    fn local_time(&self, raw: i64) -> i64 {
        (self.paused_at.unwrap_or(raw) - self.paused_total).max(0)
    }

    fn cursor_mut(&mut self, phase: Phase) -> &mut i64 {
        match phase {
            Phase::Input => &mut self.input_cursor,
            Phase::Movement => &mut self.movement_cursor,
        }
    }
}

/// Arena of virtual clocks rooted at a single wall-time source.
///
/// Accessors taking a [`ClockId`] panic if the id was minted by another
/// tree. Ids are never invalidated, so an id from this tree is always valid.
pub struct ClockTree {
    source: Box<dyn TimeSource>,
    clocks: Vec<ClockRecord>,
}

impl ClockTree {
    /// Creates a tree whose root advances one tic every `root_tic` wall milliseconds.
    pub fn new(source: impl TimeSource + 'static, root_tic: i64) -> Result<Self, ClockError> {
        if root_tic <= 0 {
            return Err(ClockError::NonPositiveTicRate(root_tic));
        }

        let origin = source.now_millis() / root_tic;
        let root = ClockRecord {
            parent: None,
            tic_rate: root_tic,
            origin,
            paused_at: None,
            paused_total: 0,
            time_scale: 1.0,
            input_cursor: 0,
            movement_cursor: 0,
        };

        Ok(Self {
            source: Box::new(source),
            clocks: vec![root],
        })
    }

    /// Creates a tree driven by the process's monotonic clock.
    pub fn wall(root_tic: i64) -> Result<Self, ClockError> {
        Self::new(MonotonicTime::new(), root_tic)
    }

    pub fn root(&self) -> ClockId {
        ClockId::ROOT
    }

    /// Adds a clock anchored to `parent`, `tic_rate` milliseconds per local tic.
    pub fn add_clock(&mut self, parent: ClockId, tic_rate: i64) -> Result<ClockId, ClockError> {
        if tic_rate <= 0 {
            return Err(ClockError::NonPositiveTicRate(tic_rate));
        }
        if parent.0 >= self.clocks.len() {
            return Err(ClockError::UnknownClock(parent));
        }

        let id = ClockId(self.clocks.len());
        let mut record = ClockRecord {
            parent: Some(parent),
            tic_rate,
            origin: 0,
            paused_at: None,
            paused_total: 0,
            time_scale: 1.0,
            input_cursor: 0,
            movement_cursor: 0,
        };

        let start = record.local_time(self.rescale(&record, Some(self.reading(parent))));
        record.input_cursor = start;
        record.movement_cursor = start;
        self.clocks.push(record);

        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    pub fn parent(&self, id: ClockId) -> Option<ClockId> {
        self.clocks[id.0].parent
    }

    /// Current logical time of `id` in its own tics.
    pub fn now(&self, id: ClockId) -> i64 {
        self.reading(id).0
    }

    /// Scaled time elapsed on `id` since the previous call for `phase`.
    ///
    /// Returns 0 while the clock is paused and never returns a negative value.
    pub fn delta(&mut self, id: ClockId, phase: Phase) -> f64 {
        if self.clocks[id.0].paused_at.is_some() {
            return 0.0;
        }

        let now = self.now(id);
        let record = &mut self.clocks[id.0];
        let scale = record.time_scale;
        let cursor = record.cursor_mut(phase);
        let elapsed = now - *cursor;
        *cursor = now;

        (elapsed as f64 * scale).max(0.0)
    }

    pub fn pause(&mut self, id: ClockId) {
        if self.clocks[id.0].paused_at.is_none() {
            let raw = self.raw_time(id);
            self.clocks[id.0].paused_at = Some(raw);
        }
    }

    pub fn unpause(&mut self, id: ClockId) {
        if let Some(paused_at) = self.clocks[id.0].paused_at {
            let raw = self.raw_time(id);
            let record = &mut self.clocks[id.0];
            record.paused_total += raw - paused_at;
            record.paused_at = None;
        }
    }

    /// Flips the pause state and returns whether the clock is now paused.
    pub fn toggle_pause(&mut self, id: ClockId) -> bool {
        if self.is_paused(id) {
            self.unpause(id);
            false
        } else {
            self.pause(id);
            true
        }
    }

    pub fn is_paused(&self, id: ClockId) -> bool {
        self.clocks[id.0].paused_at.is_some()
    }

    pub fn tic_rate(&self, id: ClockId) -> i64 {
        self.clocks[id.0].tic_rate
    }

    /// Converts a wall-clock duration into tics of `id`.
    pub fn millis_to_tics(&self, id: ClockId, millis: i64) -> f64 {
        millis as f64 / self.clocks[id.0].tic_rate as f64
    }

    pub fn time_scale(&self, id: ClockId) -> f64 {
        self.clocks[id.0].time_scale
    }

    pub fn set_time_scale(&mut self, id: ClockId, scale: f64) -> Result<(), ClockError> {
        if !scale.is_finite() || scale < 0.0 {
            return Err(ClockError::InvalidTimeScale(scale));
        }
        self.clocks[id.0].time_scale = scale;
        Ok(())
    }

    /// Nudges the time scale by `step`, clamped to the playable range.
    pub fn adjust_time_scale(&mut self, id: ClockId, step: f64) -> f64 {
        let record = &mut self.clocks[id.0];
        record.time_scale = (record.time_scale + step).clamp(MIN_TIME_SCALE, MAX_TIME_SCALE);
        record.time_scale
    }

    /// `(now, tic_rate)` of `id`, evaluated from the root downwards.
    fn reading(&self, id: ClockId) -> (i64, i64) {
        let mut lineage = vec![id];
        let mut cursor = self.clocks[id.0].parent;
        while let Some(parent) = cursor {
            lineage.push(parent);
            cursor = self.clocks[parent.0].parent;
        }

        let mut parent_reading = None;
        for clock in lineage.into_iter().rev() {
            let record = &self.clocks[clock.0];
            let now = record.local_time(self.rescale(record, parent_reading));
            parent_reading = Some((now, record.tic_rate));
        }

        parent_reading.unwrap_or((0, 1))
    }

    /// Unpaused reading of `id` before pause accounting.
    fn raw_time(&self, id: ClockId) -> i64 {
        let record = &self.clocks[id.0];
        let parent_reading = record.parent.map(|parent| self.reading(parent));
        self.rescale(record, parent_reading)
    }

    fn rescale(&self, record: &ClockRecord, parent_reading: Option<(i64, i64)>) -> i64 {
        match parent_reading {
            None => self.source.now_millis() / record.tic_rate - record.origin,
            Some((parent_now, parent_tic)) => {
                record.origin + (parent_now * parent_tic) / record.tic_rate
            }
        }
    }
}

impl std::fmt::Debug for ClockTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockTree")
            .field("clocks", &self.clocks)
            .finish_non_exhaustive()
    }
}
