//! The entity contract consumed by the kernel.
//!
//! The kernel never looks inside an entity: it calls [`Entity::update`] once
//! per cycle and reacts to the returned [`UpdateResult`].  Everything an
//! update wants to change about the world beyond its own cells — spawning
//! offspring, retiring itself, growing or shrinking its tracked state — is
//! expressed through the result value, never by touching kernel structures
//! directly.  That keeps the update phase free of cross-thread mutation.

use ls_core::{EntityId, Tick, TimeSlice, WorkerId};
use ls_state::CellHandle;

// ── UpdateStatus ─────────────────────────────────────────────────────────────

/// Whether an entity wants to keep running after this update.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UpdateStatus {
    /// Keep scheduling this entity.
    Continue,
    /// Retire this entity; the worker removes it at the next phase boundary.
    Done,
}

// ── UpdateResult ─────────────────────────────────────────────────────────────

/// Everything an entity's update reports back to its worker.
///
/// Beyond the continue/done status, an update may hand the worker offspring
/// entities to admit (`spawn`) and adjust which cells the worker flips on
/// its behalf (`track` / `untrack`).  Subscription churn is applied by the
/// worker immediately after the entity's own update returns, so a cell
/// tracked here is flipped starting with the current tick's commit phase.
pub struct UpdateResult {
    pub status:  UpdateStatus,
    /// Offspring to admit into the same worker, effective next cycle.
    pub spawn:   Vec<Box<dyn Entity>>,
    /// Cells to start flipping for this entity.
    pub track:   Vec<CellHandle>,
    /// Cells to stop flipping for this entity.
    pub untrack: Vec<CellHandle>,
}

impl UpdateResult {
    /// Plain "keep running, nothing changed".
    pub fn continuing() -> Self {
        Self {
            status:  UpdateStatus::Continue,
            spawn:   Vec::new(),
            track:   Vec::new(),
            untrack: Vec::new(),
        }
    }

    /// Plain "retire me".
    pub fn done() -> Self {
        Self { status: UpdateStatus::Done, ..Self::continuing() }
    }

    pub fn with_spawn(mut self, child: Box<dyn Entity>) -> Self {
        self.spawn.push(child);
        self
    }

    pub fn with_track(mut self, cell: CellHandle) -> Self {
        self.track.push(cell);
        self
    }

    pub fn with_untrack(mut self, cell: CellHandle) -> Self {
        self.untrack.push(cell);
        self
    }
}

// ── Entity ───────────────────────────────────────────────────────────────────

/// A simulated entity, opaque to the kernel.
///
/// Implementations must be `Send`: an entity lives on exactly one worker
/// thread at a time but may be constructed elsewhere and migrated between
/// workers at phase boundaries.
///
/// During `update` an entity may freely `read()` any cell it holds a handle
/// to (its own or other entities') — reads return the value committed at the
/// end of the previous tick.  Writes must go only to the entity's own cells.
pub trait Entity: Send {
    /// Stable identity, assigned by whoever constructs the entity.
    fn id(&self) -> EntityId;

    /// The first tick this entity is eligible to run.  Admission control
    /// compares this against the staging clock; it has no meaning once the
    /// entity is admitted.
    fn start_tick(&self) -> Tick {
        Tick::ZERO
    }

    /// The cells this entity owns.  Called once at admission and cached by
    /// the kernel; later changes must go through [`UpdateResult`] churn.
    fn subscriptions(&self) -> Vec<CellHandle>;

    /// Advance this entity by one of its ticks.
    fn update(&mut self, now: TimeSlice) -> UpdateResult;

    /// Called after this entity is admitted into a worker.
    fn on_worker_enter(&mut self, _worker: WorkerId) {}

    /// Called before this entity leaves its worker (migration or removal).
    fn on_worker_exit(&mut self, _worker: WorkerId) {}
}
