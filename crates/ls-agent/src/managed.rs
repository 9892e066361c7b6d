//! `Managed` — the kernel's ownership-checked wrapper around a boxed entity.
//!
//! A `Managed` record pairs the entity with its cached subscription list and
//! the id of the worker currently responsible for it.  The worker's managed
//! vector is the sole owning relationship; the entity itself never holds a
//! reference back to its worker (the id stored here exists for lookup and
//! sanity checks only).
//!
//! Dropping a record that still has an owner means some code path destroyed
//! an entity without releasing it first — a fatal programming error, because
//! the owning worker would be left flipping cells of a dead entity.  The
//! `Drop` impl panics with the violated invariant.

use std::sync::Arc;

use ls_core::{EntityId, Tick, TimeSlice, WorkerId};
use ls_state::CellHandle;

use crate::entity::{Entity, UpdateResult};

pub struct Managed {
    entity: Box<dyn Entity>,
    /// Built from `Entity::subscriptions` on first use, then kept in sync
    /// with `UpdateResult` churn by the owning worker.
    subscriptions: Option<Vec<CellHandle>>,
    /// The worker currently responsible, or `WorkerId::INVALID` if none.
    owner: WorkerId,
}

impl Managed {
    pub fn new(entity: Box<dyn Entity>) -> Self {
        Self { entity, subscriptions: None, owner: WorkerId::INVALID }
    }

    pub fn id(&self) -> EntityId {
        self.entity.id()
    }

    pub fn start_tick(&self) -> Tick {
        self.entity.start_tick()
    }

    /// The cached subscription list, built on first access.
    pub fn subscriptions(&mut self) -> &[CellHandle] {
        if self.subscriptions.is_none() {
            self.subscriptions = Some(self.entity.subscriptions());
        }
        self.subscriptions.as_deref().unwrap_or_default()
    }

    /// Record that the owning worker now also flips `cell` for this entity.
    pub fn add_subscription(&mut self, cell: &CellHandle) {
        let subs = self.subscriptions.get_or_insert_with(Vec::new);
        if !subs.iter().any(|c| Arc::ptr_eq(c, cell)) {
            subs.push(cell.clone());
        }
    }

    /// Record that `cell` is no longer flipped for this entity.
    pub fn remove_subscription(&mut self, cell: &CellHandle) {
        if let Some(subs) = &mut self.subscriptions {
            subs.retain(|c| !Arc::ptr_eq(c, cell));
        }
    }

    pub fn owner(&self) -> WorkerId {
        self.owner
    }

    pub fn is_owned(&self) -> bool {
        self.owner != WorkerId::INVALID
    }

    /// Mark `worker` as responsible for this entity.
    ///
    /// # Panics
    /// Panics if another worker already owns it — an entity must be released
    /// before it can be claimed again.
    pub fn set_owner(&mut self, worker: WorkerId) {
        assert!(
            !self.is_owned(),
            "entity {} is already managed by {}, cannot be claimed by {}",
            self.id(),
            self.owner,
            worker,
        );
        self.owner = worker;
    }

    /// Release ownership held by `worker`.
    ///
    /// # Panics
    /// Panics if `worker` is not the current owner — a release from the
    /// wrong worker means the single-ownership invariant already broke.
    pub fn release_owner(&mut self, worker: WorkerId) {
        assert!(
            self.owner == worker,
            "entity {} is owned by {}, not by releasing worker {}",
            self.id(),
            self.owner,
            worker,
        );
        self.owner = WorkerId::INVALID;
    }

    pub fn update(&mut self, now: TimeSlice) -> UpdateResult {
        self.entity.update(now)
    }

    pub fn on_worker_enter(&mut self, worker: WorkerId) {
        self.entity.on_worker_enter(worker);
    }

    pub fn on_worker_exit(&mut self, worker: WorkerId) {
        self.entity.on_worker_exit(worker);
    }

    /// Unwrap the entity.  Only an unowned record may be unwrapped; use
    /// [`Managed::release_owner`] first.
    pub fn into_entity(mut self) -> Box<dyn Entity> {
        assert!(
            !self.is_owned(),
            "entity {} still owned by {} when unwrapped",
            self.id(),
            self.owner,
        );
        self.owner = WorkerId::INVALID;
        // Move the box out; the tombstone keeps the record droppable.
        std::mem::replace(&mut self.entity, Box::new(Tombstone))
    }
}

impl Drop for Managed {
    fn drop(&mut self) {
        if self.is_owned() && !std::thread::panicking() {
            panic!(
                "entity {} still owned by {} at destruction",
                self.id(),
                self.owner,
            );
        }
    }
}

/// Inert stand-in left behind by `into_entity`.
struct Tombstone;

impl Entity for Tombstone {
    fn id(&self) -> EntityId {
        EntityId::INVALID
    }

    fn subscriptions(&self) -> Vec<CellHandle> {
        Vec::new()
    }

    fn update(&mut self, _now: TimeSlice) -> UpdateResult {
        UpdateResult::done()
    }
}
