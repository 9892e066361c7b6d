//! `EntityRegistry` — which entities exist, and where.
//!
//! The registry is the explicit replacement for a process-wide "all agents"
//! list: the manager owns one, and collaborators that legitimately need
//! global enumeration receive a clone (the clone shares the same map).
//! Workers insert on admission and remove on retirement, so the lock is a
//! plain mutex taken for O(1) map operations.

use std::sync::Arc;

use ls_core::{EntityId, GroupId, WorkerId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Where an entity currently lives.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Location {
    pub group:  GroupId,
    pub worker: WorkerId,
}

/// Shared registry of live entities.  Cloning is cheap and aliases the same
/// underlying map.
#[derive(Clone, Default)]
pub struct EntityRegistry {
    inner: Arc<Mutex<FxHashMap<EntityId, Location>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` at `location`, returning the previous location if the
    /// entity was already registered.
    pub fn insert(&self, id: EntityId, location: Location) -> Option<Location> {
        self.inner.lock().insert(id, location)
    }

    /// Remove `id`, returning where it was.
    pub fn remove(&self, id: EntityId) -> Option<Location> {
        self.inner.lock().remove(&id)
    }

    pub fn location(&self, id: EntityId) -> Option<Location> {
        self.inner.lock().get(&id).copied()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.inner.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Snapshot of all live ids, sorted for deterministic enumeration.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.inner.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
