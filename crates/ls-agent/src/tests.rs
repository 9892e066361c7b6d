//! Unit tests for ls-agent.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ls_core::{EntityId, GroupId, Tick, TimeSlice, WorkerId};
use ls_state::{CellHandle, DoubleBuffered};

use crate::{Entity, EntityRegistry, Location, Managed, StartQueue, UpdateResult, UpdateStatus};

// ── Test entity ───────────────────────────────────────────────────────────────

struct Probe {
    id:          EntityId,
    start:       Tick,
    cell:        Arc<DoubleBuffered<u64>>,
    updates:     Arc<AtomicUsize>,
    list_builds: Arc<AtomicUsize>,
}

impl Probe {
    fn new(id: u64) -> Self {
        Self {
            id:          EntityId(id),
            start:       Tick::ZERO,
            cell:        DoubleBuffered::shared(0),
            updates:     Arc::new(AtomicUsize::new(0)),
            list_builds: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn starting_at(mut self, tick: u64) -> Self {
        self.start = Tick(tick);
        self
    }
}

impl Entity for Probe {
    fn id(&self) -> EntityId {
        self.id
    }

    fn start_tick(&self) -> Tick {
        self.start
    }

    fn subscriptions(&self) -> Vec<CellHandle> {
        self.list_builds.fetch_add(1, Ordering::Relaxed);
        vec![self.cell.handle()]
    }

    fn update(&mut self, _now: TimeSlice) -> UpdateResult {
        self.updates.fetch_add(1, Ordering::Relaxed);
        UpdateResult::continuing()
    }
}

// ── UpdateResult ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod result_tests {
    use super::*;

    #[test]
    fn constructors_set_status() {
        assert_eq!(UpdateResult::continuing().status, UpdateStatus::Continue);
        assert_eq!(UpdateResult::done().status, UpdateStatus::Done);
    }

    #[test]
    fn builder_accumulates_churn_and_spawn() {
        let cell = DoubleBuffered::shared(0_i32);
        let result = UpdateResult::continuing()
            .with_spawn(Box::new(Probe::new(9)))
            .with_track(cell.handle())
            .with_untrack(cell.handle());
        assert_eq!(result.spawn.len(), 1);
        assert_eq!(result.track.len(), 1);
        assert_eq!(result.untrack.len(), 1);
    }
}

// ── Managed lifecycle ─────────────────────────────────────────────────────────

#[cfg(test)]
mod managed_tests {
    use super::*;

    #[test]
    fn subscription_list_is_built_once() {
        let probe = Probe::new(1);
        let builds = probe.list_builds.clone();
        let mut managed = Managed::new(Box::new(probe));

        assert_eq!(managed.subscriptions().len(), 1);
        assert_eq!(managed.subscriptions().len(), 1);
        assert_eq!(builds.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn subscription_churn_updates_the_cache() {
        let mut managed = Managed::new(Box::new(Probe::new(1)));
        let extra = DoubleBuffered::shared(0_i32);
        let handle = extra.handle();

        assert_eq!(managed.subscriptions().len(), 1);
        managed.add_subscription(&handle);
        managed.add_subscription(&handle); // duplicate ignored
        assert_eq!(managed.subscriptions().len(), 2);
        managed.remove_subscription(&handle);
        assert_eq!(managed.subscriptions().len(), 1);
    }

    #[test]
    fn ownership_round_trip() {
        let mut managed = Managed::new(Box::new(Probe::new(2)));
        assert!(!managed.is_owned());

        managed.set_owner(WorkerId(3));
        assert_eq!(managed.owner(), WorkerId(3));

        managed.release_owner(WorkerId(3));
        assert!(!managed.is_owned());
    }

    #[test]
    #[should_panic(expected = "already managed")]
    fn double_claim_panics() {
        let mut managed = Managed::new(Box::new(Probe::new(3)));
        managed.set_owner(WorkerId(0));
        managed.set_owner(WorkerId(1));
    }

    #[test]
    #[should_panic(expected = "not by releasing worker")]
    fn release_from_wrong_worker_panics() {
        let mut managed = Managed::new(Box::new(Probe::new(4)));
        managed.set_owner(WorkerId(0));
        managed.release_owner(WorkerId(1));
    }

    #[test]
    #[should_panic(expected = "still owned")]
    fn dropping_an_owned_entity_panics() {
        let mut managed = Managed::new(Box::new(Probe::new(5)));
        managed.set_owner(WorkerId(0));
        drop(managed);
    }

    #[test]
    fn released_entity_unwraps_cleanly() {
        let mut managed = Managed::new(Box::new(Probe::new(6)));
        managed.set_owner(WorkerId(0));
        managed.release_owner(WorkerId(0));
        let entity = managed.into_entity();
        assert_eq!(entity.id(), EntityId(6));
    }
}

// ── StartQueue ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod loader_tests {
    use super::*;

    fn queue_of(starts: &[u64]) -> StartQueue {
        let mut queue = StartQueue::new();
        for (i, &start) in starts.iter().enumerate() {
            queue.push(Box::new(Probe::new(i as u64).starting_at(start)));
        }
        queue
    }

    #[test]
    fn pops_in_start_tick_order() {
        let mut queue = queue_of(&[5, 0, 3]);
        let due = queue.pop_due(Tick(5));
        let ids: Vec<_> = due.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![EntityId(1), EntityId(2), EntityId(0)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn ties_preserve_insertion_order() {
        let mut queue = queue_of(&[2, 2, 2]);
        let due = queue.pop_due(Tick(2));
        let ids: Vec<_> = due.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![EntityId(0), EntityId(1), EntityId(2)]);
    }

    #[test]
    fn pop_due_leaves_future_entries() {
        let mut queue = queue_of(&[0, 0, 2, 2]);
        assert_eq!(queue.pop_due(Tick(0)).len(), 2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next_tick(), Some(Tick(2)));

        assert_eq!(queue.pop_due(Tick(1)).len(), 0);
        assert_eq!(queue.pop_due(Tick(2)).len(), 2);
        assert_eq!(queue.next_tick(), None);
    }
}

// ── EntityRegistry ────────────────────────────────────────────────────────────

#[cfg(test)]
mod registry_tests {
    use super::*;

    fn at(group: u32, worker: u32) -> Location {
        Location { group: GroupId(group), worker: WorkerId(worker) }
    }

    #[test]
    fn insert_lookup_remove() {
        let registry = EntityRegistry::new();
        assert!(registry.insert(EntityId(1), at(0, 2)).is_none());
        assert_eq!(registry.location(EntityId(1)), Some(at(0, 2)));
        assert!(registry.contains(EntityId(1)));

        assert_eq!(registry.remove(EntityId(1)), Some(at(0, 2)));
        assert!(registry.is_empty());
    }

    #[test]
    fn reinsert_reports_previous_location() {
        let registry = EntityRegistry::new();
        registry.insert(EntityId(1), at(0, 0));
        assert_eq!(registry.insert(EntityId(1), at(0, 1)), Some(at(0, 0)));
    }

    #[test]
    fn clones_share_the_same_map() {
        let registry = EntityRegistry::new();
        let alias = registry.clone();
        registry.insert(EntityId(7), at(1, 0));
        assert_eq!(alias.location(EntityId(7)), Some(at(1, 0)));
    }

    #[test]
    fn ids_are_sorted() {
        let registry = EntityRegistry::new();
        for id in [5, 1, 3] {
            registry.insert(EntityId(id), at(0, 0));
        }
        assert_eq!(registry.ids(), vec![EntityId(1), EntityId(3), EntityId(5)]);
    }
}
