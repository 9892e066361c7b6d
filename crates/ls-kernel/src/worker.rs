//! The `Worker` — one OS thread advancing a disjoint subset of entities.
//!
//! A worker's life is a fixed phase cycle, repeated until its end tick:
//!
//! 1. **Admit**: drain the pending-add channel; each admitted entity has its
//!    cells registered with this worker's [`StateManager`] and joins the
//!    managed list.
//! 2. **Update**: call `update()` on every managed entity.  Entities
//!    reporting `Done` are collected for removal; subscription churn is
//!    applied immediately; offspring are collected for the spawn phase.
//! 3. **Spawn**: admit offspring bred during this tick's updates into this
//!    same worker (they first update next cycle).
//! 4. **Remove**: release every `Done` entity — exit callback, cells
//!    untracked, ownership cleared — and ship it to the group's retirement
//!    channel.  The group frees it one round later, so no thread still
//!    holds a reference taken during this tick's updates.
//! 5. **Frame barrier**, then `flip_all()`, then **flip barrier**: all
//!    writes staged during the update phase become globally visible here.
//! 6. **Cross barrier**: external index/partition collaborators rebuild at
//!    this point, via the cross-sync hook run by the round's leader.
//! 7. **Macro barrier** (groups with `tick_step > 1` only): one extra
//!    rendezvous that holds this worker back until the rest of the system
//!    reaches the macro boundary.
//!
//! The pending lists are single-consumer channels drained only by the
//! worker's own thread; the work group pushes onto them but never touches
//! `managed` directly.  Interruption is cooperative: the flag is observed at
//! cycle boundaries and barrier wakes, never mid-update.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use ls_agent::{EntityRegistry, Location, Managed, UpdateStatus};
use ls_core::{EntityId, GroupId, Tick, TickClock, TimeSlice, WorkerId};
use ls_state::StateManager;
use ls_sync::{Arrival, FlexiBarrier};
use tracing::{debug, info, trace};

use crate::error::{KernelError, KernelResult};
use crate::manager::{SharedCrossSync, fire_cross_sync};

// ── Shared handle state ───────────────────────────────────────────────────────

/// State visible to both the worker thread and outside observers.
pub(crate) struct WorkerShared {
    /// Ids of currently managed entities, for observation and load metrics.
    roster:       parking_lot::Mutex<Vec<EntityId>>,
    /// Entities pushed onto the add channel but not yet drained.
    pending_adds: AtomicUsize,
    /// Cooperative cancellation flag.
    interrupt:    AtomicBool,
}

impl WorkerShared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            roster:       parking_lot::Mutex::new(Vec::new()),
            pending_adds: AtomicUsize::new(0),
            interrupt:    AtomicBool::new(false),
        })
    }
}

/// The barrier set a worker synchronizes on each cycle.
pub(crate) struct WorkerBarriers {
    pub(crate) frame:      Arc<FlexiBarrier>,
    pub(crate) flip:       Arc<FlexiBarrier>,
    pub(crate) cross:      Arc<FlexiBarrier>,
    /// Present only when the owning group has `tick_step > 1`.
    pub(crate) macro_tick: Option<Arc<FlexiBarrier>>,
}

// ── Worker (handle) ──────────────────────────────────────────────────────────

/// Handle to one worker.  Owned by a [`WorkGroup`][crate::WorkGroup].
///
/// Before `start()` the thread-side state is held here, so entities can be
/// admitted, evicted, and migrated directly.  After `start()` that state
/// lives on the worker's own thread and all staging goes through the
/// pending-add channel.
pub struct Worker {
    id:     WorkerId,
    group:  GroupId,
    add_tx: Sender<Managed>,
    shared: Arc<WorkerShared>,
    /// Thread-side state; `None` once the thread has taken it.
    core:   Option<WorkerCore>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id:          WorkerId,
        group:       GroupId,
        barriers:    WorkerBarriers,
        end_tick:    Tick,
        tick_step:   u64,
        tick_millis: u32,
        retired_tx:  Sender<Managed>,
        registry:    EntityRegistry,
        cross_hook:  SharedCrossSync,
    ) -> Self {
        let (add_tx, add_rx) = crossbeam_channel::unbounded();
        let shared = WorkerShared::new();
        let core = WorkerCore {
            id,
            group,
            clock: TickClock::new(tick_millis),
            end_tick,
            tick_step,
            managed: Vec::new(),
            state: StateManager::new(),
            add_rx,
            retired_tx,
            barriers,
            shared: shared.clone(),
            registry,
            cross_hook,
        };
        Self { id, group, add_tx, shared, core: Some(core), handle: None }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Number of entities this worker is responsible for, optionally
    /// including entities staged but not yet drained from the add channel.
    /// The pending-inclusive count is what load-based assignment uses.
    pub fn entity_count(&self, include_pending: bool) -> usize {
        let managed = self.shared.roster.lock().len();
        if include_pending {
            managed + self.shared.pending_adds.load(Ordering::Relaxed)
        } else {
            managed
        }
    }

    /// Snapshot of the managed entity ids, in admission order.
    pub fn roster(&self) -> Vec<EntityId> {
        self.shared.roster.lock().clone()
    }

    /// Launch the worker thread.  Consumes the thread-side state.
    pub(crate) fn start(&mut self) -> KernelResult<()> {
        let core = self.core.take().ok_or(KernelError::AlreadyStarted)?;
        let name = format!("ls-worker-{}-{}", self.group.0, self.id.0);
        self.handle = Some(std::thread::Builder::new().name(name).spawn(move || core.run())?);
        Ok(())
    }

    /// Request cooperative cancellation.  Takes effect at the worker's next
    /// barrier wake; to unblock a waiting worker, cancel its barriers (see
    /// `WorkGroupManager::interrupt_all`).
    pub fn interrupt(&self) {
        self.shared.interrupt.store(true, Ordering::Relaxed);
    }

    /// Wait for the worker thread to finish.  Must be called before the
    /// worker is dropped.  Idempotent once joined.
    pub fn join(&mut self) -> KernelResult<()> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| KernelError::WorkerPanicked(self.id)),
            None if self.core.is_some() => Err(KernelError::NotStarted),
            None => Ok(()),
        }
    }

    /// Stage `managed` for admission at the worker's next cycle.
    pub(crate) fn schedule_add(&self, managed: Managed) {
        self.shared.pending_adds.fetch_add(1, Ordering::Relaxed);
        if self.add_tx.send(managed).is_err() {
            // Thread already gone; the unowned record is dropped safely.
            self.shared.pending_adds.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Admit `managed` immediately.  Only valid before `start()`.
    pub(crate) fn admit_direct(&mut self, managed: Managed) -> KernelResult<()> {
        match &mut self.core {
            Some(core) => {
                core.admit(managed);
                Ok(())
            }
            None => Err(KernelError::WorkersRunning),
        }
    }

    /// Remove and release the entity `id` immediately.  Only valid before
    /// `start()`.
    pub(crate) fn evict_managed(&mut self, id: EntityId) -> KernelResult<Managed> {
        let core = self.core.as_mut().ok_or(KernelError::WorkersRunning)?;
        core.remove_entity(id)
            .ok_or(KernelError::EntityNotFound { entity: id, worker: self.id })
    }

    /// Cells currently tracked by this worker's state manager.  Observable
    /// only before `start()`.
    pub(crate) fn tracked_cells(&self) -> Option<usize> {
        self.core.as_ref().map(|core| core.state.len())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // A worker that never ran still holds its entities; release them so
        // their records can be dropped.
        if let Some(core) = &mut self.core {
            core.release_all();
        }
        if self.handle.is_some() && !std::thread::panicking() {
            panic!("worker {} dropped without join()", self.id);
        }
    }
}

// ── WorkerCore (thread side) ─────────────────────────────────────────────────

/// State owned by the worker thread itself.  Nothing here is shared: the
/// managed list and state manager are mutated only from the owning thread.
pub(crate) struct WorkerCore {
    id:         WorkerId,
    group:      GroupId,
    clock:      TickClock,
    end_tick:   Tick,
    tick_step:  u64,
    managed:    Vec<Managed>,
    state:      StateManager,
    add_rx:     Receiver<Managed>,
    retired_tx: Sender<Managed>,
    barriers:   WorkerBarriers,
    shared:     Arc<WorkerShared>,
    registry:   EntityRegistry,
    cross_hook: SharedCrossSync,
}

impl WorkerCore {
    /// The phase cycle.  Runs until the end tick, an interrupt, or barrier
    /// cancellation.
    fn run(mut self) {
        info!(worker = %self.id, group = %self.group, "worker thread running");
        loop {
            if self.shared.interrupt.load(Ordering::Relaxed) {
                break;
            }

            self.drain_pending_adds();

            let now = self.clock.timeslice();
            trace!(
                worker = %self.id,
                tick = %now.tick,
                entities = self.managed.len(),
                "frame update",
            );
            let done = self.update_entities(now);
            self.process_removals(done);

            // Local time advances before the barriers, as the next cycle's
            // adds must already see the new tick.
            self.clock.advance_by(self.tick_step);
            let active = self.clock.current < self.end_tick;

            if self.barriers.frame.wait(1).is_interrupted() {
                break;
            }

            self.state.flip_all();

            if self.barriers.flip.wait(1).is_interrupted() {
                break;
            }

            match self.barriers.cross.wait(1) {
                Arrival::Leader => fire_cross_sync(&self.cross_hook, now.tick),
                Arrival::Interrupted => break,
                Arrival::Released => {}
            }

            // With tick_step > 1 we wait exactly once more, so this worker
            // cannot race into the next macro period before the rest of the
            // system reaches the boundary.  Skipped when that round can
            // never complete (end of run).
            if let Some(macro_tick) = &self.barriers.macro_tick {
                let extra_active = self.clock.current.0.saturating_sub(1) < self.end_tick.0;
                if extra_active && macro_tick.wait(1).is_interrupted() {
                    break;
                }
            }

            if !active {
                break;
            }
        }
        self.release_all();
        info!(
            worker = %self.id,
            group = %self.group,
            tick = %self.clock.current,
            "worker thread stopped",
        );
    }

    fn drain_pending_adds(&mut self) {
        while let Ok(managed) = self.add_rx.try_recv() {
            // Admit before decrementing so the load metric never dips below
            // the real count mid-handoff.
            self.admit(managed);
            self.shared.pending_adds.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Update every managed entity, applying subscription churn in place and
    /// admitting offspring afterwards.  Returns the ids that reported `Done`.
    fn update_entities(&mut self, now: TimeSlice) -> Vec<EntityId> {
        let mut done = Vec::new();
        let mut spawned: Vec<Managed> = Vec::new();

        for i in 0..self.managed.len() {
            let result = self.managed[i].update(now);

            for cell in &result.untrack {
                self.state.untrack(cell);
                self.managed[i].remove_subscription(cell);
            }
            for cell in &result.track {
                self.state.track(cell);
                self.managed[i].add_subscription(cell);
            }
            for child in result.spawn {
                spawned.push(Managed::new(child));
            }
            if result.status == UpdateStatus::Done {
                done.push(self.managed[i].id());
            }
        }

        // Spawn phase: offspring join this worker and first update next
        // cycle (they are appended after the iteration bound was taken).
        for child in spawned {
            debug!(worker = %self.id, entity = %child.id(), "admitting bred entity");
            self.admit(child);
        }

        done
    }

    /// Release every `Done` entity and ship it to the group.  Physical
    /// deletion happens group-side one round later.
    fn process_removals(&mut self, done: Vec<EntityId>) {
        for id in done {
            if let Some(managed) = self.remove_entity(id) {
                // A send failure means the group side is gone; ownership is
                // already released, so dropping locally is safe.
                let _ = self.retired_tx.send(managed);
            }
        }
    }

    /// Take responsibility for `managed`: claim ownership, track its cells,
    /// publish it in the roster and registry.
    fn admit(&mut self, mut managed: Managed) {
        debug!(worker = %self.id, entity = %managed.id(), "admitting entity");
        managed.set_owner(self.id);
        self.state.track_all(managed.subscriptions());
        self.shared.roster.lock().push(managed.id());
        self.registry
            .insert(managed.id(), Location { group: self.group, worker: self.id });
        managed.on_worker_enter(self.id);
        self.managed.push(managed);
    }

    /// Reverse of [`WorkerCore::admit`]; leaves the record unowned.
    fn release(&mut self, managed: &mut Managed) {
        debug!(worker = %self.id, entity = %managed.id(), "releasing entity");
        managed.on_worker_exit(self.id);
        self.state.untrack_all(managed.subscriptions());
        managed.release_owner(self.id);

        let id = managed.id();
        {
            let mut roster = self.shared.roster.lock();
            if let Some(pos) = roster.iter().position(|&e| e == id) {
                roster.remove(pos);
            }
        }
        self.registry.remove(id);
    }

    fn remove_entity(&mut self, id: EntityId) -> Option<Managed> {
        let idx = self.managed.iter().position(|m| m.id() == id)?;
        let mut managed = self.managed.remove(idx);
        self.release(&mut managed);
        Some(managed)
    }

    /// Release every remaining entity so their records can be dropped.
    fn release_all(&mut self) {
        while let Some(mut managed) = self.managed.pop() {
            self.release(&mut managed);
        }
    }
}
