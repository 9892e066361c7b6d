//! The `WorkGroup` — a fixed pool of workers advancing in lock-step.
//!
//! A group owns its workers, the bookkeeping for which entities exist where,
//! and the countdown that translates its configured `tick_step` into the
//! global tick schedule:
//!
//! - On a **macro-active** tick (`tick_offset == 0`) the group's workers run
//!   a full cycle and contribute to the shared barriers themselves; the
//!   group only advances its staging clock, admits newly eligible entities,
//!   and frees last round's retirees.
//! - On a **skipped** tick the workers are parked on the group's private
//!   macro barrier, and the group covers their absence by contributing
//!   `workers.len()` units to each shared barrier on their behalf — without
//!   ever blocking the orchestrator thread.
//! - The macro barrier itself receives the group's final unit on the last
//!   skipped tick of each period, releasing the workers into the next one.
//!
//! Entity admission is staged: `schedule_entity` parks entities in a
//! start-tick-ordered queue, and each macro-active flip phase admits those
//! whose start tick has been reached.  Removal is two-staged: workers ship
//! retired entities over a channel, and the group frees them one round
//! later, guaranteeing no thread still holds a reference taken during the
//! update phase that retired them.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use ls_agent::{Entity, EntityRegistry, Managed, StartQueue};
use ls_core::{EntityId, GroupId, KernelConfig, Tick, WorkerId};
use ls_sync::FlexiBarrier;
use tracing::{debug, info};

use crate::error::{KernelError, KernelResult};
use crate::manager::{PhaseBarriers, SharedCrossSync, fire_cross_sync};
use crate::worker::{Worker, WorkerBarriers};

// ── Assignment strategy ──────────────────────────────────────────────────────

/// How a group picks a worker for a new entity.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssignStrategy {
    /// Cycle through the workers in order.  O(1), and spreads N entities as
    /// evenly as arithmetic allows.
    #[default]
    RoundRobin,
    /// Scan for the worker with the fewest entities, counting ones still in
    /// its pending-add channel.  O(workers) per assignment — fine off the
    /// steady-state hot path.
    LeastLoaded,
}

// ── Group configuration ──────────────────────────────────────────────────────

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupConfig {
    /// Number of worker threads.  Fixed for the group's lifetime.
    pub workers: usize,
    /// Global ticks per worker cycle.  Fixed for the group's lifetime.
    pub tick_step: u64,
    /// Strategy used when staging entities from the start queue.
    pub strategy: AssignStrategy,
}

impl GroupConfig {
    pub fn new(workers: usize) -> Self {
        Self { workers, tick_step: 1, strategy: AssignStrategy::default() }
    }

    pub fn with_tick_step(mut self, tick_step: u64) -> Self {
        self.tick_step = tick_step;
        self
    }

    pub fn with_strategy(mut self, strategy: AssignStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub(crate) fn validate(&self) -> KernelResult<()> {
        if self.workers == 0 {
            return Err(KernelError::Config("a group needs at least one worker".into()));
        }
        if self.tick_step == 0 {
            return Err(KernelError::Config("tick_step must be at least 1".into()));
        }
        Ok(())
    }
}

// ── WorkGroup ────────────────────────────────────────────────────────────────

pub struct WorkGroup {
    id:      GroupId,
    config:  GroupConfig,
    workers: Vec<Worker>,

    barriers:      Option<PhaseBarriers>,
    /// Private rendezvous for `tick_step > 1`, sized `workers + 1`.
    macro_barrier: Option<Arc<FlexiBarrier>>,

    /// Countdown within the macro period; `0` means this tick is active.
    tick_offset:     u64,
    /// The tick the next staging pass admits entities for.
    next_stage_tick: Tick,
    /// Round-robin cursor.
    next_assign:     usize,

    start_queue: StartQueue,
    retired_tx:  Sender<Managed>,
    retired_rx:  Receiver<Managed>,
    /// Retirees collected last round, freed at the next collection point.
    to_free:     Vec<Managed>,

    started:    bool,
    registry:   EntityRegistry,
    cross_hook: SharedCrossSync,
}

impl WorkGroup {
    pub(crate) fn new(
        id:         GroupId,
        config:     GroupConfig,
        registry:   EntityRegistry,
        cross_hook: SharedCrossSync,
    ) -> Self {
        let (retired_tx, retired_rx) = crossbeam_channel::unbounded();
        Self {
            id,
            config,
            workers: Vec::new(),
            barriers: None,
            macro_barrier: None,
            tick_offset: 0,
            next_stage_tick: Tick::ZERO,
            next_assign: 0,
            start_queue: StartQueue::new(),
            retired_tx,
            retired_rx,
            to_free: Vec::new(),
            started: false,
            registry,
            cross_hook,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn tick_step(&self) -> u64 {
        self.config.tick_step
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Worker count from the configuration, valid before `init_workers`.
    pub(crate) fn configured_workers(&self) -> usize {
        self.config.workers
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn worker(&self, id: WorkerId) -> KernelResult<&Worker> {
        self.workers
            .get(id.index())
            .ok_or(KernelError::InvalidWorkerReference { group: self.id, worker: id })
    }

    /// Entities queued for admission but not yet staged.
    pub fn pending_start_count(&self) -> usize {
        self.start_queue.len()
    }

    // ── Construction phases (manager-driven) ─────────────────────────────

    /// Build the worker pool against the shared barriers.  The private
    /// macro barrier is sized `workers + 1`: one unit per worker plus the
    /// group's own covering contribution.
    pub(crate) fn init_workers(&mut self, barriers: &PhaseBarriers, kernel: &KernelConfig) {
        self.macro_barrier =
            (self.config.tick_step > 1).then(|| FlexiBarrier::shared(self.config.workers + 1));

        for i in 0..self.config.workers {
            let worker_barriers = WorkerBarriers {
                frame:      barriers.frame.clone(),
                flip:       barriers.flip.clone(),
                cross:      barriers.cross.clone(),
                macro_tick: self.macro_barrier.clone(),
            };
            self.workers.push(Worker::new(
                WorkerId(i as u32),
                self.id,
                worker_barriers,
                kernel.end_tick(),
                self.config.tick_step,
                kernel.tick_millis,
                self.retired_tx.clone(),
                self.registry.clone(),
                self.cross_hook.clone(),
            ));
        }
        self.barriers = Some(barriers.clone());
        info!(group = %self.id, workers = self.config.workers, tick_step = self.config.tick_step, "group initialized");
    }

    pub(crate) fn start_all(&mut self) -> KernelResult<()> {
        for worker in &mut self.workers {
            worker.start()?;
        }
        self.tick_offset = 0;
        self.next_stage_tick = Tick::ZERO;
        self.started = true;
        info!(group = %self.id, "group started");
        Ok(())
    }

    pub(crate) fn interrupt_all(&self) {
        for worker in &self.workers {
            worker.interrupt();
        }
        if let Some(macro_barrier) = &self.macro_barrier {
            macro_barrier.cancel();
        }
    }

    pub(crate) fn join_all(&mut self) -> KernelResult<()> {
        for worker in &mut self.workers {
            worker.join()?;
        }
        Ok(())
    }

    // ── Entity admission and migration ───────────────────────────────────

    /// Queue `entity` for staged admission once its start tick is reached.
    pub fn schedule_entity(&mut self, entity: Box<dyn Entity>) {
        self.start_queue.push(entity);
    }

    /// Assign `entity` to a worker right now, bypassing the start queue.
    /// Before `start_all` the entity is admitted immediately; afterwards it
    /// lands in the chosen worker's pending-add channel and joins at that
    /// worker's next cycle.
    pub fn assign_entity(
        &mut self,
        entity:   Box<dyn Entity>,
        strategy: AssignStrategy,
    ) -> KernelResult<WorkerId> {
        if self.workers.is_empty() {
            return Err(KernelError::BarriersNotInitialized);
        }
        let idx = self.select_worker(strategy);
        let id = WorkerId(idx as u32);
        let managed = Managed::new(entity);
        if self.started {
            self.workers[idx].schedule_add(managed);
        } else {
            self.workers[idx].admit_direct(managed)?;
        }
        Ok(id)
    }

    /// Admit `entity` into a specific worker.  Only valid before `start_all`.
    pub fn admit(&mut self, entity: Box<dyn Entity>, to: WorkerId) -> KernelResult<()> {
        self.ensure_stopped()?;
        self.check_worker(to)?;
        self.workers[to.index()].admit_direct(Managed::new(entity))
    }

    /// Remove the entity from a worker and hand it back.  Only valid before
    /// `start_all`.
    pub fn evict(&mut self, entity: EntityId, from: WorkerId) -> KernelResult<Box<dyn Entity>> {
        self.ensure_stopped()?;
        self.check_worker(from)?;
        Ok(self.workers[from.index()].evict_managed(entity)?.into_entity())
    }

    /// Move an entity between workers: its cells leave `from`'s state
    /// manager and are re-registered with `to`'s.  Only valid before
    /// `start_all` — while running, ownership may only change at phase
    /// boundaries the workers themselves drive.
    pub fn migrate(&mut self, entity: EntityId, from: WorkerId, to: WorkerId) -> KernelResult<()> {
        self.ensure_stopped()?;
        self.check_worker(from)?;
        self.check_worker(to)?;
        debug!(group = %self.id, entity = %entity, %from, %to, "migrating entity");
        let managed = self.workers[from.index()].evict_managed(entity)?;
        self.workers[to.index()].admit_direct(managed)
    }

    // ── Per-global-tick phase calls (orchestrator thread) ────────────────

    /// Frame phase.  Active ticks advance the staging clock to the tick the
    /// workers will process next; skipped ticks cover the parked workers.
    pub(crate) fn wait_frame_tick(&mut self, _now: Tick) {
        if self.tick_offset == 0 {
            self.next_stage_tick = self.next_stage_tick + self.config.tick_step;
        } else if let Some(barriers) = &self.barriers {
            barriers.frame.contribute(self.workers.len());
        }
    }

    /// Flip phase.  Active ticks are the staging/collection point: admit
    /// newly eligible entities and free last round's retirees.
    pub(crate) fn wait_flip_buffers(&mut self, _now: Tick) {
        if self.tick_offset == 0 {
            self.stage_entities();
            self.collect_retired();
        } else if let Some(barriers) = &self.barriers {
            barriers.flip.contribute(self.workers.len());
        }
    }

    /// Cross-sync phase.  If the group's covering contribution completes
    /// the round, the group runs the leader's cross-sync duty.
    pub(crate) fn wait_cross_sync(&mut self, now: Tick) {
        if self.tick_offset != 0 {
            if let Some(barriers) = &self.barriers {
                if barriers.cross.contribute(self.workers.len()) {
                    fire_cross_sync(&self.cross_hook, now);
                }
            }
        }
    }

    /// Macro phase: run the countdown, releasing the parked workers on the
    /// last skipped tick of each period.
    pub(crate) fn wait_macro_time_tick(&mut self) {
        if self.tick_offset == 1 {
            if let Some(macro_barrier) = &self.macro_barrier {
                macro_barrier.contribute(1);
            }
        }
        if self.tick_offset == 0 {
            self.tick_offset = self.config.tick_step;
        }
        self.tick_offset -= 1;
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn select_worker(&mut self, strategy: AssignStrategy) -> usize {
        match strategy {
            AssignStrategy::RoundRobin => {
                let idx = self.next_assign;
                self.next_assign = (idx + 1) % self.workers.len();
                idx
            }
            AssignStrategy::LeastLoaded => {
                let mut best = 0;
                let mut best_load = usize::MAX;
                for (idx, worker) in self.workers.iter().enumerate() {
                    let load = worker.entity_count(true);
                    if load < best_load {
                        best = idx;
                        best_load = load;
                    }
                }
                best
            }
        }
    }

    /// Admit every queued entity whose start tick has been reached, in
    /// start-tick order, spreading them with the configured strategy.
    fn stage_entities(&mut self) {
        let due = self.start_queue.pop_due(self.next_stage_tick);
        for entity in due {
            let idx = self.select_worker(self.config.strategy);
            debug!(
                group = %self.id,
                entity = %entity.id(),
                worker = idx,
                tick = %self.next_stage_tick,
                "staging entity",
            );
            self.workers[idx].schedule_add(Managed::new(entity));
        }
    }

    /// Free last round's retirees, then bank this round's.  The one-round
    /// delay guarantees no stale reference from the retiring tick's update
    /// phase is still live when the entity is dropped.
    fn collect_retired(&mut self) {
        let freed = std::mem::take(&mut self.to_free);
        if !freed.is_empty() {
            debug!(group = %self.id, count = freed.len(), "freeing retired entities");
        }
        drop(freed);

        while let Ok(managed) = self.retired_rx.try_recv() {
            self.to_free.push(managed);
        }
    }

    fn ensure_stopped(&self) -> KernelResult<()> {
        if self.started { Err(KernelError::WorkersRunning) } else { Ok(()) }
    }

    fn check_worker(&self, id: WorkerId) -> KernelResult<()> {
        if id.index() < self.workers.len() {
            Ok(())
        } else {
            Err(KernelError::InvalidWorkerReference { group: self.id, worker: id })
        }
    }
}
