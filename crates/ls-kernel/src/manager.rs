//! The `WorkGroupManager` — the single orchestrating thread.
//!
//! The manager never runs entity logic.  It creates the three shared phase
//! barriers exactly once, hands them to every group, and then drives the
//! four phase calls once per global tick.  Each shared barrier is sized
//! `1 + Σ workers` across all groups: every worker accounts for one unit
//! per round (in person on active ticks, covered by its group on skipped
//! ticks) and the final unit is the manager's own blocking wait — the one
//! place the orchestrator deliberately blocks, and therefore the place a
//! stalled worker manifests.
//!
//! The manager also owns the [`EntityRegistry`] (the explicit, passed-by-
//! reference replacement for a global "all entities" list) and the
//! cross-sync hook run once per round by the cross barrier's leader.

use std::sync::Arc;

use ls_agent::EntityRegistry;
use ls_core::{GroupId, KernelConfig, Tick, TickClock};
use ls_sync::{Arrival, FlexiBarrier};
use parking_lot::Mutex;
use tracing::info;

use crate::error::{KernelError, KernelResult};
use crate::group::{GroupConfig, WorkGroup};

// ── Cross-machine / spatial-index sync hook ──────────────────────────────────

/// Callback invoked by the cross barrier's leader with the just-completed
/// tick.  This is where an external partition manager or spatial index
/// attaches; the kernel ignores anything it does.
pub type CrossSyncHook = Arc<dyn Fn(Tick) + Send + Sync>;

/// Settable-at-any-time slot for the hook, shared with every group and
/// worker.  Locked only long enough to clone the `Arc`.
pub(crate) type SharedCrossSync = Arc<Mutex<Option<CrossSyncHook>>>;

pub(crate) fn fire_cross_sync(hook: &SharedCrossSync, tick: Tick) {
    let hook = hook.lock().clone();
    if let Some(hook) = hook {
        hook(tick);
    }
}

// ── Shared phase barriers ────────────────────────────────────────────────────

/// The three barriers every group's workers share, created once by
/// `init_all`.
#[derive(Clone)]
pub(crate) struct PhaseBarriers {
    pub(crate) frame: Arc<FlexiBarrier>,
    pub(crate) flip:  Arc<FlexiBarrier>,
    pub(crate) cross: Arc<FlexiBarrier>,
}

// ── WorkGroupManager ─────────────────────────────────────────────────────────

pub struct WorkGroupManager {
    config:     KernelConfig,
    clock:      TickClock,
    groups:     Vec<WorkGroup>,
    barriers:   Option<PhaseBarriers>,
    registry:   EntityRegistry,
    cross_hook: SharedCrossSync,
    started:    bool,
}

impl WorkGroupManager {
    pub fn new(config: KernelConfig) -> Self {
        let clock = config.make_clock();
        Self {
            config,
            clock,
            groups: Vec::new(),
            barriers: None,
            registry: EntityRegistry::new(),
            cross_hook: Arc::new(Mutex::new(None)),
            started: false,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The next global tick the manager will drive.
    pub fn current_tick(&self) -> Tick {
        self.clock.current
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn groups(&self) -> &[WorkGroup] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> KernelResult<&WorkGroup> {
        self.groups
            .get(id.index())
            .ok_or(KernelError::InvalidGroupReference(id))
    }

    pub fn group_mut(&mut self, id: GroupId) -> KernelResult<&mut WorkGroup> {
        self.groups
            .get_mut(id.index())
            .ok_or(KernelError::InvalidGroupReference(id))
    }

    /// Install (or replace) the cross-sync hook.  Takes effect at the next
    /// cross barrier round.
    pub fn set_cross_sync_hook(&self, hook: CrossSyncHook) {
        *self.cross_hook.lock() = Some(hook);
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Register a new group.  All groups must be created before `init_all`
    /// fixes the shared barrier size.
    pub fn create_group(&mut self, config: GroupConfig) -> KernelResult<GroupId> {
        if self.barriers.is_some() {
            return Err(KernelError::BarriersAlreadyInitialized);
        }
        config.validate()?;
        let id = GroupId(self.groups.len() as u32);
        self.groups.push(WorkGroup::new(
            id,
            config,
            self.registry.clone(),
            self.cross_hook.clone(),
        ));
        Ok(id)
    }

    /// Create the shared barriers and build every group's worker pool.
    pub fn init_all(&mut self) -> KernelResult<()> {
        if self.barriers.is_some() {
            return Err(KernelError::BarriersAlreadyInitialized);
        }
        let total_workers: usize = self.groups.iter().map(|g| g.configured_workers()).sum();
        let threshold = 1 + total_workers;
        let barriers = PhaseBarriers {
            frame: FlexiBarrier::shared(threshold),
            flip:  FlexiBarrier::shared(threshold),
            cross: FlexiBarrier::shared(threshold),
        };
        for group in &mut self.groups {
            group.init_workers(&barriers, &self.config);
        }
        info!(groups = self.groups.len(), workers = total_workers, "shared barriers initialized");
        self.barriers = Some(barriers);
        Ok(())
    }

    /// Launch every worker thread.
    pub fn start_all(&mut self) -> KernelResult<()> {
        if self.barriers.is_none() {
            return Err(KernelError::BarriersNotInitialized);
        }
        if self.started {
            return Err(KernelError::AlreadyStarted);
        }
        for group in &mut self.groups {
            group.start_all()?;
        }
        self.started = true;
        Ok(())
    }

    /// Drive one global tick: the four phase sweeps across every group,
    /// blocking once per shared barrier.  Advances the global clock.
    pub fn wait_all_groups(&mut self) -> KernelResult<()> {
        if !self.started {
            return Err(KernelError::NotStarted);
        }
        let barriers = self.barriers.as_ref().ok_or(KernelError::BarriersNotInitialized)?.clone();
        let now = self.clock.current;

        for group in &mut self.groups {
            group.wait_frame_tick(now);
        }
        if barriers.frame.wait(1).is_interrupted() {
            return Err(KernelError::Interrupted);
        }

        for group in &mut self.groups {
            group.wait_flip_buffers(now);
        }
        if barriers.flip.wait(1).is_interrupted() {
            return Err(KernelError::Interrupted);
        }

        for group in &mut self.groups {
            group.wait_cross_sync(now);
        }
        match barriers.cross.wait(1) {
            Arrival::Leader => fire_cross_sync(&self.cross_hook, now),
            Arrival::Interrupted => return Err(KernelError::Interrupted),
            Arrival::Released => {}
        }

        // No blocking wait here: macro barriers are internal to each group.
        for group in &mut self.groups {
            group.wait_macro_time_tick();
        }

        self.clock.advance_by(1);
        Ok(())
    }

    /// Drive global ticks to the configured end, then join every worker.
    pub fn run(&mut self) -> KernelResult<()> {
        if !self.started {
            return Err(KernelError::NotStarted);
        }
        while self.clock.current < self.config.end_tick() {
            self.wait_all_groups()?;
        }
        self.join_all()
    }

    /// Cancel every barrier and flag every worker.  Blocked threads wake
    /// interrupted; call `join_all` afterwards to reap them.
    pub fn interrupt_all(&self) {
        info!("interrupting all work groups");
        if let Some(barriers) = &self.barriers {
            barriers.frame.cancel();
            barriers.flip.cancel();
            barriers.cross.cancel();
        }
        for group in &self.groups {
            group.interrupt_all();
        }
    }

    pub fn join_all(&mut self) -> KernelResult<()> {
        if !self.started {
            return Err(KernelError::NotStarted);
        }
        for group in &mut self.groups {
            group.join_all()?;
        }
        Ok(())
    }
}
