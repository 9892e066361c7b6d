//! `StateManager` — the per-worker registry of double-buffered cells.
//!
//! Each worker owns exactly one `StateManager`.  During the buffer-flip phase
//! the worker calls [`StateManager::flip_all`], which commits every tracked
//! cell in registration order.  Registration order matters only for
//! reproducibility: cells are independent, but a deterministic flip order
//! makes test failures repeatable.
//!
//! A cell must be tracked by at most one `StateManager` at a time.  That
//! invariant is maintained by the migration code in the kernel crate, not
//! here; this type only guarantees duplicate-free membership within one
//! manager.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::cell::CellHandle;

/// Identity key for a cell: the `Arc` allocation address.
///
/// Two handles compare equal here iff they point at the same cell.  The
/// vtable half of the fat pointer is dropped so the key is stable regardless
/// of which trait-object view produced the handle.
#[inline]
fn cell_key(cell: &CellHandle) -> usize {
    Arc::as_ptr(cell) as *const () as usize
}

/// Insertion-ordered, duplicate-free set of tracked cells.
#[derive(Default)]
pub struct StateManager {
    /// Registration order — the order `flip_all` commits in.
    cells: Vec<CellHandle>,
    /// Membership index keyed on cell identity.
    index: FxHashSet<usize>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `cell`.  No-op if it is already tracked.
    pub fn track(&mut self, cell: &CellHandle) {
        if self.index.insert(cell_key(cell)) {
            self.cells.push(cell.clone());
        }
    }

    /// Stop tracking `cell`.  No-op if it is not tracked.
    pub fn untrack(&mut self, cell: &CellHandle) {
        if self.index.remove(&cell_key(cell)) {
            let key = cell_key(cell);
            self.cells.retain(|c| cell_key(c) != key);
        }
    }

    /// Track every cell in `cells`, in order.
    pub fn track_all(&mut self, cells: &[CellHandle]) {
        for cell in cells {
            self.track(cell);
        }
    }

    /// Untrack every cell in `cells`.
    pub fn untrack_all(&mut self, cells: &[CellHandle]) {
        for cell in cells {
            self.untrack(cell);
        }
    }

    /// Commit every tracked cell, in registration order.
    pub fn flip_all(&self) {
        for cell in &self.cells {
            cell.flip();
        }
    }

    /// True if `cell` is currently tracked by this manager.
    pub fn is_tracked(&self, cell: &CellHandle) -> bool {
        self.index.contains(&cell_key(cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
