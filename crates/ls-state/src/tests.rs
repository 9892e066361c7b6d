//! Unit tests for ls-state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::{CellHandle, DoubleBuffered, Flip, StateManager};

// ── DoubleBuffered basics ─────────────────────────────────────────────────────

#[cfg(test)]
mod cell_tests {
    use super::*;

    #[test]
    fn read_returns_initial_value() {
        let cell = DoubleBuffered::new(7_i32);
        assert_eq!(cell.read(), 7);
        assert!(!cell.is_dirty());
    }

    #[test]
    fn write_is_invisible_until_flip() {
        let cell = DoubleBuffered::new(1_i32);
        cell.write(2);
        assert_eq!(cell.read(), 1);
        assert_eq!(cell.peek_pending(), 2);
        assert!(cell.is_dirty());

        cell.flip();
        assert_eq!(cell.read(), 2);
        assert!(!cell.is_dirty());
    }

    #[test]
    fn flip_without_write_is_a_noop() {
        let cell = DoubleBuffered::new(5_i32);
        cell.flip();
        assert_eq!(cell.read(), 5);
    }

    #[test]
    fn last_write_in_a_tick_wins() {
        let cell = DoubleBuffered::new(0_i32);
        cell.write(1);
        cell.write(2);
        cell.flip();
        assert_eq!(cell.read(), 2);
    }

    #[test]
    fn second_flip_does_not_reapply() {
        // After a flip the stale value parked in `pending` must not resurface.
        let cell = DoubleBuffered::new(0_i32);
        cell.write(9);
        cell.flip();
        cell.flip();
        assert_eq!(cell.read(), 9);
    }

    #[test]
    fn handle_erases_the_value_type() {
        let a = DoubleBuffered::shared(1.5_f64);
        let b = DoubleBuffered::shared("x".to_string());
        let handles: Vec<CellHandle> = vec![a.handle(), b.handle()];
        a.write(2.5);
        b.write("y".to_string());
        for h in &handles {
            h.flip();
        }
        assert_eq!(a.read(), 2.5);
        assert_eq!(b.read(), "y");
    }
}

// ── StateManager membership ───────────────────────────────────────────────────

#[cfg(test)]
mod manager_tests {
    use super::*;

    fn three_cells() -> (Vec<Arc<DoubleBuffered<i32>>>, Vec<CellHandle>) {
        let cells: Vec<_> = (0..3).map(DoubleBuffered::shared).collect();
        let handles = cells.iter().map(|c| c.handle()).collect();
        (cells, handles)
    }

    #[test]
    fn track_is_idempotent() {
        let (_cells, handles) = three_cells();
        let mut mgr = StateManager::new();
        mgr.track(&handles[0]);
        mgr.track(&handles[0]);
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn untrack_absent_is_a_noop() {
        let (_cells, handles) = three_cells();
        let mut mgr = StateManager::new();
        mgr.untrack(&handles[0]);
        assert!(mgr.is_empty());
    }

    #[test]
    fn track_all_then_untrack_all() {
        let (_cells, handles) = three_cells();
        let mut mgr = StateManager::new();
        mgr.track_all(&handles);
        assert_eq!(mgr.len(), 3);
        assert!(mgr.is_tracked(&handles[1]));

        mgr.untrack_all(&handles);
        assert!(mgr.is_empty());
    }

    #[test]
    fn flip_all_commits_every_tracked_cell() {
        let (cells, handles) = three_cells();
        let mut mgr = StateManager::new();
        mgr.track_all(&handles);

        for (i, cell) in cells.iter().enumerate() {
            cell.write(i as i32 + 10);
        }
        mgr.flip_all();
        for (i, cell) in cells.iter().enumerate() {
            assert_eq!(cell.read(), i as i32 + 10);
        }
    }

    #[test]
    fn untracked_cell_is_not_flipped() {
        let (cells, handles) = three_cells();
        let mut mgr = StateManager::new();
        mgr.track_all(&handles);
        mgr.untrack(&handles[1]);

        cells[1].write(99);
        mgr.flip_all();
        assert_eq!(cells[1].read(), 1); // still the initial value
    }

    #[test]
    fn same_cell_distinct_handles_count_once() {
        // Identity is the allocation, not the handle clone.
        let cell = DoubleBuffered::shared(0_i32);
        let h1 = cell.handle();
        let h2 = cell.handle();
        let mut mgr = StateManager::new();
        mgr.track(&h1);
        mgr.track(&h2);
        assert_eq!(mgr.len(), 1);
        mgr.untrack(&h2);
        assert!(mgr.is_empty());
    }
}

// ── Commit atomicity under contention ─────────────────────────────────────────

#[cfg(test)]
mod atomicity_tests {
    use super::*;

    /// Race readers against a writer across repeated flip cycles.  A reader
    /// must only ever observe pair values written as a unit — a torn read
    /// would show mismatched halves.
    #[test]
    fn readers_never_observe_a_partial_write() {
        const ROUNDS: u64 = 2_000;
        const READERS: usize = 4;

        let cell = DoubleBuffered::shared((0_u64, 0_u64));
        let stop = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let cell = cell.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let (a, b) = cell.read();
                        assert_eq!(a, b, "torn read: halves diverged");
                    }
                })
            })
            .collect();

        // Writer + committer on this thread, as in the flip phase.
        for i in 1..=ROUNDS {
            cell.write((i, i));
            cell.flip();
        }
        stop.store(true, Ordering::Relaxed);
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(cell.read(), (ROUNDS, ROUNDS));
    }

    /// Readers on other threads observe either the old or the new value
    /// around a flip, never anything else.
    #[test]
    fn flip_publishes_old_or_new_only() {
        const ROUNDS: u64 = 1_000;

        let cell = DoubleBuffered::shared(0_u64);
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let cell = cell.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut last = 0;
                while !stop.load(Ordering::Relaxed) {
                    let v = cell.read();
                    // Values are committed in increasing order, so any
                    // observation must be monotone.
                    assert!(v >= last, "went backwards: {last} -> {v}");
                    last = v;
                }
            })
        };

        for i in 1..=ROUNDS {
            cell.write(i);
            cell.flip();
        }
        stop.store(true, Ordering::Relaxed);
        reader.join().unwrap();
    }
}
