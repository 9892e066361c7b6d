//! The `FlexiBarrier` rendezvous point.
//!
//! # Accounting model
//!
//! A barrier is built with a fixed `threshold`.  Each round starts with
//! `remaining = threshold`; calls to [`FlexiBarrier::wait`] and
//! [`FlexiBarrier::contribute`] decrement it by their `amount`.  The call
//! that drives `remaining` to zero is the round's **leader**: it increments
//! the generation counter, resets `remaining`, and wakes every blocked
//! waiter.  Waiters are immune to spurious wakeups because they loop on the
//! generation counter, not on a flag.
//!
//! Contributing more than `remaining` is a contract violation and panics:
//! barrier state cannot be rolled back mid-round, so limping on would
//! silently desynchronize every participant.
//!
//! # Cancellation
//!
//! [`FlexiBarrier::cancel`] permanently wakes all waiters with
//! [`Arrival::Interrupted`] and makes every later call return immediately.
//! This is the kernel's cooperative-cancellation point: worker threads check
//! for interruption exactly at their barrier waits, never mid-update.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

// ── Arrival ──────────────────────────────────────────────────────────────────

/// How a call to [`FlexiBarrier::wait`] came back.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Arrival {
    /// This caller's contribution completed the round.  Run once-per-round
    /// bookkeeping here.
    Leader,
    /// Another caller completed the round; this one was released with it.
    Released,
    /// The barrier was cancelled; the round will never complete.
    Interrupted,
}

impl Arrival {
    #[inline]
    pub fn is_leader(self) -> bool {
        self == Arrival::Leader
    }

    #[inline]
    pub fn is_interrupted(self) -> bool {
        self == Arrival::Interrupted
    }
}

// ── FlexiBarrier ─────────────────────────────────────────────────────────────

struct BarrierState {
    /// Units still outstanding in the current round.
    remaining:  usize,
    /// Completed-round counter; waiters block until it advances.
    generation: u64,
    /// Set once by `cancel()`; never cleared.
    cancelled:  bool,
}

/// A reusable rendezvous point with flexible contribution counts.
///
/// The single internal lock is held only for O(1) bookkeeping, never across
/// a blocking wait.
pub struct FlexiBarrier {
    threshold: usize,
    state:     Mutex<BarrierState>,
    cond:      Condvar,
}

impl FlexiBarrier {
    /// Create a barrier requiring `threshold` units per round.
    ///
    /// # Panics
    /// Panics if `threshold` is zero — a round that is complete before
    /// anyone arrives has no meaningful leader.
    pub fn new(threshold: usize) -> Self {
        assert!(threshold > 0, "flexi barrier threshold must be non-zero");
        Self {
            threshold,
            state: Mutex::new(BarrierState {
                remaining:  threshold,
                generation: 0,
                cancelled:  false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Shorthand for `Arc::new(Self::new(threshold))` — barriers are always
    /// shared across threads.
    pub fn shared(threshold: usize) -> Arc<Self> {
        Arc::new(Self::new(threshold))
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Contribute `amount` units and block until the round completes.
    ///
    /// Returns [`Arrival::Leader`] if this contribution completed the round
    /// (the caller does not block in that case), [`Arrival::Released`] once
    /// another caller completes it, or [`Arrival::Interrupted`] if the
    /// barrier is cancelled before the round completes.
    ///
    /// # Panics
    /// Panics if `amount` is zero or exceeds the units remaining in the
    /// current round.
    pub fn wait(&self, amount: usize) -> Arrival {
        let mut state = self.state.lock();
        if state.cancelled {
            return Arrival::Interrupted;
        }
        if Self::apply(&mut state, amount, self.threshold) {
            self.cond.notify_all();
            return Arrival::Leader;
        }

        let my_generation = state.generation;
        while state.generation == my_generation && !state.cancelled {
            self.cond.wait(&mut state);
        }
        if state.generation != my_generation {
            Arrival::Released
        } else {
            Arrival::Interrupted
        }
    }

    /// Contribute `amount` units without blocking.
    ///
    /// Returns `true` if this contribution completed the round (this caller
    /// is the leader); `false` otherwise — including when the barrier has
    /// been cancelled.
    ///
    /// # Panics
    /// Panics if `amount` is zero or exceeds the units remaining in the
    /// current round.
    pub fn contribute(&self, amount: usize) -> bool {
        let mut state = self.state.lock();
        if state.cancelled {
            return false;
        }
        if Self::apply(&mut state, amount, self.threshold) {
            self.cond.notify_all();
            true
        } else {
            false
        }
    }

    /// Cancel the barrier: wake every blocked waiter with
    /// [`Arrival::Interrupted`] and make all later calls return immediately.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        self.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// The number of completed rounds so far.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Decrement `remaining` by `amount`; on reaching zero, open the next
    /// round and report leadership.  Caller must hold the state lock.
    fn apply(state: &mut BarrierState, amount: usize, threshold: usize) -> bool {
        assert!(amount > 0, "flexi barrier contribution must be non-zero");
        assert!(
            amount <= state.remaining,
            "flexi barrier overflow: contribution {amount} exceeds remaining {remaining}",
            remaining = state.remaining,
        );
        state.remaining -= amount;
        if state.remaining == 0 {
            state.generation += 1;
            state.remaining = threshold;
            true
        } else {
            false
        }
    }
}
