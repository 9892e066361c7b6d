//! `DoubleBuffered<T>` — a single piece of entity state with a visible
//! "current" value and a hidden "pending" write.
//!
//! # Why double buffering
//!
//! During the update phase many threads read many entities' state
//! concurrently.  If writes landed in place, an entity updated early in the
//! tick would be observed half-new by entities updated later — update order
//! would leak into results.  Instead, writes go to a pending slot and are
//! promoted all at once during the flip phase, when no entity is running.
//!
//! # Locking
//!
//! Both slots live behind one `parking_lot::RwLock`.  `read()` takes the
//! shared lock for the duration of a clone; `write()` and `flip()` take the
//! exclusive lock for O(1) slot bookkeeping.  The single-writer-per-tick
//! discipline (only the owning entity writes, only during its own update) is
//! a kernel convention, not enforced by this type.

use std::sync::Arc;

use parking_lot::RwLock;

// ── Flip ─────────────────────────────────────────────────────────────────────

/// Type-erased commit capability.
///
/// A `StateManager` tracks cells of arbitrary `T` through this trait; the
/// flip phase needs nothing but `flip()`.
pub trait Flip: Send + Sync {
    /// Promote the pending value to current, if a write is pending.
    fn flip(&self);
}

/// A shared, type-erased reference to one double-buffered cell.
///
/// Subscription lists and `StateManager`s carry these.  Cell identity (for
/// duplicate-free tracking) is the `Arc` allocation address.
pub type CellHandle = Arc<dyn Flip>;

// ── DoubleBuffered ───────────────────────────────────────────────────────────

struct Slots<T> {
    current: T,
    pending: T,
    dirty:   bool,
}

/// One piece of double-buffered entity state.
///
/// Reads always return the current value; writes only touch the pending
/// value; [`Flip::flip`] promotes pending to current atomically from the
/// perspective of every reader.
pub struct DoubleBuffered<T: Clone + Send + Sync> {
    slots: RwLock<Slots<T>>,
}

impl<T: Clone + Send + Sync> DoubleBuffered<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slots: RwLock::new(Slots {
                current: initial.clone(),
                pending: initial,
                dirty:   false,
            }),
        }
    }

    /// Shorthand for `Arc::new(Self::new(initial))` — cells are almost always
    /// shared, since readers on other workers hold handles to them.
    pub fn shared(initial: T) -> Arc<Self> {
        Arc::new(Self::new(initial))
    }

    /// The current (committed) value.  Callable from any thread.
    #[inline]
    pub fn read(&self) -> T {
        self.slots.read().current.clone()
    }

    /// Stage `v` as the pending value.  Only the owning entity may call this,
    /// and only during its own update.
    #[inline]
    pub fn write(&self, v: T) {
        let mut s = self.slots.write();
        s.pending = v;
        s.dirty = true;
    }

    /// The pending value, whether or not a write is staged.  Intended for the
    /// owning entity (read-modify-write within one update) and for tests.
    #[inline]
    pub fn peek_pending(&self) -> T {
        self.slots.read().pending.clone()
    }

    /// True if a write is staged but not yet flipped.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.slots.read().dirty
    }
}

impl<T: Clone + Send + Sync> Flip for DoubleBuffered<T> {
    fn flip(&self) {
        let mut s = self.slots.write();
        let s = &mut *s;
        if s.dirty {
            // Swap rather than clone; the stale value left in `pending` is
            // fully overwritten by the next write().
            std::mem::swap(&mut s.current, &mut s.pending);
            s.dirty = false;
        }
    }
}

impl<T: Clone + Send + Sync + 'static> DoubleBuffered<T> {
    /// The type-erased handle for this cell, as carried in subscription lists.
    pub fn handle(self: &Arc<Self>) -> CellHandle {
        self.clone()
    }
}
