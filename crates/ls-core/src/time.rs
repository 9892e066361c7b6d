//! Simulation time model.
//!
//! # Design
//!
//! Time is represented as a monotonically increasing `Tick` counter.  The
//! mapping to simulated wall-clock time is a fixed millisecond granularity:
//!
//!   elapsed_ms = tick * tick_millis
//!
//! Using an integer tick as the canonical time unit means all staging
//! arithmetic (entity start times, macro-tick periods) is exact and
//! comparisons are O(1).  Entities receive both representations per update
//! as a [`TimeSlice`] so domain code never recomputes the conversion.

use std::fmt;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
///
/// Stored as `u64`: at 10 ticks per simulated second a u64 outlasts any
/// conceivable run by a comfortable margin.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self`.
    ///
    /// # Panics
    /// Panics in debug mode if `earlier > self`.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0 - earlier.0
    }

    /// True when this tick falls on a multiple of `step` (a macro boundary
    /// for a group configured with that step).
    #[inline]
    pub fn is_macro_boundary(self, step: u64) -> bool {
        step != 0 && self.0 % step == 0
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::AddAssign<u64> for Tick {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── TimeSlice ─────────────────────────────────────────────────────────────────

/// The time argument handed to every entity update: the tick index plus its
/// millisecond equivalent, precomputed once per cycle by the owning worker.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSlice {
    pub tick: Tick,
    /// `tick.0 * tick_millis` — simulated milliseconds since tick 0.
    pub millis: u64,
}

impl fmt::Display for TimeSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} ms)", self.tick, self.millis)
    }
}

// ── TickClock ─────────────────────────────────────────────────────────────────

/// Converts between tick counts and simulated milliseconds.
///
/// One `TickClock` lives inside each worker thread; it is cheap to copy and
/// intentionally holds no heap data.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TickClock {
    /// How many simulated milliseconds one tick represents.
    pub tick_millis: u32,
    /// The current tick — advanced by the owner each cycle.
    pub current: Tick,
}

impl TickClock {
    pub fn new(tick_millis: u32) -> Self {
        Self { tick_millis, current: Tick::ZERO }
    }

    /// Advance the clock by `step` ticks.
    #[inline]
    pub fn advance_by(&mut self, step: u64) {
        self.current = self.current + step;
    }

    /// The [`TimeSlice`] for the current tick.
    #[inline]
    pub fn timeslice(&self) -> TimeSlice {
        TimeSlice {
            tick:   self.current,
            millis: self.current.0 * self.tick_millis as u64,
        }
    }
}

// ── KernelConfig ──────────────────────────────────────────────────────────────

/// Top-level kernel configuration.
///
/// Typically built by the application crate (possibly from a config file via
/// the `serde` feature) and passed to the `WorkGroupManager`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelConfig {
    /// Simulated milliseconds per tick.
    pub tick_millis: u32,

    /// Total global ticks to simulate (exclusive upper bound).
    pub total_ticks: u64,
}

impl KernelConfig {
    /// The tick at which the simulation ends (exclusive upper bound).
    #[inline]
    pub fn end_tick(&self) -> Tick {
        Tick(self.total_ticks)
    }

    /// Construct a `TickClock` pre-configured for this run.
    pub fn make_clock(&self) -> TickClock {
        TickClock::new(self.tick_millis)
    }
}
