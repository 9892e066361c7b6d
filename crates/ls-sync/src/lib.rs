//! `ls-sync` — the rendezvous primitive the whole kernel hangs off.
//!
//! A [`FlexiBarrier`] generalizes an ordinary barrier in two ways:
//!
//! 1. A caller may contribute **more than one** unit per round, letting one
//!    thread stand in for several logical participants (a work group covers
//!    all of its sleeping workers with a single call).
//! 2. A caller may contribute **without blocking** via
//!    [`FlexiBarrier::contribute`], so the orchestrator thread is never held
//!    hostage by slow workers — it only blocks where it explicitly chooses
//!    to `wait`.
//!
//! Exactly one caller per round is designated the *leader* — the one whose
//! contribution brought the count to zero — and is the sanctioned place for
//! once-per-round work.

pub mod barrier;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use barrier::{Arrival, FlexiBarrier};
