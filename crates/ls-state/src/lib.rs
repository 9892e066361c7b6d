//! `ls-state` — double-buffered entity state.
//!
//! The central invariant of the kernel is that an entity's writes during a
//! tick are invisible to every other entity until the buffer-flip phase of
//! that tick.  This crate provides the two pieces that enforce it:
//!
//! | Module      | Contents                                        |
//! |-------------|-------------------------------------------------|
//! | [`cell`]    | `DoubleBuffered<T>`, the `Flip` trait, `CellHandle` |
//! | [`manager`] | `StateManager` — tracks cells, flips them in bulk |
//!
//! # Usage sketch
//!
//! ```rust,ignore
//! let speed = DoubleBuffered::shared(0.0_f64);
//! speed.write(13.9);            // only this entity, only during its update
//! assert_eq!(speed.read(), 0.0); // everyone still sees the old value
//! manager.flip_all();            // buffer-flip phase
//! assert_eq!(speed.read(), 13.9);
//! ```

pub mod cell;
pub mod manager;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use cell::{CellHandle, DoubleBuffered, Flip};
pub use manager::StateManager;
