//! `ls-core` — foundational types for the `lockstep` simulation kernel.
//!
//! This crate is a dependency of every other `ls-*` crate.  It intentionally
//! has no `ls-*` dependencies and almost no external ones (only optional
//! `serde`).
//!
//! # What lives here
//!
//! | Module      | Contents                                    |
//! |-------------|---------------------------------------------|
//! | [`ids`]     | `EntityId`, `WorkerId`, `GroupId`           |
//! | [`time`]    | `Tick`, `TimeSlice`, `TickClock`, `KernelConfig` |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                              |
//! |---------|-----------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types. |

pub mod ids;
pub mod time;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use ids::{EntityId, GroupId, WorkerId};
pub use time::{KernelConfig, Tick, TickClock, TimeSlice};
