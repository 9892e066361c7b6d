//! `ls-kernel` — the concurrency and scheduling core of the lockstep
//! simulation kernel.
//!
//! The kernel advances a large population of independent entities tick by
//! tick across a fixed pool of worker threads, guaranteeing that no
//! entity's state is observed partially updated within a tick, that
//! entities can be created, migrated, and destroyed without corrupting
//! in-flight barrier synchronization, and that groups configured with
//! different tick granularities stay in lock-step at tick boundaries.
//!
//! | Module      | Contents                                              |
//! |-------------|-------------------------------------------------------|
//! | [`worker`]  | `Worker` — one thread, one entity subset, the phase cycle |
//! | [`group`]   | `WorkGroup`, `GroupConfig`, `AssignStrategy`          |
//! | [`manager`] | `WorkGroupManager`, `CrossSyncHook`                   |
//! | [`error`]   | `KernelError` / `KernelResult`                        |
//!
//! # Usage sketch
//!
//! ```rust,ignore
//! let mut mgr = WorkGroupManager::new(KernelConfig { tick_millis: 100, total_ticks: 1000 });
//! let traffic = mgr.create_group(GroupConfig::new(4))?;
//! mgr.init_all()?;
//! mgr.group_mut(traffic)?.schedule_entity(Box::new(my_entity));
//! mgr.start_all()?;
//! mgr.run()?;   // drives all four phases once per global tick, then joins
//! ```
//!
//! # Feature flags
//!
//! | Flag    | Effect                                             |
//! |---------|----------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to the config types. |

pub mod error;
pub mod group;
pub mod manager;
pub mod worker;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{KernelError, KernelResult};
pub use group::{AssignStrategy, GroupConfig, WorkGroup};
pub use manager::{CrossSyncHook, WorkGroupManager};
pub use worker::Worker;
