//! `agv-core` — foundational types for the `agvsim` warehouse framework.
//!
//! This crate is a dependency of every other `agv-*` crate.  It intentionally
//! has no `agv-*` dependencies and minimal external ones (only `rand`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                        |
//! |-----------|-------------------------------------------------|
//! | [`ids`]   | `AgentId`, `DestId`                             |
//! | [`pos`]   | `Pos`, Manhattan distance, 4-neighbourhood      |
//! | [`moves`] | `Move` — one agent's per-tick action            |
//! | [`rng`]   | `SimRng` — seedable run-level RNG               |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                              |
//! |---------|-----------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types. |

pub mod ids;
pub mod moves;
pub mod pos;
pub mod rng;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use ids::{AgentId, DestId};
pub use moves::Move;
pub use pos::{Pos, NEIGHBOURS};
pub use rng::SimRng;
