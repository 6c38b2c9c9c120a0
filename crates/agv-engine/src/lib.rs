//! `agv-engine` — the warehouse simulation engine for `agvsim`.
//!
//! # Tick state machine
//!
//! One [`Engine::tick`] call per simulation step, given one proposed
//! [`Move`](agv_core::Move) per agent:
//!
//! ```text
//! ① Shuffle    — seeded permutation of agent indices (no positional bias).
//! ② First pass — attempt each move; occupied targets become *candidates*.
//! ③ Resolution — retry candidates until a pass commits nothing more.
//!                Chains resolve (A follows B out); true rotational cycles
//!                do not — those agents stay put.  Known limitation, kept.
//! ④ Scoring    — +bonus per grounded parcel on its shelf; −1 per lapsed
//!                outstanding parcel per tick; late counter on delivery.
//! ⑤ Generation — stochastic draw or scripted spawn list for this tick.
//! ⑥ Decay      — decrement active deadline slots, floored at the −1
//!                sentinel; advance the tick counter.
//! ```
//!
//! # Concurrency contract
//!
//! `tick` is **not reentrant** — one logical writer per engine instance.
//! The score cell is mutex-guarded purely so reporting threads may call
//! [`Engine::score_report`] concurrently with a ticking thread; the mutex is
//! not load-bearing for move resolution.

pub mod config;
pub mod engine;
pub mod error;
pub mod state;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{DeadlineMode, EngineConfig, GenMode, SpawnEvent, UnloadPolicy};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use state::{Agent, EngineSnapshot, ScoreReport};
