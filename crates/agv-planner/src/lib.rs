//! `agv-planner` — multi-agent path planners for `agvsim`.
//!
//! Two strategies behind one [`Planner`] trait, so driver loops can swap
//! them transparently:
//!
//! | planner        | style                                                    |
//! |----------------|----------------------------------------------------------|
//! | [`WhcaPlanner`] | windowed cooperative A*: bounded lookahead, replans every tick against a rolling reservation table |
//! | [`CbsPlanner`]  | conflict-based search: one-shot full-horizon joint plan computed at construction |
//!
//! Both planners read engine state through the accessors on
//! [`Engine`](agv_engine::Engine) and never hold references into it between
//! ticks — the engine's move resolution may diverge from any prediction (an
//! unresolved rotational cycle leaves agents where they were), so state is
//! re-queried on every call.
//!
//! Planning failures degrade, never abort: an unreachable goal becomes a
//! stay move, an exhausted CBS search becomes an all-idle plan.  The one
//! fatal condition in this crate is an unknown assignment-policy name at
//! construction time.

pub mod cbs;
pub mod error;
pub mod whca;


use agv_core::Move;
use agv_engine::Engine;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use cbs::CbsPlanner;
pub use error::{PlannerError, PlannerResult};
pub use whca::{AssignmentPolicy, WhcaConfig, WhcaPlanner};

/// Per-tick move supplier, uniform across strategies.
pub trait Planner {
    /// Produce this tick's move batch, one entry per agent.
    ///
    /// The `bool` is `false` once the planner has nothing left to offer
    /// (a one-shot plan is exhausted); a windowed planner is always active.
    fn pop_moves(&mut self, engine: &Engine) -> (bool, Vec<Move>);
}
