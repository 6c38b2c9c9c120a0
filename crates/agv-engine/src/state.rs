//! Agent state, score reporting, and save/restore snapshots.

use agv_core::{DestId, Pos};
use agv_grid::Grid;

/// One AGV: its cell and what it carries.
///
/// Agents are created once at engine construction from the grid's occupant
/// layer and are mutated only by tick resolution; they are never destroyed
/// during a run.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Agent {
    pub pos: Pos,
    /// `None` when empty-handed, else the destination type being carried.
    pub carrying: Option<DestId>,
}

/// Cumulative scoring state, as returned by
/// [`Engine::score_report`](crate::Engine::score_report).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoreReport {
    pub ticks:   u64,
    pub score:   i64,
    /// Parcels delivered since construction.
    pub delivered: u64,
    /// Deliveries whose deadline had already lapsed.
    pub late_delivered: u64,
    /// Live parcels currently past their deadline (recomputed, not
    /// cumulative).
    pub currently_overdue: u64,
}

/// Full world-state snapshot: grid layers, agents, deadline table.
///
/// Produced by [`Engine::snapshot`](crate::Engine::snapshot) and accepted by
/// [`Engine::restore`](crate::Engine::restore); with the `serde` feature the
/// excluded persistence collaborator can serialize it as-is.  Score and tick
/// counters are engine-lifetime and deliberately not part of the snapshot.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineSnapshot {
    pub grid:      Grid,
    pub agents:    Vec<Agent>,
    pub deadlines: Option<Vec<i32>>,
}
