//! Engine construction parameters.
//!
//! Every runtime "mode" of the original design is an explicit enum chosen at
//! construction time: unload policy, parcel generation, deadline handling.
//! String-keyed mode switching does not exist in this crate.

use agv_core::{DestId, Pos};

/// When a carried parcel leaves the AGV.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum UnloadPolicy {
    /// The grab toggle both picks up and drops.
    #[default]
    Manual,
    /// Drop happens the instant the AGV stands on the carried parcel's
    /// shelf; pickup still requires an explicit toggle.
    Auto,
}

/// One pre-authored spawn: a parcel of type `dest` appears at `pos`.
///
/// `deadline` applies only when the engine runs with deadlines; an absent
/// value falls back to a random draw from the configured bounds.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpawnEvent {
    pub pos:      Pos,
    pub dest:     DestId,
    pub deadline: Option<i32>,
}

/// How new parcels enter the world.
#[derive(Clone, Debug, Default)]
pub enum GenMode {
    /// No generation beyond the parcels in the initial grid.
    #[default]
    Off,
    /// Random generation with mean inter-arrival `gap` ticks.  A sub-unit
    /// gap draws a scaled random batch per tick; `gap >= 1` is a Bernoulli
    /// trial for one parcel with probability `1/gap`.  Must be positive.
    Stochastic { gap: f64 },
    /// Pre-authored per-tick spawn lists, consumed positionally by tick
    /// index.  Ticks past the end of the schedule spawn nothing.
    Scripted(Vec<Vec<SpawnEvent>>),
}

/// Deadline handling.
#[derive(Clone, Debug, Default)]
pub enum DeadlineMode {
    /// No deadlines: deliveries are never late and no penalty accrues.
    #[default]
    Off,
    /// The engine draws a random deadline from the configured bounds for
    /// every parcel already on the initial grid (and for each spawned one).
    Random,
    /// A caller-supplied table, one slot per destination type, `-1` meaning
    /// no outstanding parcel of that type.
    Given(Vec<i32>),
}

/// Everything [`Engine::new`](crate::Engine::new) needs besides the grid.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Master seed for the engine's RNG stream (move-order shuffles and
    /// parcel draws).  The same grid, config, and move sequence always
    /// reproduce the same run.
    pub seed: u64,

    pub unload:     UnloadPolicy,
    pub parcel_gen: GenMode,
    pub deadlines:  DeadlineMode,

    /// Inclusive `[lower, upper]` tick range for randomly drawn deadlines.
    /// Default: `(rows + cols, 4 * (rows + cols))`.
    pub deadline_bounds: Option<(i32, i32)>,

    /// Points awarded per delivery.
    pub success_score: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed:            0,
            unload:          UnloadPolicy::Manual,
            parcel_gen:      GenMode::Off,
            deadlines:       DeadlineMode::Off,
            deadline_bounds: None,
            success_score:   10,
        }
    }
}
