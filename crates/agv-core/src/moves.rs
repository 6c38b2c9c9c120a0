//! The per-tick agent action type.
//!
//! One `Move` per agent per tick: a unit (or zero) displacement plus the
//! grab/drop toggle.  The engine validates displacements itself — a `Move`
//! carrying an infeasible step is converted to a no-op during resolution,
//! never rejected as an error.

/// One agent's proposed action for a single tick.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Move {
    /// Row displacement, normally in `-1..=1`.
    pub dr: i32,
    /// Column displacement, normally in `-1..=1`.
    pub dc: i32,
    /// Toggle carry state: pick up when empty-handed, drop when carrying.
    pub grab: bool,
}

impl Move {
    /// Stay in place, no toggle.
    pub const STAY: Move = Move { dr: 0, dc: 0, grab: false };

    #[inline]
    pub fn step(dr: i32, dc: i32) -> Self {
        Move { dr, dc, grab: false }
    }

    /// Stay in place and toggle carry state — how planners express pickup
    /// and drop actions.
    #[inline]
    pub fn grab_only() -> Self {
        Move { dr: 0, dc: 0, grab: true }
    }

    /// `true` when the move requests no displacement.
    #[inline]
    pub fn is_stationary(self) -> bool {
        self.dr == 0 && self.dc == 0
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:+}, {:+}{})",
            self.dr,
            self.dc,
            if self.grab { ", grab" } else { "" }
        )
    }
}
