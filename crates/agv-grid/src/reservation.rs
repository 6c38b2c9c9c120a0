//! Space-time reservation table.
//!
//! A planner reserves `(row, col, t)` slots over a bounded horizon of
//! relative time offsets; the search primitive consults the table to keep
//! planned paths from colliding in time as well as space.  Offset 0 is the
//! current tick; a windowed planner calls [`ReservationTable::shift`] once
//! per tick to slide the window forward.

use agv_core::{AgentId, Pos};

/// Dense `rows × cols × horizon` occupancy map, plane-major in time.
#[derive(Clone, Debug)]
pub struct ReservationTable {
    rows: usize,
    cols: usize,
    horizon: usize,
    slots: Vec<Option<AgentId>>,
}

impl ReservationTable {
    /// An empty table covering `horizon` relative time offsets.
    pub fn new(rows: usize, cols: usize, horizon: usize) -> Self {
        Self { rows, cols, horizon, slots: vec![None; rows * cols * horizon] }
    }

    /// Build a table from per-agent forbidden `(cell, offset)` constraints,
    /// sized to the latest constrained offset.  Used by the CBS low-level
    /// solver.
    pub fn from_constraints(
        rows: usize,
        cols: usize,
        constraints: &[(Pos, usize)],
        agent: AgentId,
    ) -> Self {
        let horizon = constraints.iter().map(|&(_, t)| t + 1).max().unwrap_or(0);
        let mut table = Self::new(rows, cols, horizon);
        for &(pos, t) in constraints {
            table.reserve(pos, t, agent);
        }
        table
    }

    #[inline]
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    #[inline]
    fn idx(&self, p: Pos, t: usize) -> usize {
        t * self.rows * self.cols + p.row * self.cols + p.col
    }

    /// The agent holding `(p, t)`, if any.  Offsets beyond the horizon are
    /// always free.
    #[inline]
    pub fn holder(&self, p: Pos, t: usize) -> Option<AgentId> {
        if t >= self.horizon {
            return None;
        }
        self.slots[self.idx(p, t)]
    }

    #[inline]
    pub fn occupied(&self, p: Pos, t: usize) -> bool {
        self.holder(p, t).is_some()
    }

    /// Mark `(p, t)` as held by `agent`.  Offsets beyond the horizon are
    /// silently ignored (a windowed planner truncates routes anyway).
    #[inline]
    pub fn reserve(&mut self, p: Pos, t: usize, agent: AgentId) {
        if t < self.horizon {
            let i = self.idx(p, t);
            self.slots[i] = Some(agent);
        }
    }

    /// Reserve every cell of `route` at its offset: `route[t]` at time `t`.
    pub fn reserve_route(&mut self, route: &[Pos], agent: AgentId) {
        for (t, &p) in route.iter().enumerate() {
            self.reserve(p, t, agent);
        }
    }

    /// Slide the window forward one tick: drop the offset-0 plane and append
    /// an empty plane at the far end.
    pub fn shift(&mut self) {
        let plane = self.rows * self.cols;
        if plane == 0 || self.horizon == 0 {
            return;
        }
        self.slots.rotate_left(plane);
        let len = self.slots.len();
        self.slots[len - plane..].fill(None);
    }

    /// Clear every reservation at every offset.
    pub fn clear(&mut self) {
        self.slots.fill(None);
    }
}
