//! Grid coordinate type and neighbourhood helpers.
//!
//! `Pos` stores unsigned `(row, col)` indices; displacement arithmetic takes
//! signed deltas and is bounds-checked, so an out-of-grid step is represented
//! as `None` rather than a wrapped index.

/// A cell coordinate on the warehouse grid.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

/// The four orthogonal unit displacements, in scan order.
pub const NEIGHBOURS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

impl Pos {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Manhattan (L1) distance to `other` — the admissible default heuristic
    /// for 4-connected grid search.
    #[inline]
    pub fn manhattan(self, other: Pos) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// Displace by `(dr, dc)` within a `rows × cols` grid.
    ///
    /// Returns `None` if the result would leave the grid.
    #[inline]
    pub fn offset(self, dr: i32, dc: i32, rows: usize, cols: usize) -> Option<Pos> {
        let row = self.row.checked_add_signed(dr as isize)?;
        let col = self.col.checked_add_signed(dc as isize)?;
        (row < rows && col < cols).then_some(Pos { row, col })
    }

    /// Signed displacement `(dr, dc)` from `self` to `other`.
    #[inline]
    pub fn delta_to(self, other: Pos) -> (i32, i32) {
        (
            other.row as i32 - self.row as i32,
            other.col as i32 - self.col as i32,
        )
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
