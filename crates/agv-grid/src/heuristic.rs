//! Precomputed all-pairs true-distance heuristic.
//!
//! # Cost
//!
//! Construction runs one breadth-first search per open cell, so the total
//! cost is `O((rows·cols)^2)` time and memory.  This is intended for
//! small-to-medium maps only; gate it behind a grid-size threshold in the
//! application and fall back to the Manhattan heuristic elsewhere.
//!
//! The table is built once over the *static* grid (walls and spawn points
//! blocked — the mask a loaded AGV plans against) and never revalidated;
//! true distances over a subset-passable dynamic mask can only be larger,
//! so the lookup stays admissible for carrying-mode search.

use agv_core::{Pos, NEIGHBOURS};
use std::collections::VecDeque;

use crate::search::PassGrid;

const UNREACHED: u32 = u32::MAX;

/// All-pairs shortest-path cache over a static passability mask.
pub struct DistanceTable {
    cells: usize,
    cols:  usize,
    /// `dist[src_idx * cells + dst_idx]`, `UNREACHED` when disconnected.
    dist: Vec<u32>,
}

impl DistanceTable {
    /// Build by BFS from every open cell of `pass`.
    pub fn build(pass: &PassGrid) -> Self {
        let (rows, cols) = (pass.rows(), pass.cols());
        let cells = rows * cols;
        let mut dist = vec![UNREACHED; cells * cells];

        let mut queue = VecDeque::new();
        for src_row in 0..rows {
            for src_col in 0..cols {
                let src = Pos::new(src_row, src_col);
                if !pass.is_open(src) {
                    continue;
                }
                let base = (src_row * cols + src_col) * cells;
                dist[base + src_row * cols + src_col] = 0;
                queue.clear();
                queue.push_back(src);
                while let Some(p) = queue.pop_front() {
                    let d = dist[base + p.row * cols + p.col];
                    for (dr, dc) in NEIGHBOURS {
                        let Some(next) = p.offset(dr, dc, rows, cols) else {
                            continue;
                        };
                        let slot = base + next.row * cols + next.col;
                        if pass.is_open(next) && dist[slot] == UNREACHED {
                            dist[slot] = d + 1;
                            queue.push_back(next);
                        }
                    }
                }
            }
        }

        Self { cells, cols, dist }
    }

    /// True shortest distance from `a` to `b`, or `None` if disconnected on
    /// the static mask.
    #[inline]
    pub fn distance(&self, a: Pos, b: Pos) -> Option<usize> {
        let i = (a.row * self.cols + a.col) * self.cells + b.row * self.cols + b.col;
        let d = self.dist[i];
        (d != UNREACHED).then_some(d as usize)
    }
}
