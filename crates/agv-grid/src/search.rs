//! Time-expanded A* over a boolean passability mask.
//!
//! This is the single low-level search primitive shared by both planners: a
//! pure function of (mask, start, goal, reservations, heuristic).  Routes
//! are start-inclusive cell sequences; `route[t]` is where the agent stands
//! `t` ticks from now, so a route of length `L` takes `L - 1` moves.
//!
//! # Modes
//!
//! - [`SearchMode::Strict`] — closed-set shortest path.  A popped cell is
//!   never reconsidered, so distance labels are monotone under an admissible
//!   heuristic.  A candidate step is rejected when the reservation table
//!   holds the target cell at the arrival offset *or the offset just before
//!   it*: the earlier slot guards against swaps, where another path vacates
//!   the target into the mover's own cell on the same tick.
//! - [`SearchMode::Lenient`] — route-carrying expansion that admits an
//!   explicit stay move and re-entering a cell via a stay.  Reservations are
//!   checked at the arrival offset only, which is exactly the semantics of
//!   CBS forbidden-cell-at-time constraints.  Stays cost one step like any
//!   move (route length is travel time, waits included) and are only
//!   expanded while the arrival offset is inside the reservation horizon —
//!   waiting past the last constraint cannot help, and the bound keeps the
//!   open set finite on unsolvable instances.
//!
//! A failed search returns an empty route and empty move list; callers treat
//! that as "stay put" or prune the branch, never as a panic.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use agv_core::{Pos, NEIGHBOURS};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{DistanceTable, ReservationTable};

// ── PassGrid ──────────────────────────────────────────────────────────────────

/// Boolean passability mask, rebuilt by planners per query from the live
/// grid (walls always closed; occupied/parcel/spawn cells closed depending
/// on the querying agent's carry state).
#[derive(Clone, Debug)]
pub struct PassGrid {
    rows: usize,
    cols: usize,
    open: Vec<bool>,
}

impl PassGrid {
    /// A fully open mask.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols, open: vec![true; rows * cols] }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn block(&mut self, p: Pos) {
        let i = p.row * self.cols + p.col;
        self.open[i] = false;
    }

    #[inline]
    pub fn is_open(&self, p: Pos) -> bool {
        self.open[p.row * self.cols + p.col]
    }
}

// ── Search interface ──────────────────────────────────────────────────────────

/// Expansion discipline for [`astar`].  See module docs.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SearchMode {
    Strict,
    Lenient,
}

/// A found route plus its per-tick displacement deltas.
///
/// Both vectors are empty when no route exists.
#[derive(Clone, Debug, Default)]
pub struct SearchResult {
    /// Cell sequence, start-inclusive.
    pub route: Vec<Pos>,
    /// `route.len() - 1` displacement deltas.
    pub moves: Vec<(i32, i32)>,
}

impl SearchResult {
    pub fn not_found() -> Self {
        Self::default()
    }

    #[inline]
    pub fn found(&self) -> bool {
        !self.route.is_empty()
    }

    fn from_route(route: Vec<Pos>) -> Self {
        let moves = route_moves(&route);
        Self { route, moves }
    }
}

/// Displacement deltas between consecutive route cells.
pub fn route_moves(route: &[Pos]) -> Vec<(i32, i32)> {
    route.windows(2).map(|w| w[0].delta_to(w[1])).collect()
}

/// Shortest route from `start` to `goal` over `pass`, honouring `reservation`
/// and steered by `heuristic` (Manhattan when `None`).
pub fn astar(
    pass:        &PassGrid,
    start:       Pos,
    goal:        Pos,
    reservation: Option<&ReservationTable>,
    heuristic:   Option<&DistanceTable>,
    mode:        SearchMode,
) -> SearchResult {
    match mode {
        SearchMode::Strict => strict(pass, start, goal, reservation, heuristic),
        SearchMode::Lenient => lenient(pass, start, goal, reservation, heuristic),
    }
}

/// Heuristic lookup: true distance when a table is supplied (admissible — the
/// table is built on a mask at least as open as any dynamic mask), Manhattan
/// otherwise.  `None` means the table proves `from` can never reach `goal`.
#[inline]
fn estimate(heuristic: Option<&DistanceTable>, from: Pos, goal: Pos) -> Option<usize> {
    match heuristic {
        Some(table) => table.distance(from, goal),
        None => Some(from.manhattan(goal)),
    }
}

// ── Strict mode ───────────────────────────────────────────────────────────────

fn strict(
    pass:        &PassGrid,
    start:       Pos,
    goal:        Pos,
    reservation: Option<&ReservationTable>,
    heuristic:   Option<&DistanceTable>,
) -> SearchResult {
    let (rows, cols) = (pass.rows, pass.cols);

    // The start cell may be blocked on the table's static mask (a loaded AGV
    // standing on a spawn point); Manhattan covers that one estimate.
    let h0 = estimate(heuristic, start, goal).unwrap_or_else(|| start.manhattan(goal));

    let mut closed: FxHashSet<Pos> = FxHashSet::default();
    let mut best_g: FxHashMap<Pos, usize> = FxHashMap::default();
    let mut prevs:  FxHashMap<Pos, Pos> = FxHashMap::default();

    // Min-heap on (f, g, pos); Pos as final key makes tie-breaking
    // deterministic.
    let mut open: BinaryHeap<Reverse<(usize, usize, Pos)>> = BinaryHeap::new();
    open.push(Reverse((h0, 0, start)));
    best_g.insert(start, 0);

    while let Some(Reverse((_, g, pos))) = open.pop() {
        if pos == goal {
            return SearchResult::from_route(reconstruct(&prevs, start, goal));
        }
        if !closed.insert(pos) {
            continue;
        }

        let arrive = g + 1;
        for (dr, dc) in NEIGHBOURS {
            let Some(next) = pos.offset(dr, dc, rows, cols) else {
                continue;
            };
            if !pass.is_open(next) || closed.contains(&next) {
                continue;
            }
            if let Some(res) = reservation {
                // Inside the horizon, the target must be free both at the
                // arrival offset (vertex conflict) and one step earlier
                // (swap conflict).
                if arrive < res.horizon()
                    && (res.occupied(next, g) || res.occupied(next, arrive))
                {
                    continue;
                }
            }
            let Some(h) = estimate(heuristic, next, goal) else {
                continue;
            };
            if arrive < best_g.get(&next).copied().unwrap_or(usize::MAX) {
                best_g.insert(next, arrive);
                prevs.insert(next, pos);
                open.push(Reverse((arrive + h, arrive, next)));
            }
        }
    }

    SearchResult::not_found()
}

fn reconstruct(prevs: &FxHashMap<Pos, Pos>, start: Pos, goal: Pos) -> Vec<Pos> {
    let mut route = vec![goal];
    let mut cur = goal;
    while cur != start {
        cur = prevs[&cur];
        route.push(cur);
    }
    route.reverse();
    route
}

// ── Lenient mode ──────────────────────────────────────────────────────────────

/// Open-set entry carrying its own route.  Derived `Ord` compares
/// `(f, g, pos, route)` lexicographically; `f` first gives best-first order
/// and the rest pin a deterministic tie-break.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct LenientNode {
    f:     usize,
    g:     usize,
    pos:   Pos,
    route: Vec<Pos>,
}

fn lenient(
    pass:        &PassGrid,
    start:       Pos,
    goal:        Pos,
    reservation: Option<&ReservationTable>,
    heuristic:   Option<&DistanceTable>,
) -> SearchResult {
    let (rows, cols) = (pass.rows, pass.cols);
    let res_horizon = reservation.map_or(0, |r| r.horizon());

    let h0 = estimate(heuristic, start, goal).unwrap_or_else(|| start.manhattan(goal));

    let mut visited: FxHashSet<Pos> = FxHashSet::default();
    let mut open: BinaryHeap<Reverse<LenientNode>> = BinaryHeap::new();
    open.push(Reverse(LenientNode { f: h0, g: 0, pos: start, route: vec![start] }));

    while let Some(Reverse(node)) = open.pop() {
        if node.pos == goal {
            return SearchResult::from_route(node.route);
        }
        visited.insert(node.pos);

        let arrive = node.g + 1;
        let stay = std::iter::once((0, 0)).chain(NEIGHBOURS);
        for (dr, dc) in stay {
            let is_stay = dr == 0 && dc == 0;
            // Waiting only matters while constraints remain ahead.
            if is_stay && arrive >= res_horizon {
                continue;
            }
            let Some(next) = node.pos.offset(dr, dc, rows, cols) else {
                continue;
            };
            if !pass.is_open(next) {
                continue;
            }
            if visited.contains(&next) && !is_stay {
                continue;
            }
            if let Some(res) = reservation {
                if arrive < res.horizon() && res.occupied(next, arrive) {
                    continue;
                }
            }
            let Some(h) = estimate(heuristic, next, goal) else {
                continue;
            };
            let mut route = node.route.clone();
            route.push(next);
            open.push(Reverse(LenientNode { f: arrive + h, g: arrive, pos: next, route }));
        }
    }

    SearchResult::not_found()
}
