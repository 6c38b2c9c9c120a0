//! Conflict-based search (CBS).
//!
//! A one-shot, full-horizon joint planner: every outstanding parcel is paired
//! with its destination shelf up front, single-trip shortest paths are
//! computed independently, and a high-level best-first search over
//! constraint sets repairs collisions between them until the joint plan is
//! conflict-free.
//!
//! Trips are matched to agents positionally: the i-th agent is expected to
//! start on the cell of the i-th outstanding parcel in destination-id order,
//! and its queue opens with a pickup toggle.  Deliveries rely on the
//! engine's auto-unload policy; the plan itself carries no drop action.
//!
//! The high-level loop is complete but worst-case exponential in the number
//! of conflicts; callers needing a latency bound must impose one externally.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use agv_core::{AgentId, Move, Pos};
use agv_engine::Engine;
use agv_grid::{astar, route_moves, CellKind, PassGrid, ReservationTable, SearchMode};

use crate::Planner;

// ── High-level search ─────────────────────────────────────────────────────────

/// Forbidden `(cell, offset)` slot for one trip.
type Constraint = (Pos, usize);

/// A conflict found by validation: `(trip, cell, offset)` — the trip that
/// must absorb a new constraint, and where/when it collided.
type Conflict = (usize, Pos, usize);

/// Joint plan length: completion time of the slowest trip.
fn cost(solution: &[Vec<Pos>]) -> usize {
    solution.iter().map(Vec::len).max().unwrap_or(0)
}

/// Where trip `i` stands at offset `t`: routes shorter than `t` hold their
/// final cell.
fn at(solution: &[Vec<Pos>], i: usize, t: usize) -> Pos {
    let route = &solution[i];
    route[t.min(route.len() - 1)]
}

/// Scan the joint plan tick by tick and report every conflict at the first
/// offending offset: same-cell collisions, plus rotational cycles found by
/// following "my new cell is someone's old cell" chains until they close.
fn validate(solution: &[Vec<Pos>]) -> Vec<Conflict> {
    let n = solution.len();
    let mut conflicts: Vec<Conflict> = Vec::new();

    for t in 0..cost(solution) {
        let cur: Vec<Pos> = (0..n).map(|i| at(solution, i, t)).collect();

        for i in 0..n {
            if (0..n).any(|j| j != i && cur[j] == cur[i]) {
                conflicts.push((i, cur[i], t));
            }
        }

        if t > 0 {
            let prev: Vec<Pos> = (0..n).map(|i| at(solution, i, t - 1)).collect();
            let follow = |from: usize| (0..n).find(|&j| j != from && prev[j] == cur[from]);

            for start in 0..n {
                let Some(mut next) = follow(start) else {
                    continue;
                };
                let mut ring = vec![start];
                let mut closed = true;
                while !ring.contains(&next) {
                    ring.push(next);
                    match follow(next) {
                        Some(j) => next = j,
                        None => {
                            closed = false;
                            break;
                        }
                    }
                }
                if closed {
                    let last = *ring.last().unwrap_or(&start);
                    let c = (last, cur[last], t);
                    if !conflicts.contains(&c) {
                        conflicts.push(c);
                    }
                }
            }
        }

        if !conflicts.is_empty() {
            break;
        }
    }

    conflicts
}

/// Replan one trip under its constraint set.
///
/// Fails (`None`, pruning the branch) when no route exists, the route blows
/// the trip's deadline, or the route cannot be padded out to the constraint
/// horizon without standing on a reserved slot.
fn low_level(
    pass:        &PassGrid,
    start:       Pos,
    end:         Pos,
    reservation: &ReservationTable,
    deadline:    Option<i32>,
) -> Option<Vec<Pos>> {
    let found = astar(pass, start, end, Some(reservation), None, SearchMode::Lenient);
    if !found.found() {
        return None;
    }
    let mut route = found.route;
    if let Some(cutoff) = deadline {
        if route.len() as i32 > cutoff {
            return None;
        }
    }

    // Pad to the constraint horizon: wait in place when the final cell is
    // free at that slot, otherwise sidestep to a free neighbour.
    for t in route.len()..reservation.horizon() {
        let last = route[route.len() - 1];
        let candidates = std::iter::once(Some(last)).chain(
            agv_core::NEIGHBOURS
                .iter()
                .map(|&(dr, dc)| last.offset(dr, dc, pass.rows(), pass.cols())),
        );
        let slot = candidates
            .flatten()
            .find(|&p| pass.is_open(p) && !reservation.occupied(p, t));
        match slot {
            Some(p) => route.push(p),
            None => return None,
        }
    }
    Some(route)
}

/// One trip: start cell, goal cell, and an optional hard length cutoff.
struct Trip {
    start:    Pos,
    end:      Pos,
    deadline: Option<i32>,
}

/// Best-first search over constraint sets; priority is the joint plan's
/// maximum path length.  Returns `None` when the frontier empties without a
/// conflict-free node.
fn build_moving_plan(pass: &PassGrid, trips: &[Trip]) -> Option<Vec<Vec<Pos>>> {
    struct Node {
        solution:    Vec<Vec<Pos>>,
        constraints: Vec<Vec<Constraint>>,
    }

    let initial: Vec<Vec<Pos>> = trips
        .iter()
        .map(|trip| astar(pass, trip.start, trip.end, None, None, SearchMode::Lenient).route)
        .collect();
    if initial.iter().any(Vec::is_empty) {
        return None;
    }

    let mut arena: Vec<Node> = Vec::new();
    let mut frontier: BinaryHeap<Reverse<(usize, usize)>> = BinaryHeap::new();
    let root = Node {
        solution:    initial,
        constraints: vec![Vec::new(); trips.len()],
    };
    frontier.push(Reverse((cost(&root.solution), 0)));
    arena.push(root);

    while let Some(Reverse((_, id))) = frontier.pop() {
        let conflicts = validate(&arena[id].solution);
        if conflicts.is_empty() {
            return Some(arena.swap_remove(id).solution);
        }

        for (trip_i, cell, t) in conflicts {
            let mut constraints = arena[id].constraints.clone();
            constraints[trip_i].push((cell, t));
            let reservation = ReservationTable::from_constraints(
                pass.rows(),
                pass.cols(),
                &constraints[trip_i],
                AgentId(trip_i as u32),
            );
            let trip = &trips[trip_i];
            let Some(route) =
                low_level(pass, trip.start, trip.end, &reservation, trip.deadline)
            else {
                continue;
            };
            let mut solution = arena[id].solution.clone();
            solution[trip_i] = route;
            let priority = cost(&solution);
            let child = arena.len();
            arena.push(Node { solution, constraints });
            frontier.push(Reverse((priority, child)));
        }
    }

    None
}

// ── Planner ───────────────────────────────────────────────────────────────────

pub struct CbsPlanner {
    queues: Vec<VecDeque<Move>>,
}

impl CbsPlanner {
    /// Plan the whole run up front from the engine's current state.
    ///
    /// Falls back to an all-idle plan — one stay per agent — when the joint
    /// search is infeasible, so the simulation never halts.
    pub fn new(engine: &Engine) -> Self {
        let grid = engine.grid();
        let n = engine.agents().len();

        let mut pass = PassGrid::new(grid.rows(), grid.cols());
        for p in grid.positions() {
            if matches!(grid.layout(p), CellKind::Wall | CellKind::Spawn) {
                pass.block(p);
            }
        }

        // Parcels and shelves pair positionally after sorting each side by
        // destination id — identity already encodes the destination, so no
        // geometry is involved.
        let parcels = grid.parcel_positions();
        let shelves = grid.shelf_positions();
        let trips: Vec<Trip> = (0..grid.dest_count())
            .filter_map(|d| match (parcels[d], shelves[d]) {
                (Some(start), Some(end)) => Some(Trip {
                    start,
                    end,
                    // Remaining ticks minus one: the pickup toggle spends
                    // the first tick before any travel happens.
                    deadline: engine.deadlines().map(|dl| dl[d] - 1),
                }),
                _ => None,
            })
            .collect();

        let queues = match build_moving_plan(&pass, &trips) {
            Some(solution) => {
                let span = cost(&solution);
                let mut queues: Vec<VecDeque<Move>> = solution
                    .iter()
                    .map(|route| {
                        let mut q: VecDeque<Move> = VecDeque::with_capacity(span);
                        q.push_back(Move::grab_only());
                        q.extend(route_moves(route).iter().map(|&(dr, dc)| Move::step(dr, dc)));
                        while q.len() < span {
                            q.push_back(Move::STAY);
                        }
                        q
                    })
                    .collect();
                // Tripless agents idle for the whole plan.
                queues.resize_with(n, || {
                    std::iter::repeat(Move::STAY).take(span.max(1)).collect()
                });
                queues
            }
            None => vec![VecDeque::from([Move::STAY]); n],
        };

        Self { queues }
    }
}

impl Planner for CbsPlanner {
    fn pop_moves(&mut self, _engine: &Engine) -> (bool, Vec<Move>) {
        if self.queues.iter().all(|q| q.is_empty()) {
            return (false, Vec::new());
        }
        let moves = self
            .queues
            .iter_mut()
            .map(|q| q.pop_front().unwrap_or(Move::STAY))
            .collect();
        (true, moves)
    }
}
