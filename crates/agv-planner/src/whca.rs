//! Windowed cooperative A* (WHCA*).
//!
//! Every agent plans a bounded-lookahead route against a shared rolling
//! reservation table, one agent at a time, so later agents route around the
//! space-time slots earlier agents already claimed.  Replans happen whenever
//! an agent's queue runs dry or the world drifts from what the table
//! predicted (the engine's unresolved-cycle behavior makes drift routine).
//!
//! Congestion relief is deliberately blunt: an agent parked on the same cell
//! for `max_stay` replans walks to a random nearby cell, ignoring the
//! reservation table for that one route.  The escape target is never the
//! agent's real goal; it exists purely to break local standoffs.

use std::collections::VecDeque;
use std::str::FromStr;

use agv_core::{AgentId, DestId, Move, Pos, SimRng};
use agv_engine::Engine;
use agv_grid::{astar, CellKind, DistanceTable, PassGrid, ReservationTable, SearchMode};

use crate::error::PlannerError;
use crate::Planner;

// ── Assignment policy ─────────────────────────────────────────────────────────

/// How free agents are paired with outstanding parcels.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum AssignmentPolicy {
    /// Distance-aware pairing; with deadlines active, most-urgent parcel
    /// first.
    #[default]
    Greedy,
    /// Arbitrary pairing in destination-id order, ignoring distance.
    Random,
}

impl FromStr for AssignmentPolicy {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(Self::Greedy),
            "random" => Ok(Self::Random),
            other => Err(PlannerError::UnknownPolicy(other.to_owned())),
        }
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct WhcaConfig {
    /// Planning window in moves; routes are truncated to this many steps.
    /// `0` disables truncation.
    pub horizon: usize,
    /// Consecutive same-cell replans before an escape move is forced.
    pub max_stay: u32,
    pub policy: AssignmentPolicy,
    /// Build the all-pairs distance table and use it as the heuristic for
    /// loaded agents.  `O((rows·cols)²)` construction — small grids only.
    pub use_distance_table: bool,
    /// Idle agents wander to random cells instead of returning to their
    /// start cell.
    pub puzzle: bool,
    /// Seed for escape targets and puzzle-mode goals.
    pub seed: u64,
}

impl Default for WhcaConfig {
    fn default() -> Self {
        Self {
            horizon:            10,
            max_stay:           3,
            policy:             AssignmentPolicy::Greedy,
            use_distance_table: false,
            puzzle:             false,
            seed:               0,
        }
    }
}

// ── Planner ───────────────────────────────────────────────────────────────────

/// Per-agent stationary-duration tracker.
#[derive(Copy, Clone)]
struct StayTracker {
    pos:   Pos,
    count: u32,
}

pub struct WhcaPlanner {
    config:      WhcaConfig,
    heuristic:   Option<DistanceTable>,
    /// Target parcel type per agent; `None` = idle.  Survives pickup and is
    /// cleared the tick a drop executes.
    assignment:  Vec<Option<DestId>>,
    reservation: ReservationTable,
    queues:      Vec<VecDeque<Move>>,
    stay:        Vec<StayTracker>,
    /// Start cells, used as idle parking targets and for the depot
    /// soft-block.
    home:        Vec<Pos>,
    rng:         SimRng,
}

impl WhcaPlanner {
    pub fn new(engine: &Engine, config: WhcaConfig) -> Self {
        let grid = engine.grid();
        let n = engine.agents().len();

        let heuristic = config.use_distance_table.then(|| {
            let mut pass = PassGrid::new(grid.rows(), grid.cols());
            for p in grid.positions() {
                if matches!(grid.layout(p), CellKind::Wall | CellKind::Spawn) {
                    pass.block(p);
                }
            }
            DistanceTable::build(&pass)
        });

        let home: Vec<Pos> = engine.agents().iter().map(|a| a.pos).collect();
        let stay = home.iter().map(|&pos| StayTracker { pos, count: 0 }).collect();

        let mut planner = Self {
            reservation: ReservationTable::new(grid.rows(), grid.cols(), config.horizon + 1),
            rng: SimRng::new(config.seed),
            assignment: vec![None; n],
            queues: vec![VecDeque::new(); n],
            heuristic,
            stay,
            home,
            config,
        };

        planner.assign(engine);
        for i in 0..n {
            planner.replan(i, engine, false);
        }
        planner
    }

    /// Current parcel assignment per agent.
    pub fn assignments(&self) -> &[Option<DestId>] {
        &self.assignment
    }

    // ── Assignment ────────────────────────────────────────────────────────

    fn assign(&mut self, engine: &Engine) {
        match self.config.policy {
            AssignmentPolicy::Greedy => self.assign_greedy(engine),
            AssignmentPolicy::Random => self.assign_arbitrary(engine),
        }
    }

    fn is_taken(&self, dest: DestId) -> bool {
        self.assignment.contains(&Some(dest))
    }

    /// Nearest free agent for the parcel (or vice versa when agents are the
    /// scarce side); with deadlines active, parcels are served most-urgent
    /// first.
    fn assign_greedy(&mut self, engine: &Engine) {
        let grid = engine.grid();
        let parcels = grid.parcel_positions();

        if let Some(deadlines) = engine.deadlines() {
            let mut order: Vec<usize> = (0..parcels.len()).collect();
            order.sort_by_key(|&d| deadlines[d]);
            for d in order {
                if let Some(par) = parcels[d] {
                    self.assign_nearest_agent(engine, DestId(d as u16), par);
                }
            }
        } else if grid.live_parcel_count() <= engine.agents().len() {
            // Parcels are scarce: each parcel pulls in its nearest free
            // agent.
            for (d, par) in parcels.iter().enumerate() {
                if let Some(par) = *par {
                    self.assign_nearest_agent(engine, DestId(d as u16), par);
                }
            }
        } else {
            // Agents are scarce: each free agent grabs its nearest
            // unclaimed parcel.
            for i in 0..self.assignment.len() {
                if self.assignment[i].is_some() {
                    continue;
                }
                let pos = engine.agents()[i].pos;
                let mut by_dist: Vec<(usize, usize)> = parcels
                    .iter()
                    .enumerate()
                    .filter_map(|(d, par)| par.map(|p| (pos.manhattan(p), d)))
                    .collect();
                by_dist.sort();
                for (_, d) in by_dist {
                    let dest = DestId(d as u16);
                    if !self.is_taken(dest) {
                        self.assignment[i] = Some(dest);
                        break;
                    }
                }
            }
        }
    }

    fn assign_nearest_agent(&mut self, engine: &Engine, dest: DestId, par: Pos) {
        if self.is_taken(dest) {
            return;
        }
        let nearest = engine
            .agents()
            .iter()
            .enumerate()
            .filter(|&(j, _)| self.assignment[j].is_none())
            .min_by_key(|&(j, a)| (a.pos.manhattan(par), j));
        if let Some((j, _)) = nearest {
            self.assignment[j] = Some(dest);
        }
    }

    /// First-fit pairing in destination-id order.
    fn assign_arbitrary(&mut self, engine: &Engine) {
        let parcels = engine.grid().parcel_positions();
        for i in 0..self.assignment.len() {
            if self.assignment[i].is_some() {
                continue;
            }
            for (d, par) in parcels.iter().enumerate() {
                let dest = DestId(d as u16);
                if par.is_some() && !self.is_taken(dest) {
                    self.assignment[i] = Some(dest);
                    break;
                }
            }
        }
    }

    // ── Route planning ────────────────────────────────────────────────────

    /// Passability mask for agent `i` as the world stands right now.
    fn passability(&self, engine: &Engine, i: usize, carrying: bool) -> PassGrid {
        let grid = engine.grid();
        let mut pass = PassGrid::new(grid.rows(), grid.cols());

        for p in grid.positions() {
            if grid.layout(p) == CellKind::Wall || grid.occupant(p).is_some() {
                pass.block(p);
            }
            if carrying && (grid.parcel(p).is_some() || grid.layout(p) == CellKind::Spawn) {
                pass.block(p);
            }
        }

        // Depot soft-block: when over half the fleet is parked at its start
        // cell, keep everyone else out of the parking area.
        let parked = engine
            .agents()
            .iter()
            .zip(&self.home)
            .filter(|(a, h)| a.pos == **h)
            .count();
        if 2 * parked > self.home.len() {
            for (j, &h) in self.home.iter().enumerate() {
                if j != i {
                    pass.block(h);
                }
            }
        }

        pass
    }

    /// Goal cell for agent `i`'s next route, or `None` when its assigned
    /// parcel has vanished from the grid.
    fn goal(&mut self, engine: &Engine, i: usize) -> Option<Pos> {
        let grid = engine.grid();
        let agent = &engine.agents()[i];

        if let Some(dest) = agent.carrying {
            return grid.shelf_positions()[dest.index()];
        }
        match self.assignment[i] {
            Some(dest) => grid.parcel_positions()[dest.index()],
            None if self.config.puzzle => {
                let open: Vec<Pos> = grid
                    .positions()
                    .filter(|&p| matches!(grid.layout(p), CellKind::Floor | CellKind::Shelf(_)))
                    .collect();
                self.rng.choose(&open).copied()
            }
            None => Some(self.home[i]),
        }
    }

    /// A random cell within a ±3 box around `pos`, clamped to the grid.
    fn escape_target(&mut self, engine: &Engine, pos: Pos) -> Pos {
        let grid = engine.grid();
        let row = (pos.row as i32 + self.rng.gen_range(-3..=3))
            .clamp(0, grid.rows() as i32 - 1);
        let col = (pos.col as i32 + self.rng.gen_range(-3..=3))
            .clamp(0, grid.cols() as i32 - 1);
        Pos::new(row as usize, col as usize)
    }

    /// Recompute agent `i`'s route, reserve it, and refill its move queue.
    fn replan(&mut self, i: usize, engine: &Engine, escape: bool) {
        let agent = engine.agents()[i];
        let pos = agent.pos;
        let carrying = agent.carrying.is_some();
        let assigned = carrying || self.assignment[i].is_some();

        let goal = if escape {
            Some(self.escape_target(engine, pos))
        } else {
            self.goal(engine, i)
        };

        let (mut route, mut moves) = match goal {
            Some(goal) => {
                let pass = self.passability(engine, i, carrying);
                // The escape route deliberately ignores reservations: it
                // exists to shake up a standoff, not to respect it.
                let reservation = (!escape).then_some(&self.reservation);
                let heuristic = if carrying { self.heuristic.as_ref() } else { None };
                let found = astar(&pass, pos, goal, reservation, heuristic, SearchMode::Strict);
                let moves: Vec<Move> =
                    found.moves.iter().map(|&(dr, dc)| Move::step(dr, dc)).collect();
                (found.route, moves)
            }
            None => (Vec::new(), Vec::new()),
        };

        if moves.is_empty() {
            // Reached the goal already, or no route exists.  A toggle on the
            // spot handles "standing on the target"; otherwise hold still.
            let grab = !escape && assigned && !route.is_empty();
            route = vec![pos, pos];
            moves = vec![if grab { Move::grab_only() } else { Move::STAY }];
        } else if !escape && assigned {
            // Pick up or drop once the goal cell is reached.
            route.push(route[route.len() - 1]);
            moves.push(Move::grab_only());
        }

        if self.config.horizon > 0 && route.len() > self.config.horizon + 1 {
            route.truncate(self.config.horizon + 1);
            moves.truncate(self.config.horizon);
        }

        self.reservation.reserve_route(&route, AgentId(i as u32));
        self.queues[i] = moves.into_iter().collect();
    }
}

impl Planner for WhcaPlanner {
    fn pop_moves(&mut self, engine: &Engine) -> (bool, Vec<Move>) {
        self.assign(engine);

        for i in 0..self.queues.len() {
            let pos = engine.agents()[i].pos;

            // On track: the table still predicts this agent here at offset
            // 0 and it has queued moves left.
            let on_track = !self.queues[i].is_empty()
                && self.reservation.holder(pos, 0) == Some(AgentId(i as u32));
            if on_track {
                continue;
            }

            let tracker = &mut self.stay[i];
            let escape = if tracker.pos == pos {
                tracker.count += 1;
                tracker.count >= self.config.max_stay && pos != self.home[i]
            } else {
                *tracker = StayTracker { pos, count: 0 };
                false
            };

            self.replan(i, engine, escape);
        }

        let moves: Vec<Move> = self
            .queues
            .iter_mut()
            .map(|q| q.pop_front().unwrap_or(Move::STAY))
            .collect();

        self.reservation.shift();

        // A toggle while loaded is a drop: that delivery attempt ends the
        // assignment whatever the engine makes of it.
        for (i, mv) in moves.iter().enumerate() {
            if mv.grab && engine.agents()[i].carrying.is_some() {
                self.assignment[i] = None;
            }
        }

        (true, moves)
    }
}
