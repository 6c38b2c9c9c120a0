//! The `Engine` struct and its tick state machine.

use std::sync::Mutex;

use agv_core::{AgentId, DestId, Move, Pos, SimRng};
use agv_grid::{CellKind, Grid};

use crate::config::{DeadlineMode, EngineConfig, GenMode, UnloadPolicy};
use crate::state::{Agent, EngineSnapshot, ScoreReport};
use crate::{EngineError, EngineResult};

/// Outcome of one agent's move attempt within a tick.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Attempt {
    /// Agent moved (or stayed) and its grab toggle was applied.
    Committed,
    /// Move was infeasible (bounds, wall, grounded parcel); agent stays put
    /// and the toggle is *not* applied.
    Rejected,
    /// Target cell currently occupied by another agent — retried in the
    /// resolution passes.
    Deferred,
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// The simulation engine: owns the grid layers, agents, deadlines, and
/// score, and advances them one tick at a time.
///
/// Planners never hold a mutable reference; they read state through the
/// accessor methods and hand move batches to [`Engine::tick`].
#[derive(Debug)]
pub struct Engine {
    grid:   Grid,
    agents: Vec<Agent>,

    /// Remaining ticks per destination type; `-1` = no outstanding parcel of
    /// that type (or lapsed and no longer counted down).  `None` when the
    /// run has no deadlines at all.
    deadlines: Option<Vec<i32>>,
    /// Inclusive range for randomly drawn deadlines.
    dl_bounds: (i32, i32),

    unload:        UnloadPolicy,
    parcel_gen:    GenMode,
    success_score: i64,

    /// Guarded only for concurrent read-out by reporting threads; the tick
    /// body itself is single-writer by contract.  A poisoned lock is
    /// recovered rather than propagated, so a panicking reader cannot take
    /// the tick loop down with it.
    pub(crate) score: Mutex<i64>,
    delivered: u64,
    late:      u64,
    ticks:     u64,

    rng: SimRng,
}

impl Engine {
    /// Build an engine from a validated grid and configuration.
    ///
    /// Agents are derived from the grid's occupant layer.  Fails on
    /// non-positive or inverted deadline bounds, a non-positive stochastic
    /// gap, or a supplied deadline table of the wrong length.
    pub fn new(grid: Grid, config: EngineConfig) -> EngineResult<Self> {
        let span = (grid.rows() + grid.cols()) as i32;
        let dl_bounds = config.deadline_bounds.unwrap_or((span, 4 * span));
        if dl_bounds.0 <= 0 || dl_bounds.0 > dl_bounds.1 {
            return Err(EngineError::Config(format!(
                "deadline bounds ({}, {}) must satisfy 0 < lower <= upper",
                dl_bounds.0, dl_bounds.1
            )));
        }
        if let GenMode::Stochastic { gap } = config.parcel_gen {
            if gap <= 0.0 {
                return Err(EngineError::Config(format!(
                    "stochastic generation gap {gap} must be positive"
                )));
            }
        }

        let mut rng = SimRng::new(config.seed);

        let deadlines = match config.deadlines {
            DeadlineMode::Off => None,
            DeadlineMode::Given(table) => {
                if table.len() != grid.dest_count() {
                    return Err(EngineError::DeadlineCount {
                        expected: grid.dest_count(),
                        got:      table.len(),
                    });
                }
                Some(table)
            }
            DeadlineMode::Random => {
                // Fresh slots for every parcel already on the map.
                let mut table = vec![-1; grid.dest_count()];
                for (i, slot) in table.iter_mut().enumerate() {
                    if grid.outstanding(DestId(i as u16)) {
                        *slot = rng.gen_range(dl_bounds.0..=dl_bounds.1);
                    }
                }
                Some(table)
            }
        };

        let agents = grid
            .occupant_positions()
            .into_iter()
            .map(|pos| Agent { pos, carrying: None })
            .collect();

        Ok(Self {
            grid,
            agents,
            deadlines,
            dl_bounds,
            unload: config.unload,
            parcel_gen: config.parcel_gen,
            success_score: config.success_score,
            score: Mutex::new(0),
            delivered: 0,
            late: 0,
            ticks: 0,
            rng,
        })
    }

    // ── Read accessors (planner-facing) ───────────────────────────────────

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    #[inline]
    pub fn deadlines(&self) -> Option<&[i32]> {
        self.deadlines.as_deref()
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // ── Tick ──────────────────────────────────────────────────────────────

    /// Advance the world by one tick given one proposed move per agent.
    ///
    /// A `moves` slice shorter than the agent list leaves the unlisted
    /// agents stationary; extra entries are ignored.  Returns the score
    /// delta earned this tick.
    ///
    /// Not reentrant: must be driven by a single thread per engine.
    pub fn tick(&mut self, moves: &[Move]) -> i64 {
        let acting = self.agents.len().min(moves.len());
        let mut order: Vec<usize> = (0..acting).collect();
        self.rng.shuffle(&mut order);

        // First pass: moves onto occupied cells become candidates.
        let mut candidates: Vec<usize> = Vec::new();
        for &i in &order {
            if self.attempt(i, moves[i]) == Attempt::Deferred {
                candidates.push(i);
            }
        }

        // Resolution passes: retry while progress is made.  Chains resolve
        // one link per pass; rotational cycles never shrink the candidate
        // set, so those agents stay put (documented limitation — a
        // topological resolution would be required to break them).
        let mut previous = usize::MAX;
        while !candidates.is_empty() && candidates.len() != previous {
            previous = candidates.len();
            candidates.retain(|&i| self.attempt(i, moves[i]) == Attempt::Deferred);
        }

        let delta = self.settle_scores();
        self.generate_parcels();
        self.decay_deadlines();
        self.ticks += 1;
        delta
    }

    /// Try one agent's move; on success also apply its grab toggle.
    fn attempt(&mut self, i: usize, mv: Move) -> Attempt {
        let old = self.agents[i].pos;

        if !mv.is_stationary() {
            let Some(new) =
                old.offset(mv.dr, mv.dc, self.grid.rows(), self.grid.cols())
            else {
                return Attempt::Rejected;
            };
            if self.grid.layout(new) == CellKind::Wall {
                return Attempt::Rejected;
            }
            if self.grid.occupant(new).is_some() {
                return Attempt::Deferred;
            }
            // A loaded AGV may not enter a cell holding a grounded parcel.
            if self.agents[i].carrying.is_some() && self.grid.parcel(new).is_some() {
                return Attempt::Rejected;
            }

            self.grid.set_occupant(old, None);
            self.grid.set_occupant(new, Some(AgentId(i as u32)));
            self.agents[i].pos = new;
            if let Some(carried) = self.agents[i].carrying {
                self.grid.set_parcel(old, None);
                self.grid.set_parcel(new, Some(carried));
            }
        }

        self.apply_toggle(i, mv, old);
        Attempt::Committed
    }

    /// Grab/drop handling after a committed move.  `vacated` is the cell
    /// the agent stood on before moving; pickup reads that cell's parcel
    /// (for a stationary grab it is simply the agent's own cell).
    fn apply_toggle(&mut self, i: usize, mv: Move, vacated: Pos) {
        match self.unload {
            UnloadPolicy::Auto => {
                if let Some(carried) = self.agents[i].carrying {
                    if self.grid.layout(self.agents[i].pos) == CellKind::Shelf(carried) {
                        self.agents[i].carrying = None;
                    }
                }
                if mv.grab && self.agents[i].carrying.is_none() {
                    self.agents[i].carrying = self.grid.parcel(vacated);
                }
            }
            UnloadPolicy::Manual => {
                if mv.grab {
                    if self.agents[i].carrying.is_some() {
                        self.agents[i].carrying = None;
                    } else {
                        self.agents[i].carrying = self.grid.parcel(vacated);
                    }
                }
            }
        }
    }

    // ── Scoring ───────────────────────────────────────────────────────────

    /// Detect deliveries, apply bonuses and overdue penalties, clear
    /// delivered parcels.  Returns this tick's score delta.
    fn settle_scores(&mut self) -> i64 {
        // A cell delivers when its shelf type matches its parcel and no
        // loaded agent is standing there (a carried parcel rides the
        // occupant and is not yet delivered).
        let mut correct: Vec<(Pos, DestId)> = Vec::new();
        for p in self.grid.positions() {
            if let CellKind::Shelf(dest) = self.grid.layout(p) {
                if self.grid.parcel(p) == Some(dest) {
                    let still_carried = self
                        .grid
                        .occupant(p)
                        .is_some_and(|a| self.agents[a.index()].carrying.is_some());
                    if !still_carried {
                        correct.push((p, dest));
                    }
                }
            }
        }

        let live: Vec<DestId> = self
            .grid
            .parcel_positions()
            .into_iter()
            .enumerate()
            .filter_map(|(i, pos)| pos.map(|_| DestId(i as u16)))
            .collect();

        let mut delta = 0i64;
        if let Some(table) = &mut self.deadlines {
            // Standing penalty for every lapsed live parcel — including ones
            // delivered this very tick, which pay the final penalty and the
            // bonus together.
            for dest in &live {
                if table[dest.index()] < 0 {
                    delta -= 1;
                }
            }
            for &(_, dest) in &correct {
                if table[dest.index()] < 0 {
                    self.late += 1;
                }
                delta += self.success_score;
                self.delivered += 1;
                table[dest.index()] = -1;
            }
        } else {
            delta += self.success_score * correct.len() as i64;
            self.delivered += correct.len() as u64;
        }

        *self.score.lock().unwrap_or_else(|e| e.into_inner()) += delta;

        for &(p, _) in &correct {
            self.grid.set_parcel(p, None);
        }
        delta
    }

    // ── Parcel generation ─────────────────────────────────────────────────

    fn generate_parcels(&mut self) {
        match &self.parcel_gen {
            GenMode::Off => {}
            GenMode::Stochastic { gap } => {
                let gap = *gap;
                let count = if gap < 1.0 {
                    (self.rng.random::<f64>() * 2.0 / gap).round() as usize
                } else if self.rng.gen_bool(1.0 / gap) {
                    1
                } else {
                    0
                };
                self.spawn_random(count);
            }
            GenMode::Scripted(schedule) => {
                let events = schedule
                    .get(self.ticks as usize)
                    .cloned()
                    .unwrap_or_default();
                for ev in events {
                    // Skip spawns onto a cell that already holds a parcel and
                    // types that are still outstanding.
                    if self.grid.parcel(ev.pos).is_some() || self.grid.outstanding(ev.dest) {
                        continue;
                    }
                    self.grid.set_parcel(ev.pos, Some(ev.dest));
                    let (lo, hi) = self.dl_bounds;
                    if let Some(table) = &mut self.deadlines {
                        table[ev.dest.index()] =
                            ev.deadline.unwrap_or_else(|| self.rng.gen_range(lo..=hi));
                    }
                }
            }
        }
    }

    /// Spawn up to `count` parcels at random free spawn cells, choosing
    /// destination types uniformly among those with no outstanding parcel.
    fn spawn_random(&mut self, count: usize) {
        for _ in 0..count {
            let free: Vec<Pos> = self
                .grid
                .spawn_positions()
                .into_iter()
                .filter(|&p| self.grid.parcel(p).is_none())
                .collect();
            if free.is_empty() {
                break; // every spawn point already holds a parcel
            }
            if self.grid.live_parcel_count() >= self.grid.dest_count() {
                break; // no destination type left without a live parcel
            }
            let Some(&pos) = self.rng.choose(&free) else { break };

            let available: Vec<DestId> = (0..self.grid.dest_count() as u16)
                .map(DestId)
                .filter(|&d| !self.grid.outstanding(d))
                .collect();
            let Some(&dest) = self.rng.choose(&available) else { break };

            let (lo, hi) = self.dl_bounds;
            if let Some(table) = &mut self.deadlines {
                table[dest.index()] = self.rng.gen_range(lo..=hi);
            }
            self.grid.set_parcel(pos, Some(dest));
        }
    }

    fn decay_deadlines(&mut self) {
        if let Some(table) = &mut self.deadlines {
            for slot in table.iter_mut() {
                *slot = (*slot - 1).max(-1);
            }
        }
    }

    // ── Reporting and snapshots ───────────────────────────────────────────

    /// Cumulative scores plus the current overdue count (recomputed from the
    /// live grid).  Safe to call from a reporting thread while another
    /// thread ticks.
    pub fn score_report(&self) -> ScoreReport {
        let currently_overdue = match &self.deadlines {
            None => 0,
            Some(table) => self
                .grid
                .parcel_positions()
                .iter()
                .enumerate()
                .filter(|&(i, pos)| pos.is_some() && table[i] < 0)
                .count() as u64,
        };
        ScoreReport {
            ticks: self.ticks,
            score: *self.score.lock().unwrap_or_else(|e| e.into_inner()),
            delivered: self.delivered,
            late_delivered: self.late,
            currently_overdue,
        }
    }

    /// Copy out the world state (grid layers, agents, deadlines).
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            grid:      self.grid.clone(),
            agents:    self.agents.clone(),
            deadlines: self.deadlines.clone(),
        }
    }

    /// Replace the world state with a snapshot.
    ///
    /// Score and tick counters are engine-lifetime and untouched; restoring
    /// onto a fresh engine with the same seed reproduces the original run's
    /// behavior move-for-move.
    pub fn restore(&mut self, snapshot: EngineSnapshot) -> EngineResult<()> {
        if snapshot.agents.len() != snapshot.grid.agent_count() {
            return Err(EngineError::SnapshotMismatch {
                what:     "agent list",
                expected: snapshot.grid.agent_count(),
                got:      snapshot.agents.len(),
            });
        }
        if let Some(table) = &snapshot.deadlines {
            if table.len() != snapshot.grid.dest_count() {
                return Err(EngineError::SnapshotMismatch {
                    what:     "deadline table",
                    expected: snapshot.grid.dest_count(),
                    got:      table.len(),
                });
            }
        }
        self.grid = snapshot.grid;
        self.agents = snapshot.agents;
        self.deadlines = snapshot.deadlines;
        Ok(())
    }
}
