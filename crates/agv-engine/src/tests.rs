//! Integration tests for the engine tick state machine.

use agv_core::{AgentId, DestId, Move, Pos};
use agv_grid::{CellKind, Grid};

use crate::{
    DeadlineMode, Engine, EngineConfig, EngineError, GenMode, SpawnEvent, UnloadPolicy,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// 1×5 corridor, shelf 1 at the right end, agent 1 at the left end, parcel
/// of type 1 under the agent.
fn corridor() -> Grid {
    let layout = [0, 0, 0, 0, 1];
    let parcel = [1, 0, 0, 0, 0];
    let occupant = [1, 0, 0, 0, 0];
    Grid::from_layers(1, 5, &layout, &parcel, &occupant).unwrap()
}

fn engine(grid: Grid, config: EngineConfig) -> Engine {
    Engine::new(grid, config).unwrap()
}

fn stay(n: usize) -> Vec<Move> {
    vec![Move::STAY; n]
}

/// Assert the occupant layer is exactly the inverse of the agent list and no
/// agent stands on a wall.
fn assert_occupancy_invariant(e: &Engine) {
    let grid = e.grid();
    let mut seen = vec![false; e.agents().len()];
    for p in grid.positions() {
        if let Some(a) = grid.occupant(p) {
            assert_eq!(e.agents()[a.index()].pos, p, "layer/agent disagreement at {p}");
            assert!(!seen[a.index()], "agent {a} appears twice");
            assert_ne!(grid.layout(p), CellKind::Wall, "agent {a} on a wall");
            seen[a.index()] = true;
        }
    }
    assert!(seen.iter().all(|&s| s), "agent missing from occupant layer");
}

// ── Construction ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod construction {
    use super::*;

    #[test]
    fn agents_derived_from_occupant_layer() {
        let e = engine(corridor(), EngineConfig::default());
        assert_eq!(e.agents().len(), 1);
        assert_eq!(e.agents()[0].pos, Pos::new(0, 0));
        assert_eq!(e.agents()[0].carrying, None);
    }

    #[test]
    fn wrong_deadline_table_length_rejected() {
        let config = EngineConfig {
            deadlines: DeadlineMode::Given(vec![5, 5]), // grid has 1 type
            ..EngineConfig::default()
        };
        let err = Engine::new(corridor(), config).unwrap_err();
        assert!(matches!(err, EngineError::DeadlineCount { expected: 1, got: 2 }));
    }

    #[test]
    fn inverted_deadline_bounds_rejected() {
        let config = EngineConfig {
            deadline_bounds: Some((10, 5)),
            ..EngineConfig::default()
        };
        assert!(matches!(Engine::new(corridor(), config), Err(EngineError::Config(_))));
    }

    #[test]
    fn non_positive_gap_rejected() {
        let config = EngineConfig {
            parcel_gen: GenMode::Stochastic { gap: 0.0 },
            ..EngineConfig::default()
        };
        assert!(matches!(Engine::new(corridor(), config), Err(EngineError::Config(_))));
    }

    #[test]
    fn random_deadlines_cover_initial_parcels() {
        let config = EngineConfig {
            deadlines: DeadlineMode::Random,
            deadline_bounds: Some((4, 8)),
            ..EngineConfig::default()
        };
        let e = engine(corridor(), config);
        let table = e.deadlines().unwrap();
        assert!((4..=8).contains(&table[0]), "got {}", table[0]);
    }
}

// ── Movement resolution ───────────────────────────────────────────────────────

#[cfg(test)]
mod movement {
    use super::*;

    #[test]
    fn free_cell_move_updates_both_layers() {
        let mut e = engine(corridor(), EngineConfig::default());
        e.tick(&[Move::step(0, 1)]);
        assert_eq!(e.agents()[0].pos, Pos::new(0, 1));
        assert_eq!(e.grid().occupant(Pos::new(0, 1)), Some(AgentId(0)));
        assert_eq!(e.grid().occupant(Pos::new(0, 0)), None);
        assert_occupancy_invariant(&e);
    }

    #[test]
    fn bounds_and_walls_reject() {
        let layout = [0, -1];
        let mut e = engine(
            Grid::from_layers(1, 2, &layout, &[0, 0], &[1, 0]).unwrap(),
            EngineConfig::default(),
        );
        e.tick(&[Move::step(0, -1)]); // off the grid
        assert_eq!(e.agents()[0].pos, Pos::new(0, 0));
        e.tick(&[Move::step(0, 1)]); // into the wall
        assert_eq!(e.agents()[0].pos, Pos::new(0, 0));
        assert_occupancy_invariant(&e);
    }

    #[test]
    fn chains_resolve_regardless_of_shuffle_order() {
        // Two agents nose to tail both stepping right: the follower must
        // commit once the leader vacates, in the same tick, whatever order
        // the shuffle picked.
        let occupant = [1, 2, 0, 0, 0];
        let grid = Grid::from_layers(1, 5, &[0; 5], &[0; 5], &occupant).unwrap();
        for seed in 0..16 {
            let mut e = engine(grid.clone(), EngineConfig { seed, ..EngineConfig::default() });
            e.tick(&[Move::step(0, 1), Move::step(0, 1)]);
            assert_eq!(e.agents()[0].pos, Pos::new(0, 1), "seed {seed}");
            assert_eq!(e.agents()[1].pos, Pos::new(0, 2), "seed {seed}");
            assert_occupancy_invariant(&e);
        }
    }

    #[test]
    fn rotational_cycle_stays_put() {
        // A and B want each other's cells; the resolution passes cannot
        // break the cycle, so both agents stay — for any shuffle order.
        let occupant = [1, 2];
        let grid = Grid::from_layers(1, 2, &[0, 0], &[0, 0], &occupant).unwrap();
        for seed in 0..16 {
            let mut e = engine(grid.clone(), EngineConfig { seed, ..EngineConfig::default() });
            for _ in 0..10 {
                e.tick(&[Move::step(0, 1), Move::step(0, -1)]);
                assert_eq!(e.agents()[0].pos, Pos::new(0, 0), "seed {seed}");
                assert_eq!(e.agents()[1].pos, Pos::new(0, 1), "seed {seed}");
            }
            assert_occupancy_invariant(&e);
        }
    }

    #[test]
    fn loaded_agent_cannot_enter_grounded_parcel_cell() {
        let layout = [2, 1, 0];
        let parcel = [1, 2, 0];
        let occupant = [1, 0, 0];
        let grid = Grid::from_layers(1, 3, &layout, &parcel, &occupant).unwrap();
        let mut e = engine(grid, EngineConfig::default());
        e.tick(&[Move::grab_only()]); // pick up parcel 1 underfoot
        assert_eq!(e.agents()[0].carrying, Some(DestId(0)));
        e.tick(&[Move::step(0, 1)]); // blocked by grounded parcel 2
        assert_eq!(e.agents()[0].pos, Pos::new(0, 0));
    }

    #[test]
    fn short_move_slice_leaves_rest_stationary() {
        let occupant = [1, 0, 2, 0, 0];
        let grid = Grid::from_layers(1, 5, &[0; 5], &[0; 5], &occupant).unwrap();
        let mut e = engine(grid, EngineConfig::default());
        e.tick(&[Move::step(0, 1)]); // nothing for agent 2
        assert_eq!(e.agents()[0].pos, Pos::new(0, 1));
        assert_eq!(e.agents()[1].pos, Pos::new(0, 2));
    }
}

// ── Carry, delivery, and scoring ──────────────────────────────────────────────

#[cfg(test)]
mod scoring {
    use super::*;

    #[test]
    fn manual_carry_and_delivery() {
        let mut e = engine(corridor(), EngineConfig::default());
        assert_eq!(e.tick(&[Move::grab_only()]), 0);
        assert_eq!(e.agents()[0].carrying, Some(DestId(0)));

        // Haul the parcel to the shelf at (0, 4): the parcel layer rides.
        for _ in 0..4 {
            e.tick(&[Move::step(0, 1)]);
        }
        assert_eq!(e.agents()[0].pos, Pos::new(0, 4));
        assert_eq!(e.grid().parcel(Pos::new(0, 4)), Some(DestId(0)));
        assert_eq!(e.score_report().delivered, 0); // still carried

        // Drop: scored the same tick, parcel cleared.
        let delta = e.tick(&[Move::grab_only()]);
        assert_eq!(delta, 10);
        assert_eq!(e.grid().parcel(Pos::new(0, 4)), None);
        let report = e.score_report();
        assert_eq!(report.score, 10);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.late_delivered, 0);
    }

    #[test]
    fn auto_unload_drops_without_toggle() {
        let config = EngineConfig { unload: UnloadPolicy::Auto, ..EngineConfig::default() };
        let mut e = engine(corridor(), config);
        e.tick(&[Move::grab_only()]);
        for _ in 0..3 {
            e.tick(&[Move::step(0, 1)]);
        }
        // The step onto the shelf unloads immediately and scores.
        let delta = e.tick(&[Move::step(0, 1)]);
        assert_eq!(delta, 10);
        assert_eq!(e.agents()[0].carrying, None);
        assert_eq!(e.score_report().delivered, 1);
    }

    #[test]
    fn lapsed_parcel_accrues_penalty_each_tick_and_late_once() {
        let config = EngineConfig {
            deadlines: DeadlineMode::Given(vec![2]),
            ..EngineConfig::default()
        };
        let mut e = engine(corridor(), config);

        // Three ticks count the slot down 2 → 1 → 0 → -1; no penalty yet.
        assert_eq!(e.tick(&stay(1)), 0);
        assert_eq!(e.tick(&stay(1)), 0);
        assert_eq!(e.tick(&stay(1)), 0);
        // From then on the outstanding parcel is lapsed: -1 per tick.
        assert_eq!(e.tick(&stay(1)), -1);
        assert_eq!(e.tick(&stay(1)), -1);
        assert_eq!(e.score_report().currently_overdue, 1);

        // Deliver late: final -1 penalty plus the bonus, late counted once.
        e.tick(&[Move::grab_only()]);
        for _ in 0..4 {
            e.tick(&[Move::step(0, 1)]);
        }
        let delta = e.tick(&[Move::grab_only()]);
        assert_eq!(delta, 9); // +10 delivery, -1 final overdue tick
        let report = e.score_report();
        assert_eq!(report.late_delivered, 1);
        assert_eq!(report.currently_overdue, 0);
        assert_eq!(e.deadlines().unwrap()[0], -1);

        // No further penalties or late counts accrue.
        assert_eq!(e.tick(&stay(1)), 0);
        assert_eq!(e.score_report().late_delivered, 1);
    }

    #[test]
    fn score_survives_a_panicked_reader() {
        let mut e = engine(corridor(), EngineConfig::default());
        e.tick(&[Move::grab_only()]);

        // A reporting thread panicking mid-read poisons the score lock.
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = e.score.lock().unwrap();
            panic!("reader died");
        }));
        assert!(panicked.is_err());

        // Ticking and reporting both recover the lock instead of unwinding.
        for _ in 0..4 {
            e.tick(&[Move::step(0, 1)]);
        }
        assert_eq!(e.tick(&[Move::grab_only()]), 10);
        assert_eq!(e.score_report().score, 10);
    }
}

// ── Parcel generation ─────────────────────────────────────────────────────────

#[cfg(test)]
mod generation {
    use super::*;

    /// 2×3 with two spawn cells, two shelves, no initial parcels.
    fn spawn_grid() -> Grid {
        #[rustfmt::skip]
        let layout = [
            -2, 0, 1,
            -2, 0, 2,
        ];
        Grid::from_layers(2, 3, &layout, &[0; 6], &[0; 6]).unwrap()
    }

    #[test]
    fn stochastic_spawns_respect_uniqueness_and_spawn_cells() {
        let config = EngineConfig {
            seed: 11,
            parcel_gen: GenMode::Stochastic { gap: 0.5 },
            ..EngineConfig::default()
        };
        let mut e = engine(spawn_grid(), config);
        let mut seen_any = false;
        for _ in 0..50 {
            e.tick(&[]);
            let mut per_type = [0usize; 2];
            for p in e.grid().positions() {
                if let Some(d) = e.grid().parcel(p) {
                    seen_any = true;
                    per_type[d.index()] += 1;
                    assert_eq!(e.grid().layout(p), CellKind::Spawn);
                }
            }
            assert!(per_type.iter().all(|&n| n <= 1), "duplicate live type");
        }
        assert!(seen_any, "gap 0.5 over 50 ticks should spawn something");
    }

    #[test]
    fn scripted_spawns_skip_occupied_and_outstanding() {
        let schedule = vec![
            // Tick 0: one spawn lands, the duplicate type is skipped.
            vec![
                SpawnEvent { pos: Pos::new(0, 0), dest: DestId(0), deadline: None },
                SpawnEvent { pos: Pos::new(1, 0), dest: DestId(0), deadline: None },
            ],
            // Tick 1: same cell again — skipped because it still holds a
            // parcel; a second type lands on the other spawn.
            vec![
                SpawnEvent { pos: Pos::new(0, 0), dest: DestId(1), deadline: None },
                SpawnEvent { pos: Pos::new(1, 0), dest: DestId(1), deadline: None },
            ],
        ];
        let config = EngineConfig {
            parcel_gen: GenMode::Scripted(schedule),
            ..EngineConfig::default()
        };
        let mut e = engine(spawn_grid(), config);
        e.tick(&[]);
        assert_eq!(e.grid().parcel(Pos::new(0, 0)), Some(DestId(0)));
        assert_eq!(e.grid().parcel(Pos::new(1, 0)), None);
        e.tick(&[]);
        assert_eq!(e.grid().parcel(Pos::new(0, 0)), Some(DestId(0)));
        assert_eq!(e.grid().parcel(Pos::new(1, 0)), Some(DestId(1)));
        // Past the end of the schedule: nothing else appears.
        e.tick(&[]);
        assert_eq!(e.grid().live_parcel_count(), 2);
    }
}

// ── Snapshots ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod snapshots {
    use super::*;

    #[test]
    fn restore_reproduces_behavior() {
        let config = EngineConfig { seed: 5, ..EngineConfig::default() };
        let occupant = [1, 0, 2, 0, 0];
        let grid = Grid::from_layers(1, 5, &[0; 5], &[0; 5], &occupant).unwrap();

        let mut original = engine(grid.clone(), config.clone());
        let snap = original.snapshot();

        let mut replica = engine(grid, config);
        replica.restore(snap).unwrap();

        let moves = [Move::step(0, 1), Move::step(0, -1)];
        for _ in 0..20 {
            original.tick(&moves);
            replica.tick(&moves);
        }
        assert_eq!(original.agents(), replica.agents());
        assert_eq!(original.score_report(), replica.score_report());
    }

    #[test]
    fn restore_rejects_mismatched_snapshot() {
        let mut e = engine(corridor(), EngineConfig::default());
        let mut snap = e.snapshot();
        snap.agents.push(snap.agents[0]);
        assert!(matches!(
            e.restore(snap),
            Err(EngineError::SnapshotMismatch { what: "agent list", .. })
        ));
    }
}

// ── Long-run invariants ───────────────────────────────────────────────────────

#[cfg(test)]
mod invariants {
    use super::*;
    use agv_core::SimRng;

    #[test]
    fn occupancy_invariant_holds_under_random_driving() {
        #[rustfmt::skip]
        let layout = [
            -2,  0,  0,  1,
             0, -1,  0,  0,
             0,  0,  0,  2,
        ];
        let occupant = [
            0, 1, 0, 0,
            0, 0, 2, 0,
            3, 0, 0, 0,
        ];
        let grid = Grid::from_layers(3, 4, &layout, &[0; 12], &occupant).unwrap();
        let config = EngineConfig {
            seed: 9,
            parcel_gen: GenMode::Stochastic { gap: 2.0 },
            deadlines: DeadlineMode::Random,
            ..EngineConfig::default()
        };
        let mut e = engine(grid, config);
        let mut driver = SimRng::new(77);
        let deltas = [(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)];
        for _ in 0..200 {
            let moves: Vec<Move> = (0..3)
                .map(|_| {
                    let &(dr, dc) = driver.choose(&deltas).unwrap();
                    Move { dr, dc, grab: driver.gen_bool(0.2) }
                })
                .collect();
            e.tick(&moves);
            assert_occupancy_invariant(&e);
        }
    }
}
