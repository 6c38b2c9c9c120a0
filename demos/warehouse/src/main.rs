//! warehouse — demo driver for the agvsim framework.
//!
//! Runs a small 6×8 warehouse twice: a 200-tick shift under the windowed
//! cooperative planner with stochastic parcel generation and deadlines, then
//! a fixed four-parcel instance solved one-shot by CBS.  Swap the layer
//! constants for a real floor plan to run an actual site layout.

use std::time::Instant;

use anyhow::Result;

use agv_core::SimRng;
use agv_engine::{DeadlineMode, Engine, EngineConfig, GenMode, UnloadPolicy};
use agv_grid::Grid;
use agv_planner::{CbsPlanner, Planner, WhcaConfig, WhcaPlanner};

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:        u64 = 42;
const SHIFT_TICKS: u64 = 200;
const ROWS: usize = 6;
const COLS: usize = 8;

// Layout encoding: -1 wall, -2 spawn, 0 floor, k > 0 shelf for type k.
#[rustfmt::skip]
const LAYOUT: [i32; ROWS * COLS] = [
    -2,  0,  0,  0,  0,  0,  0,  1,
    -2,  0, -1, -1, -1,  0,  0,  2,
     0,  0,  0,  0,  0,  0,  0,  3,
     0,  0, -1, -1, -1,  0,  0,  4,
    -2,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const PARCEL: [i32; ROWS * COLS] = [
     1,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     3,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const OCCUPANT: [i32; ROWS * COLS] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  0,  0,  0,  0,  0,  0,  0,
     0,  1,  2,  3,  0,  0,  0,  0,
];

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    println!("=== warehouse — agvsim demo ===");
    println!("Grid: {ROWS}×{COLS}  |  Seed: {SEED}");
    println!();

    let mut seeds = SimRng::new(SEED);

    // 1. WHCA* shift: rolling replans, stochastic parcel stream, deadlines.
    let grid = Grid::from_layers(ROWS, COLS, &LAYOUT, &PARCEL, &OCCUPANT)?;
    let config = EngineConfig {
        seed:            seeds.child(0).random(),
        unload:          UnloadPolicy::Manual,
        parcel_gen:      GenMode::Stochastic { gap: 3.0 },
        deadlines:       DeadlineMode::Random,
        deadline_bounds: Some((20, 60)),
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(grid, config)?;
    let whca = WhcaConfig {
        horizon: 10,
        seed: seeds.child(1).random(),
        ..WhcaConfig::default()
    };
    let mut planner = WhcaPlanner::new(&engine, whca);

    let t0 = Instant::now();
    for _ in 0..SHIFT_TICKS {
        let (_, moves) = planner.pop_moves(&engine);
        engine.tick(&moves);
    }
    let elapsed = t0.elapsed();

    let report = engine.score_report();
    println!("— WHCA* shift ({SHIFT_TICKS} ticks, {elapsed:.2?}) —");
    println!("score:     {}", report.score);
    println!("delivered: {} ({} late)", report.delivered, report.late_delivered);
    println!("overdue:   {}", report.currently_overdue);
    println!();

    // 2. CBS one-shot: every agent starts on its parcel, plan runs to
    //    exhaustion under auto-unload.
    #[rustfmt::skip]
    let cbs_parcel: [i32; ROWS * COLS] = [
         1,  0,  0,  0,  0,  0,  0,  0,
         2,  0,  0,  0,  0,  0,  0,  0,
         0,  0,  0,  0,  0,  0,  0,  0,
         0,  3,  0,  0,  0,  0,  0,  0,
         4,  0,  0,  0,  0,  0,  0,  0,
         0,  0,  0,  0,  0,  0,  0,  0,
    ];
    #[rustfmt::skip]
    let cbs_occupant: [i32; ROWS * COLS] = [
         1,  0,  0,  0,  0,  0,  0,  0,
         2,  0,  0,  0,  0,  0,  0,  0,
         0,  0,  0,  0,  0,  0,  0,  0,
         0,  3,  0,  0,  0,  0,  0,  0,
         4,  0,  0,  0,  0,  0,  0,  0,
         0,  0,  0,  0,  0,  0,  0,  0,
    ];
    let grid = Grid::from_layers(ROWS, COLS, &LAYOUT, &cbs_parcel, &cbs_occupant)?;
    let config = EngineConfig {
        seed:   seeds.child(2).random(),
        unload: UnloadPolicy::Auto,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(grid, config)?;
    let mut planner = CbsPlanner::new(&engine);

    let t0 = Instant::now();
    let mut ticks = 0u64;
    loop {
        let (active, moves) = planner.pop_moves(&engine);
        if !active {
            break;
        }
        engine.tick(&moves);
        ticks += 1;
    }
    let elapsed = t0.elapsed();

    let report = engine.score_report();
    println!("— CBS instance ({ticks} ticks, {elapsed:.2?}) —");
    println!("score:     {}", report.score);
    println!("delivered: {}", report.delivered);

    Ok(())
}
