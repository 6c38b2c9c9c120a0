//! `agv-grid` — warehouse map representation and grid search for `agvsim`.
//!
//! # Data layout
//!
//! The warehouse is three parallel layers over the same `rows × cols` cell
//! array (see [`Grid`]):
//!
//! | Layer    | Cell value                                            |
//! |----------|-------------------------------------------------------|
//! | layout   | wall / spawn point / open floor / shelf (`DestId`)    |
//! | parcel   | `Option<DestId>` — the shelf this parcel must reach   |
//! | occupant | `Option<AgentId>` — the AGV standing on the cell      |
//!
//! Parcel identity *is* its destination-type id: at most one live parcel per
//! `DestId` exists at any time.
//!
//! # Search
//!
//! [`astar`] is the time-expanded search primitive shared by both planners:
//! a pure function of (passability, start, goal, reservations, heuristic).
//! Space-time reservations live in [`ReservationTable`]; the optional
//! all-pairs true-distance heuristic lives in [`DistanceTable`].

pub mod error;
pub mod grid;
pub mod heuristic;
pub mod reservation;
pub mod search;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::GridError;
pub use grid::{CellKind, Grid};
pub use heuristic::DistanceTable;
pub use reservation::ReservationTable;
pub use search::{astar, route_moves, PassGrid, SearchMode, SearchResult};
