//! The three-layer warehouse map.
//!
//! # External encoding
//!
//! Map-parsing collaborators hand over plain integer layers in the original
//! encoding: layout `-1` wall, `-2` spawn, `0` floor, `k > 0` shelf `k`;
//! parcel `0` none, else destination-type `k`; occupant `0` none, else
//! 1-based agent id.  [`Grid::from_layers`] validates that encoding once at
//! the boundary and converts to typed cells; everything downstream works
//! with `CellKind`, `Option<DestId>`, and `Option<AgentId>`.
//!
//! # Mutation discipline
//!
//! The grid is an owned value mutated only through its setter methods.  The
//! engine owns the `Grid`; planners only ever see `&Grid`.

use agv_core::{AgentId, DestId, Pos};

use crate::GridError;

// ── CellKind ──────────────────────────────────────────────────────────────────

/// Static layout of one cell.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellKind {
    /// Impassable for every AGV, loaded or not.
    Wall,
    /// Parcel spawn point.  Open to empty-handed AGVs; loaded AGVs avoid it
    /// during planning.
    Spawn,
    /// Ordinary floor.
    #[default]
    Floor,
    /// Destination shelf for parcels of the given type.
    Shelf(DestId),
}

impl CellKind {
    /// `true` for any cell a planner may route an empty-handed AGV through.
    #[inline]
    pub fn is_traversable(self) -> bool {
        !matches!(self, CellKind::Wall)
    }
}

// ── Grid ──────────────────────────────────────────────────────────────────────

/// The warehouse map: three parallel layers over `rows × cols` cells.
///
/// Invariants (upheld by [`Grid::from_layers`] and the engine's tick body):
///
/// - the occupant layer is exactly the inverse of the engine's agent
///   position list — no two agents share a cell;
/// - at most one cell holds a parcel of any given `DestId` (a carried parcel
///   rides on its carrier's cell).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Grid {
    rows: usize,
    cols: usize,
    layout:   Vec<CellKind>,
    parcel:   Vec<Option<DestId>>,
    occupant: Vec<Option<AgentId>>,
    /// Number of destination types = highest shelf id in the layout.
    dest_count: usize,
}

impl Grid {
    /// Validate and convert raw integer layers (see module docs for the
    /// encoding).  Each slice must hold exactly `rows * cols` values in
    /// row-major order.
    pub fn from_layers(
        rows: usize,
        cols: usize,
        layout:   &[i32],
        parcel:   &[i32],
        occupant: &[i32],
    ) -> Result<Self, GridError> {
        let n = rows * cols;
        for (name, layer) in [("layout", layout), ("parcel", parcel), ("occupant", occupant)] {
            if layer.len() != n {
                return Err(GridError::LayerSize { layer: name, expected: n, got: layer.len() });
            }
        }

        let dest_count = layout.iter().copied().max().unwrap_or(0).max(0) as usize;

        let mut cells = Vec::with_capacity(n);
        let mut shelf_seen = vec![false; dest_count];
        for (i, &v) in layout.iter().enumerate() {
            let cell = match v {
                -1 => CellKind::Wall,
                -2 => CellKind::Spawn,
                0 => CellKind::Floor,
                k if k > 0 && k - 1 <= u16::MAX as i32 => {
                    let dest = DestId((k - 1) as u16);
                    if shelf_seen[dest.index()] {
                        return Err(GridError::DuplicateShelf(dest));
                    }
                    shelf_seen[dest.index()] = true;
                    CellKind::Shelf(dest)
                }
                _ => {
                    return Err(GridError::InvalidLayout { row: i / cols, col: i % cols, value: v });
                }
            };
            cells.push(cell);
        }

        let mut parcels = Vec::with_capacity(n);
        let mut parcel_seen = vec![false; dest_count];
        for (i, &v) in parcel.iter().enumerate() {
            let slot = match v {
                0 => None,
                k if k > 0 && k - 1 <= u16::MAX as i32 && (k as usize) <= dest_count => {
                    let dest = DestId((k - 1) as u16);
                    if parcel_seen[dest.index()] {
                        return Err(GridError::DuplicateParcel(dest));
                    }
                    parcel_seen[dest.index()] = true;
                    Some(dest)
                }
                _ => {
                    return Err(GridError::InvalidParcel {
                        row:     i / cols,
                        col:     i % cols,
                        value:   v,
                        shelves: dest_count,
                    });
                }
            };
            parcels.push(slot);
        }

        let mut occupants = vec![None; n];
        let mut ids: Vec<u32> = Vec::new();
        for (i, &v) in occupant.iter().enumerate() {
            if v > 0 {
                let id = AgentId(v as u32 - 1);
                if ids.contains(&id.0) {
                    return Err(GridError::DuplicateOccupant(id));
                }
                ids.push(id.0);
                occupants[i] = Some(id);
            }
        }
        if let Some(&max) = ids.iter().max() {
            if max as usize + 1 != ids.len() {
                return Err(GridError::OccupantGap { count: ids.len(), max: max + 1 });
            }
        }

        Ok(Self { rows, cols, layout: cells, parcel: parcels, occupant: occupants, dest_count })
    }

    // ── Dimensions ────────────────────────────────────────────────────────

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of destination types (= shelf count).
    #[inline]
    pub fn dest_count(&self) -> usize {
        self.dest_count
    }

    /// Number of AGVs placed on the occupant layer.
    pub fn agent_count(&self) -> usize {
        self.occupant.iter().filter(|o| o.is_some()).count()
    }

    #[inline]
    fn idx(&self, p: Pos) -> usize {
        p.row * self.cols + p.col
    }

    // ── Cell accessors ────────────────────────────────────────────────────

    #[inline]
    pub fn layout(&self, p: Pos) -> CellKind {
        self.layout[self.idx(p)]
    }

    #[inline]
    pub fn parcel(&self, p: Pos) -> Option<DestId> {
        self.parcel[self.idx(p)]
    }

    #[inline]
    pub fn occupant(&self, p: Pos) -> Option<AgentId> {
        self.occupant[self.idx(p)]
    }

    #[inline]
    pub fn set_parcel(&mut self, p: Pos, v: Option<DestId>) {
        let i = self.idx(p);
        self.parcel[i] = v;
    }

    #[inline]
    pub fn set_occupant(&mut self, p: Pos, v: Option<AgentId>) {
        let i = self.idx(p);
        self.occupant[i] = v;
    }

    // ── Whole-map queries ─────────────────────────────────────────────────

    /// Iterate all cell positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.rows).flat_map(move |r| (0..self.cols).map(move |c| Pos::new(r, c)))
    }

    /// Position of each destination shelf, indexed by `DestId`.
    pub fn shelf_positions(&self) -> Vec<Option<Pos>> {
        let mut out = vec![None; self.dest_count];
        for p in self.positions() {
            if let CellKind::Shelf(dest) = self.layout(p) {
                out[dest.index()] = Some(p);
            }
        }
        out
    }

    /// Position of each live parcel (grounded or carried), indexed by `DestId`.
    pub fn parcel_positions(&self) -> Vec<Option<Pos>> {
        let mut out = vec![None; self.dest_count];
        for p in self.positions() {
            if let Some(dest) = self.parcel(p) {
                out[dest.index()] = Some(p);
            }
        }
        out
    }

    /// Position of each AGV according to the occupant layer, indexed by
    /// `AgentId`.
    pub fn occupant_positions(&self) -> Vec<Pos> {
        let mut out = vec![Pos::new(0, 0); self.agent_count()];
        for p in self.positions() {
            if let Some(agent) = self.occupant(p) {
                out[agent.index()] = p;
            }
        }
        out
    }

    /// All spawn-point cells.
    pub fn spawn_positions(&self) -> Vec<Pos> {
        self.positions()
            .filter(|&p| self.layout(p) == CellKind::Spawn)
            .collect()
    }

    /// `true` while a parcel of type `dest` exists anywhere on the parcel
    /// layer (including on a carrier).
    pub fn outstanding(&self, dest: DestId) -> bool {
        self.parcel.iter().any(|&v| v == Some(dest))
    }

    /// Number of live parcels on the parcel layer.
    pub fn live_parcel_count(&self) -> usize {
        self.parcel.iter().filter(|v| v.is_some()).count()
    }
}
