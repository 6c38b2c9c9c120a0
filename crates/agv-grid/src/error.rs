use agv_core::{AgentId, DestId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("{layer} layer has {got} cells, expected {expected}")]
    LayerSize {
        layer:    &'static str,
        expected: usize,
        got:      usize,
    },

    #[error("invalid layout value {value} at ({row}, {col})")]
    InvalidLayout { row: usize, col: usize, value: i32 },

    #[error("parcel value {value} at ({row}, {col}) exceeds shelf count {shelves}")]
    InvalidParcel {
        row:     usize,
        col:     usize,
        value:   i32,
        shelves: usize,
    },

    #[error("two live parcels share destination type {0}")]
    DuplicateParcel(DestId),

    #[error("shelf id {0} appears on more than one cell")]
    DuplicateShelf(DestId),

    #[error("agent {0} appears on more than one cell")]
    DuplicateOccupant(AgentId),

    #[error("occupant ids are not contiguous: {count} agents but highest id is {max}")]
    OccupantGap { count: usize, max: u32 },
}
