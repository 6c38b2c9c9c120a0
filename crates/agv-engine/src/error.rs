use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine configuration error: {0}")]
    Config(String),

    #[error("deadline table has {got} slots but the grid has {expected} destination types")]
    DeadlineCount { expected: usize, got: usize },

    #[error("snapshot {what} does not fit this engine: expected {expected}, got {got}")]
    SnapshotMismatch {
        what:     &'static str,
        expected: usize,
        got:      usize,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
