use thiserror::Error;

/// Planner construction errors.
///
/// Everything else in this crate degrades to "no progress this tick"; an
/// unknown policy name is the one condition that must stop construction.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("unknown assignment policy {0:?} (expected \"greedy\" or \"random\")")]
    UnknownPolicy(String),
}

pub type PlannerResult<T> = Result<T, PlannerError>;
