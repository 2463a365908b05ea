use crate::model::GridPos;
use thiserror::Error;

/// Grid-level outcomes that are not a successful placement or move.
///
/// Movement strategies treat [`GridError::Full`] and
/// [`GridError::NoEligibleTarget`] as "stay put"; everything else is a
/// broken invariant and propagates.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("cell {0} is already occupied")]
    Occupied(GridPos),

    #[error("cell {0} holds no agent")]
    Vacant(GridPos),

    #[error("cell {0} lies outside the grid")]
    OutOfBounds(GridPos),

    #[error("every cell is occupied")]
    Full,

    #[error("no free cell within the neighborhood")]
    NoEligibleTarget,

    #[error("cannot spawn an agent in the empty state")]
    EmptySpawn,

    #[error("unknown neighborhood metric {0:?}")]
    InvalidMetric(String),
}
