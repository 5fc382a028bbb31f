//! Error taxonomy of the decomposition engine

use gridplan_core::GridError;
use thiserror::Error;

/// Errors raised by the LP oracle, the branch-and-bound search and the
/// decomposition driver.
///
/// An infeasible relaxation inside the branch-and-bound is an expected
/// outcome and is pruned locally; [`PlanError::OracleInfeasible`] only
/// surfaces when a caller asked for a feasible point and none exists, even
/// after feasibility restoration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// The relaxation has no feasible point
    #[error("LP relaxation is infeasible: {0}")]
    OracleInfeasible(String),

    /// The relaxation is unbounded; column bounds are malformed
    #[error("LP relaxation is unbounded: {0}")]
    OracleUnbounded(String),

    /// Program inputs violate the shape invariants
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The LP kernel stopped without a usable answer
    #[error("Numerical issue: {0}")]
    Numerical(String),

    /// A search stopped at its node or time limit where a proven optimum
    /// was required
    #[error("Search limit reached: {0}")]
    SearchLimit(String),

    /// The planning case failed validation
    #[error("Invalid case: {0}")]
    InvalidCase(String),

    /// Run configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<GridError> for PlanError {
    fn from(err: GridError) -> Self {
        PlanError::InvalidCase(err.to_string())
    }
}

pub type PlanResult<T> = Result<T, PlanError>;
