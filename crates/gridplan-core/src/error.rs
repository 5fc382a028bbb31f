//! Error types for planning case construction and validation
//!
//! [`GridError`] covers everything that can go wrong before an optimization
//! model is built: unreadable case files, dangling references between
//! elements, and profiles whose lengths disagree with the planning horizon.

use thiserror::Error;

/// Errors raised while loading or validating a planning case.
#[derive(Error, Debug)]
pub enum GridError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// An element refers to a bus that does not exist
    #[error("{element} refers to unknown bus {bus}")]
    UnknownBus { element: String, bus: usize },

    /// A per-stage or per-hour vector has the wrong length
    #[error("{what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// A loaded bus cannot be reached from any substation
    #[error("Bus {0} carries load but is not reachable from any substation")]
    Unreachable(usize),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Convenience type alias for Results using GridError.
pub type GridResult<T> = Result<T, GridError>;

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::Parse(err.to_string())
    }
}
