//! Error types for vxdigi-core.

use thiserror::Error;

/// Result type alias for vxdigi operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for vxdigi operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Ladder dimensions, pitch and segment counts do not form a valid grid.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// Invalid front-end or digitizer configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed cell-id format or a value that does not fit its field.
    #[error("cell id error: {0}")]
    CellId(String),

    /// Sensor driven out of tick order.
    #[error("tick sequence error: expected {expected}, found {found}")]
    Sequence {
        expected: &'static str,
        found: &'static str,
    },
}
