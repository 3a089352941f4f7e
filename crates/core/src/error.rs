//! Error types for Friaje

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Friaje operations
///
/// File-level failures (`DataUnavailable`, `CoordinateMismatch`) abort a run.
/// `MalformedGeometry` is produced per unit and recorded on the unit's
/// statistics instead of being propagated.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data unavailable: {path}: {reason}")]
    DataUnavailable { path: PathBuf, reason: String },

    #[error("CRS mismatch: {0} vs {1}")]
    CoordinateMismatch(String, String),

    #[error("Malformed geometry for unit '{unit_id}': {reason}")]
    MalformedGeometry { unit_id: String, reason: String },

    #[error("Duplicate administrative unit id: {0}")]
    DuplicateUnit(String),

    #[error("Invalid risk rules: {0}")]
    InvalidRules(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a `DataUnavailable` error for `path`
    pub fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::DataUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for Friaje operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message_names_path() {
        let err = Error::unavailable("data/tmin.tif", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Data unavailable: data/tmin.tif: No such file or directory"
        );
    }
}
