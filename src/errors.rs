//! Centralized error handling for rseries
//!
//! Every fatal condition of a run is a variant of [`SeriesError`]. There is no
//! partial recovery: the first error aborts the run and any outputs that were
//! being written are discarded.

use crate::grid::GridRegion;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classes of failure, used for reporting and exit handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The run was configured inconsistently; nothing was written
    Configuration,
    /// An input grid does not match the run's geometry
    GeometryMismatch,
    /// A grid handle could not be opened or created
    ResourceExhaustion,
    /// Reading or writing grid data failed after the handle was opened
    Storage,
}

/// Main error type for rseries operations
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("input= and file= are mutually exclusive")]
    ConflictingInputSources,

    #[error("please specify input= or file=")]
    MissingInputSource,

    #[error("no input grids given")]
    NoInputs,

    #[error("weights= can only be used with input=, not with file=")]
    WeightsWithManifest,

    #[error("no output grids given")]
    NoOutputs,

    #[error("output <{name}> is given more than once")]
    DuplicateOutput { name: String },

    #[error("{left}= and {right}= must have the same number of values ({left_len} vs {right_len})")]
    CountMismatch {
        left: &'static str,
        right: &'static str,
        left_len: usize,
        right_len: usize,
    },

    #[error("unknown method <{name}>")]
    UnknownMethod { name: String },

    #[error("no grid name found in input file <{source_name}>")]
    EmptyManifest { source_name: String },

    #[error("unable to read input file <{}>: {source}", .path.display())]
    ManifestUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid weight <{token}> for grid <{name}>")]
    InvalidWeight { name: String, token: String },

    #[error("invalid range {lo},{hi}: {reason}")]
    InvalidRange { lo: f64, hi: f64, reason: &'static str },

    #[error("quantile {value} for output <{output}> is outside 0.0-1.0")]
    InvalidQuantile { output: String, value: f64 },

    #[error("grid <{name}> is {found} but the run expects {expected}")]
    GeometryMismatch {
        name: String,
        expected: GridRegion,
        found: GridRegion,
    },

    #[error("row buffer for <{name}> holds {found} cells, expected {expected}")]
    RowWidth {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("row {row} of <{name}> requested out of order (next readable row is {next})")]
    RowOutOfOrder { name: String, row: usize, next: usize },

    #[error("output <{name}> received {written} of {expected} rows")]
    IncompleteOutput {
        name: String,
        written: usize,
        expected: usize,
    },

    #[error("grid <{name}> not found")]
    GridNotFound { name: String },

    #[error("unable to open grid <{name}>: {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("unable to create grid <{name}>: {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl SeriesError {
    /// Classify the error for reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConflictingInputSources
            | Self::MissingInputSource
            | Self::NoInputs
            | Self::WeightsWithManifest
            | Self::NoOutputs
            | Self::DuplicateOutput { .. }
            | Self::CountMismatch { .. }
            | Self::UnknownMethod { .. }
            | Self::EmptyManifest { .. }
            | Self::ManifestUnreadable { .. }
            | Self::InvalidWeight { .. }
            | Self::InvalidRange { .. }
            | Self::InvalidQuantile { .. }
            | Self::ThreadPool(_) => ErrorKind::Configuration,
            Self::GeometryMismatch { .. } | Self::RowWidth { .. } => ErrorKind::GeometryMismatch,
            Self::GridNotFound { .. } | Self::OpenFailed { .. } | Self::CreateFailed { .. } => {
                ErrorKind::ResourceExhaustion
            }
            Self::RowOutOfOrder { .. }
            | Self::IncompleteOutput { .. }
            | Self::NetCdf(_)
            | Self::Io(_) => ErrorKind::Storage,
        }
    }

    /// Whether this error was raised before any grid was touched
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// Result type alias for rseries operations
pub type Result<T> = std::result::Result<T, SeriesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_mismatch_names_both_options() {
        let err = SeriesError::CountMismatch {
            left: "output",
            right: "method",
            left_len: 2,
            right_len: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("output= and method="));
        assert!(msg.contains("(2 vs 1)"));
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_method_names_token() {
        let err = SeriesError::UnknownMethod {
            name: "meen".to_string(),
        };
        assert_eq!(err.to_string(), "unknown method <meen>");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        let geometry = SeriesError::GeometryMismatch {
            name: "b".to_string(),
            expected: GridRegion::new(2, 3),
            found: GridRegion::new(3, 3),
        };
        assert_eq!(geometry.kind(), ErrorKind::GeometryMismatch);
        assert!(geometry.to_string().contains("3x3"));

        let open = SeriesError::OpenFailed {
            name: "a".to_string(),
            reason: "too many open files".to_string(),
        };
        assert_eq!(open.kind(), ErrorKind::ResourceExhaustion);
    }
}
