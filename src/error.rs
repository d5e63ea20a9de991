use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for the scan and relocation pipeline.
pub type Result<T> = std::result::Result<T, BidsifyError>;

/// Unrecovered pipeline failures.
///
/// Recoverable scanner conditions (missing folders, ambiguous sidecars) never
/// show up here; they are recorded as a [`crate::ScanOutcome`] instead.
#[derive(Debug, Error)]
pub enum BidsifyError {
    #[error("{operation} failed for {path:?}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("invalid sidecar JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("study root {path:?} is not a directory")]
    StudyRootMissing { path: PathBuf },

    #[error("sidecar {path:?} is not a JSON object")]
    SidecarNotObject { path: PathBuf },

    #[error("sidecar {path:?} has no {key:?} field")]
    MissingKey { path: PathBuf, key: &'static str },

    #[error("no scan date (_201YMMDD) in sidecar filename {file:?}")]
    DateNotFound { file: String },

    #[error("no {pattern} identifier in destination path {destination:?}")]
    IdentifierNotFound {
        pattern: &'static str,
        destination: String,
    },

    #[error("destination path {destination:?} does not end in .nii.gz or .nii")]
    NotNiftiDestination { destination: String },

    #[error("expected exactly one {pattern} file in {dir:?}, found {count}")]
    SourceFileNotUnique {
        dir: PathBuf,
        pattern: &'static str,
        count: usize,
    },

    #[error("invalid glob pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("table {path:?}: {source}")]
    Table { path: PathBuf, source: csv::Error },
}

impl BidsifyError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn table(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Table {
            path: path.into(),
            source,
        }
    }
}
