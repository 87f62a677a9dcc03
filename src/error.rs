use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;

/// Volume dimensions as (slices, rows, columns).
pub type Dim3 = (usize, usize, usize);

#[derive(Debug, Error)]
pub enum MaskingError {
    #[error("{} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("No slices of the selected series found in {}", path.display())]
    EmptySeries { path: PathBuf },

    #[error("No ordering attribute is present on every slice in {}", path.display())]
    UnorderableSeries { path: PathBuf },

    #[error("Slice {} does not match the series: {found} instead of {expected}", path.display())]
    InconsistentGeometry {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Mask shape {found:?} does not match volume shape {expected:?}")]
    GeometryMismatch { expected: Dim3, found: Dim3 },

    #[error("Could not decode {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Could not write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("{} exists and is not a directory", path.display())]
    ExistingPath { path: PathBuf },

    #[error("Could not list {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MaskingError {
    /// Name of the error kind as reported to the operator.
    pub fn kind(&self) -> &'static str {
        match self {
            MaskingError::NotFound { .. } => "NotFoundError",
            MaskingError::EmptySeries { .. } => "EmptySeriesError",
            MaskingError::UnorderableSeries { .. } => "UnorderableSeriesError",
            MaskingError::InconsistentGeometry { .. } => "InconsistentGeometryError",
            MaskingError::GeometryMismatch { .. } => "GeometryMismatchError",
            MaskingError::Decode { .. } => "DecodeError",
            MaskingError::Write { .. } => "WriteError",
            MaskingError::ExistingPath { .. } => "ExistingPathError",
            MaskingError::Io { .. } => "IoError",
        }
    }
}

pub type Result<T, E = MaskingError> = std::result::Result<T, E>;
