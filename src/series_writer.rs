use crate::{
    codec::{CodecError, SeriesCodec},
    enums::IdentifierPolicy,
    error::{MaskingError, Result},
    volume::Volume,
};

use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Names output slices from their Z index: `{prefix}{index:0width$}.{extension}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    pub prefix: String,
    pub first_index: usize,
    pub width: usize,
    pub extension: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            prefix: "IM".to_string(),
            first_index: 1,
            width: 5,
            extension: "dcm".to_string(),
        }
    }
}

impl OutputNaming {
    pub fn file_name(&self, index: usize) -> String {
        format!(
            "{}{:0width$}.{}",
            self.prefix,
            self.first_index + index,
            self.extension,
            width = self.width
        )
    }

    pub fn path_in(&self, directory: &Path, index: usize) -> PathBuf {
        directory.join(self.file_name(index))
    }
}

/// Create `destination` unless it already is a directory.
///
/// Safe to call concurrently and repeatedly.
pub fn prepare_destination(destination: &Path) -> Result<()> {
    if destination.exists() && !destination.is_dir() {
        return Err(MaskingError::ExistingPath {
            path: destination.to_path_buf(),
        });
    }
    fs::create_dir_all(destination).map_err(|source| {
        if destination.exists() && !destination.is_dir() {
            MaskingError::ExistingPath {
                path: destination.to_path_buf(),
            }
        } else {
            MaskingError::Write {
                path: destination.to_path_buf(),
                source: CodecError::Io(source),
            }
        }
    })
}

pub struct SeriesWriter;

impl SeriesWriter {
    /// Write every plane of `volume` with the record it was read with and
    /// return the written paths in Z order.
    ///
    /// A failure aborts the run but files already written stay on disk.
    pub fn split(
        codec: &dyn SeriesCodec,
        volume: &Volume,
        destination: &Path,
        naming: &OutputNaming,
        identifiers: &IdentifierPolicy,
        progress: &ProgressBar,
    ) -> Result<Vec<PathBuf>> {
        prepare_destination(destination)?;

        let written = (0..volume.dim().0)
            .into_par_iter()
            .progress_with(progress.clone())
            .map(|index| -> Result<PathBuf> {
                let target = naming.path_in(destination, index);
                let (plane, metadata) = volume
                    .plane_with_metadata(index)
                    .ok_or_else(|| MaskingError::InconsistentGeometry {
                        path: target.clone(),
                        expected: format!("{} planes", volume.metadata().len()),
                        found: format!("plane {index}"),
                    })?;
                let path = codec
                    .encode_plane(plane, metadata, &target, identifiers)
                    .map_err(|source| MaskingError::Write {
                        path: target.clone(),
                        source,
                    })?;
                debug!(
                    index,
                    uid = %metadata.sop_instance_uid,
                    path = %path.display(),
                    "wrote slice"
                );
                Ok(path)
            })
            .collect::<Result<Vec<_>>>()?;
        progress.finish_and_clear();

        info!(count = written.len(), destination = %destination.display(), "wrote series");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_zero_padded_from_first_index() {
        let naming = OutputNaming::default();
        assert_eq!(naming.file_name(0), "IM00001.dcm");
        assert_eq!(naming.file_name(41), "IM00042.dcm");

        let custom = OutputNaming {
            prefix: "masked_".to_string(),
            first_index: 0,
            width: 3,
            extension: "dcm".to_string(),
        };
        assert_eq!(custom.file_name(7), "masked_007.dcm");
    }

    #[test]
    fn destination_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out").join("nested");
        prepare_destination(&destination).unwrap();
        prepare_destination(&destination).unwrap();
        assert!(destination.is_dir());
    }

    #[test]
    fn concurrent_creation_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("shared");
        let results: Vec<_> = (0..8)
            .into_par_iter()
            .map(|_| prepare_destination(&destination))
            .collect();
        assert!(results.iter().all(|result| result.is_ok()));
    }

    #[test]
    fn existing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("taken");
        fs::write(&destination, b"").unwrap();
        let error = prepare_destination(&destination).unwrap_err();
        assert_eq!(error.kind(), "ExistingPathError");
    }
}
