use crate::{
    codec::{DecodedPlane, SeriesCodec},
    error::{MaskingError, Result},
    series_locator::SliceRef,
    volume::Volume,
};

use indicatif::{ParallelProgressIterator, ProgressBar};
use ndarray::{Array3, s};
use rayon::prelude::*;
use std::path::Path;
use tracing::info;

pub struct VolumeLoader;

impl VolumeLoader {
    /// Decode every slice and stack the planes along Z in the given order.
    ///
    /// # Errors
    ///
    /// `EmptySeries` naming `directory` when `slices` is empty, `Decode` on
    /// the first slice the codec cannot read and `InconsistentGeometry` if
    /// planes differ in size or sample format. No partial volume is ever
    /// returned.
    pub fn assemble(
        codec: &dyn SeriesCodec,
        directory: &Path,
        slices: &[SliceRef],
        progress: &ProgressBar,
    ) -> Result<Volume> {
        let first = slices.first().ok_or_else(|| MaskingError::EmptySeries {
            path: directory.to_path_buf(),
        })?;

        let planes = slices
            .par_iter()
            .progress_with(progress.clone())
            .map(|slice| {
                codec
                    .decode_plane(slice)
                    .map_err(|source| MaskingError::Decode {
                        path: slice.path.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        progress.finish_and_clear();

        Self::validate_geometry(slices, &planes)?;

        let (height, width) = planes[0].pixels.dim();
        info!(
            depth = planes.len(),
            height,
            width,
            first = %first.path.display(),
            "assembled volume"
        );
        Ok(Self::build_volume(planes))
    }

    fn validate_geometry(slices: &[SliceRef], planes: &[DecodedPlane]) -> Result<()> {
        let expected_dim = planes[0].pixels.dim();
        let expected_format = planes[0].format;
        for (slice, plane) in slices.iter().zip(planes) {
            if plane.pixels.dim() != expected_dim {
                return Err(MaskingError::InconsistentGeometry {
                    path: slice.path.clone(),
                    expected: format!("{}x{} plane", expected_dim.0, expected_dim.1),
                    found: format!("{}x{} plane", plane.pixels.dim().0, plane.pixels.dim().1),
                });
            }
            if plane.format != expected_format {
                return Err(MaskingError::InconsistentGeometry {
                    path: slice.path.clone(),
                    expected: format!("{:?}", expected_format),
                    found: format!("{:?}", plane.format),
                });
            }
        }
        Ok(())
    }

    fn build_volume(planes: Vec<DecodedPlane>) -> Volume {
        let (height, width) = planes[0].pixels.dim();
        let depth = planes.len();
        let mut data = Array3::<i16>::zeros((depth, height, width));
        let mut metadata = Vec::with_capacity(depth);

        for (i, plane) in planes.into_iter().enumerate() {
            data.slice_mut(s![i, .., ..]).assign(&plane.pixels);
            metadata.push(plane.metadata);
        }

        Volume::assembled(data, metadata)
    }
}
