use crate::{
    codec::SeriesCodec,
    enums::SortBy,
    error::{Dim3, MaskingError, Result},
    series_locator::SeriesLocator,
};

use ndarray::{Array2, Array3, Axis, s};
use rayon::prelude::*;
use std::path::Path;
use tracing::info;

/// Boolean voxel grid; `true` marks a voxel to blank out.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskVolume {
    data: Array3<bool>,
}

impl MaskVolume {
    pub fn new(data: Array3<bool>) -> Self {
        Self { data }
    }

    /// Any nonzero sample is masked.
    pub fn from_samples<T: PartialEq + Default>(samples: &Array3<T>) -> Self {
        let zero = T::default();
        Self::new(samples.map(|v| *v != zero))
    }

    pub fn dim(&self) -> Dim3 {
        self.data.dim()
    }

    pub fn data(&self) -> &Array3<bool> {
        &self.data
    }

    pub fn masked_count(&self) -> usize {
        self.data.iter().filter(|&&masked| masked).count()
    }

    /// Fail unless the mask covers exactly `expected`. Never resamples.
    pub fn ensure_shape(&self, expected: Dim3) -> Result<()> {
        if self.dim() != expected {
            return Err(MaskingError::GeometryMismatch {
                expected,
                found: self.dim(),
            });
        }
        Ok(())
    }
}

pub struct MaskLoader;

impl MaskLoader {
    /// Read a mask from a single (possibly multi-frame) file or from a
    /// directory holding a mask series. Only stored samples are looked at,
    /// rescale attributes of the mask are ignored.
    pub fn read(
        codec: &dyn SeriesCodec,
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<MaskVolume> {
        let path = path.as_ref();
        let samples = if path.is_dir() {
            Self::read_series(codec, path, sort_by)?
        } else if path.is_file() {
            codec
                .decode_volume(path)
                .map_err(|source| MaskingError::Decode {
                    path: path.to_path_buf(),
                    source,
                })?
        } else {
            return Err(MaskingError::NotFound {
                path: path.to_path_buf(),
            });
        };
        let mask = MaskVolume::from_samples(&samples);

        info!(
            shape = ?mask.dim(),
            masked = mask.masked_count(),
            path = %path.display(),
            "loaded mask"
        );
        Ok(mask)
    }

    /// Stack the stored samples of a located mask series, one frame per file.
    fn read_series(
        codec: &dyn SeriesCodec,
        directory: &Path,
        sort_by: SortBy,
    ) -> Result<Array3<i32>> {
        let slices = SeriesLocator::locate(codec, directory, sort_by, None)?;
        let planes = slices
            .par_iter()
            .map(|slice| {
                let samples = codec.decode_volume(&slice.path).map_err(|source| {
                    MaskingError::Decode {
                        path: slice.path.clone(),
                        source,
                    }
                })?;
                if samples.dim().0 != 1 {
                    return Err(MaskingError::InconsistentGeometry {
                        path: slice.path.clone(),
                        expected: "1 frame".to_string(),
                        found: format!("{} frames", samples.dim().0),
                    });
                }
                Ok(samples.index_axis_move(Axis(0), 0))
            })
            .collect::<Result<Vec<Array2<i32>>>>()?;

        let (height, width) = planes.first().map_or((0, 0), |plane| plane.dim());
        let mut data = Array3::<i32>::zeros((planes.len(), height, width));
        for (i, (slice, plane)) in slices.iter().zip(&planes).enumerate() {
            if plane.dim() != (height, width) {
                return Err(MaskingError::InconsistentGeometry {
                    path: slice.path.clone(),
                    expected: format!("{height}x{width} plane"),
                    found: format!("{}x{} plane", plane.dim().0, plane.dim().1),
                });
            }
            data.slice_mut(s![i, .., ..]).assign(plane);
        }
        Ok(data)
    }

    /// Read a mask and check it against the volume it will be applied to.
    pub fn load(
        codec: &dyn SeriesCodec,
        path: impl AsRef<Path>,
        target_shape: Dim3,
        sort_by: SortBy,
    ) -> Result<MaskVolume> {
        let mask = Self::read(codec, path, sort_by)?;
        mask.ensure_shape(target_shape)?;
        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_samples_are_masked() {
        let mut samples = Array3::<i32>::zeros((2, 2, 2));
        samples[[0, 0, 1]] = 255;
        samples[[1, 1, 1]] = -1;
        let mask = MaskVolume::from_samples(&samples);
        assert_eq!(mask.masked_count(), 2);
        assert!(mask.data()[[0, 0, 1]]);
        assert!(!mask.data()[[0, 0, 0]]);
    }

    #[test]
    fn shape_must_match_exactly() {
        let mask = MaskVolume::new(Array3::from_elem((5, 10, 10), false));
        assert!(mask.ensure_shape((5, 10, 10)).is_ok());
        assert!(matches!(
            mask.ensure_shape((6, 10, 10)),
            Err(MaskingError::GeometryMismatch {
                expected: (6, 10, 10),
                found: (5, 10, 10)
            })
        ));
    }
}
