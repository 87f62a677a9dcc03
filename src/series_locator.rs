use crate::{
    codec::{SeriesCodec, SliceHeader},
    enums::SortBy,
    error::{MaskingError, Result},
};

use rayon::prelude::*;
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// One input plane: where it lives, where it sits along the slice normal and
/// the header it was ordered by.
#[derive(Debug, Clone)]
pub struct SliceRef {
    pub path: PathBuf,
    pub ordering_key: f64,
    pub header: SliceHeader,
}

pub struct SeriesLocator;

impl SeriesLocator {
    /// Find the slices of one series in `directory` and return them in spatial
    /// order.
    ///
    /// # Errors
    ///
    /// `NotFound` if the directory is absent, `EmptySeries` if it holds no
    /// slice of the selected series, `Decode` if a DICOM file cannot be read and
    /// `UnorderableSeries` if no ordering attribute is present on every slice.
    pub fn locate(
        codec: &dyn SeriesCodec,
        directory: impl AsRef<Path>,
        sort_by: SortBy,
        series_uid: Option<&str>,
    ) -> Result<Vec<SliceRef>> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(MaskingError::NotFound {
                path: directory.to_path_buf(),
            });
        }

        let paths = Self::list_files(directory)?;
        let headers = paths
            .into_par_iter()
            .map(|path| match codec.probe(&path) {
                Ok(header) => Ok(header.map(|header| (path, header))),
                Err(source) => Err(MaskingError::Decode { path, source }),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut series = Self::group_by_series(headers.into_iter().flatten());
        let selected = match series_uid {
            Some(uid) => series.remove(uid),
            None => {
                let first = series.keys().next().cloned();
                first.and_then(|uid| {
                    if series.len() > 1 {
                        let ignored: Vec<_> = series.keys().skip(1).collect();
                        warn!(selected = %uid, ?ignored, "directory holds several series");
                    }
                    series.remove(&uid)
                })
            }
        };

        let slices = match selected {
            Some(slices) if !slices.is_empty() => slices,
            _ => {
                return Err(MaskingError::EmptySeries {
                    path: directory.to_path_buf(),
                });
            }
        };

        let ordered = Self::order_slices(slices, sort_by).ok_or_else(|| {
            MaskingError::UnorderableSeries {
                path: directory.to_path_buf(),
            }
        })?;

        info!(count = ordered.len(), directory = %directory.display(), "located series");
        for (index, slice) in ordered.iter().enumerate() {
            debug!(index, key = slice.ordering_key, path = %slice.path.display(), "slice");
        }

        Ok(ordered)
    }

    fn list_files(directory: &Path) -> Result<Vec<PathBuf>> {
        let io_error = |source| MaskingError::Io {
            path: directory.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(directory).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let path = entry.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn group_by_series(
        headers: impl Iterator<Item = (PathBuf, SliceHeader)>,
    ) -> BTreeMap<String, Vec<(PathBuf, SliceHeader)>> {
        let mut series: BTreeMap<String, Vec<_>> = BTreeMap::new();
        for (path, header) in headers {
            let uid = header.series_instance_uid.clone().unwrap_or_default();
            series.entry(uid).or_default().push((path, header));
        }
        series
    }

    /// Attach an ordering key to every slice and sort ascending. Returns `None`
    /// when no method in the fallback chain covers all slices.
    pub(crate) fn order_slices(
        slices: Vec<(PathBuf, SliceHeader)>,
        sort_by: SortBy,
    ) -> Option<Vec<SliceRef>> {
        let keys = if slices.len() == 1 {
            vec![0.0]
        } else {
            sort_by.fallback_chain().iter().find_map(|method| {
                let keys: Option<Vec<f64>> = slices
                    .iter()
                    .map(|(_, header)| Self::ordering_key(header, *method))
                    .collect();
                if keys.is_some() && *method != sort_by {
                    warn!(
                        requested = ?sort_by,
                        used = ?method,
                        "falling back to another ordering attribute"
                    );
                }
                keys
            })?
        };

        let mut ordered: Vec<_> = slices
            .into_iter()
            .zip(keys)
            .map(|((path, header), ordering_key)| SliceRef {
                path,
                ordering_key,
                header,
            })
            .collect();

        ordered.sort_by(|a, b| {
            a.ordering_key
                .partial_cmp(&b.ordering_key)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.header.instance_number.cmp(&b.header.instance_number))
                .then_with(|| a.path.cmp(&b.path))
        });
        Some(ordered)
    }

    pub(crate) fn ordering_key(header: &SliceHeader, sort_by: SortBy) -> Option<f64> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let position = header.image_position?;
                let normal = slice_normal(&header.image_orientation?);
                Some(
                    normal
                        .iter()
                        .zip(position.iter())
                        .map(|(n, p)| n * p)
                        .sum(),
                )
            }
            SortBy::SliceLocation => header.slice_location,
            SortBy::InstanceNumber => header.instance_number.map(f64::from),
        }
    }
}

/// Cross product of the row and column direction cosines.
fn slice_normal(orientation: &[f64; 6]) -> [f64; 3] {
    let [rx, ry, rz, cx, cy, cz] = *orientation;
    [ry * cz - rz * cy, rz * cx - rx * cz, rx * cy - ry * cx]
}

#[cfg(test)]
mod tests {
    use super::*;

    const AXIAL: [f64; 6] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    fn header(z: f64, instance: i32) -> SliceHeader {
        SliceHeader {
            instance_number: Some(instance),
            image_position: Some([-120.0, -120.0, z]),
            image_orientation: Some(AXIAL),
            slice_location: Some(z),
            rows: 4,
            columns: 4,
            ..Default::default()
        }
    }

    fn names(ordered: &[SliceRef]) -> Vec<&str> {
        ordered
            .iter()
            .map(|slice| slice.path.to_str().unwrap())
            .collect()
    }

    #[test]
    fn orders_by_position_not_by_name() {
        let slices = vec![
            (PathBuf::from("a"), header(5.0, 1)),
            (PathBuf::from("b"), header(-5.0, 3)),
            (PathBuf::from("c"), header(0.0, 2)),
        ];
        let ordered = SeriesLocator::order_slices(slices, SortBy::ImagePositionPatient).unwrap();
        assert_eq!(names(&ordered), ["b", "c", "a"]);
        assert!(ordered.windows(2).all(|w| w[0].ordering_key <= w[1].ordering_key));
    }

    #[test]
    fn position_is_projected_on_the_normal() {
        // Sagittal slices: rows along Y, columns along Z, normal along X.
        let sagittal = [0.0, 1.0, 0.0, 0.0, 0.0, -1.0];
        let mut header = header(0.0, 1);
        header.image_orientation = Some(sagittal);
        header.image_position = Some([12.5, 3.0, 7.0]);
        let key = SeriesLocator::ordering_key(&header, SortBy::ImagePositionPatient).unwrap();
        assert!((key - -12.5).abs() < 1e-9);
    }

    #[test]
    fn falls_back_when_position_is_missing() {
        let mut first = header(0.0, 2);
        first.image_position = None;
        first.slice_location = None;
        let slices = vec![
            (PathBuf::from("x"), first),
            (PathBuf::from("y"), header(10.0, 1)),
        ];
        let ordered = SeriesLocator::order_slices(slices, SortBy::ImagePositionPatient).unwrap();
        assert_eq!(names(&ordered), ["y", "x"]);
    }

    #[test]
    fn no_ordering_attribute_is_an_error() {
        let bare = SliceHeader::default();
        let slices = vec![
            (PathBuf::from("x"), bare.clone()),
            (PathBuf::from("y"), bare),
        ];
        assert!(SeriesLocator::order_slices(slices, SortBy::ImagePositionPatient).is_none());
    }

    #[test]
    fn single_slice_needs_no_key() {
        let slices = vec![(PathBuf::from("only"), SliceHeader::default())];
        let ordered = SeriesLocator::order_slices(slices, SortBy::InstanceNumber).unwrap();
        assert_eq!(ordered.len(), 1);
    }

    #[test]
    fn ties_are_broken_by_instance_number() {
        let slices = vec![
            (PathBuf::from("p"), header(1.0, 9)),
            (PathBuf::from("q"), header(1.0, 4)),
        ];
        let ordered = SeriesLocator::order_slices(slices, SortBy::ImagePositionPatient).unwrap();
        assert_eq!(names(&ordered), ["q", "p"]);
    }
}
