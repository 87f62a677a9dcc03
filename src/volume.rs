use crate::codec::MetadataRecord;
use crate::error::Dim3;

use image::GrayImage;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;
use rayon::prelude::*;

/// A stack of planes in spatial order together with the metadata of the slice
/// each plane came from.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<i16>,
    metadata: Vec<MetadataRecord>,
}

impl Volume {
    /// Returns `None` unless there is exactly one record per plane.
    pub fn new(data: Array3<i16>, metadata: Vec<MetadataRecord>) -> Option<Self> {
        (data.dim().0 == metadata.len()).then_some(Self { data, metadata })
    }

    pub(crate) fn assembled(data: Array3<i16>, metadata: Vec<MetadataRecord>) -> Self {
        debug_assert_eq!(data.dim().0, metadata.len());
        Self { data, metadata }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> Dim3 {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<i16> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<i16> {
        &mut self.data
    }

    pub fn metadata(&self) -> &[MetadataRecord] {
        &self.metadata
    }

    pub fn plane(&self, index: usize) -> Option<ArrayView2<'_, i16>> {
        (index < self.dim().0).then(|| self.data.slice(s![index, .., ..]))
    }

    /// Plane `index` and the record it is written with.
    pub fn plane_with_metadata(
        &self,
        index: usize,
    ) -> Option<(ArrayView2<'_, i16>, &MetadataRecord)> {
        Some((self.plane(index)?, self.metadata.get(index)?))
    }

    #[inline]
    fn window_to_u8(value: i16, center: f32, width: f32) -> u8 {
        let low = center - width / 2.0;
        (((value as f32 - low) / width) * 255.0).clamp(0.0, 255.0) as u8
    }

    /// Render plane `index` as an 8-bit image through a linear window.
    pub fn plane_preview(&self, index: usize, center: f32, width: f32) -> Option<GrayImage> {
        let plane = self.plane(index)?;
        let (height, columns) = plane.dim();
        let pixel_data: Vec<u8> = plane
            .as_standard_layout()
            .as_slice()?
            .par_iter()
            .map(|&v| Self::window_to_u8(v, center, width.max(1.0)))
            .collect();
        GrayImage::from_raw(columns as u32, height as u32, pixel_data)
    }
}
