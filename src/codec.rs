//! The narrow capability interface the pipeline needs from a slice file
//! format.
//!
//! The pipeline never parses files itself. Everything format specific goes
//! through [`SeriesCodec`], which keeps the masking logic testable with an
//! in-memory codec and lets [`DicomCodec`](crate::dicom_codec::DicomCodec)
//! be swapped for another backend.

use std::path::{Path, PathBuf};

use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, ArrayView2};
use thiserror::Error;
use uuid::Uuid;

use crate::{enums::IdentifierPolicy, series_locator::SliceRef};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM read error: {0}")]
    Read(#[from] dicom::object::ReadError),

    #[error("DICOM write error: {0}")]
    Write(#[from] dicom::object::WriteError),

    #[error("Pixel data error: {0}")]
    Pixel(#[from] dicom::pixeldata::Error),

    #[error("File meta group error: {0}")]
    Meta(String),

    #[error("Missing attribute {0}")]
    MissingAttribute(&'static str),

    #[error("Unsupported image layout: {0}")]
    Unsupported(String),

    #[error("Stored values {low}..={high} do not fit signed 16-bit samples")]
    OutOfRange { low: i32, high: i32 },
}

/// Header fields of one slice, read without touching its pixel data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceHeader {
    pub series_instance_uid: Option<String>,
    pub sop_instance_uid: Option<String>,
    pub instance_number: Option<i32>,
    pub image_position: Option<[f64; 3]>,
    pub image_orientation: Option<[f64; 6]>,
    pub slice_location: Option<f64>,
    pub rows: u16,
    pub columns: u16,
}

/// Sample layout of a decoded plane as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_allocated: u16,
    pub signed: bool,
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self {
            bits_allocated: 16,
            signed: true,
        }
    }
}

/// Everything a slice carries besides its samples.
///
/// The dataset keeps every element of the input slice in tag order, minus
/// Pixel Data. It travels unchanged from decoding to encoding.
#[derive(Debug, Clone)]
pub struct MetadataRecord {
    pub sop_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_class_uid: String,
    pub dataset: InMemDicomObject,
}

impl MetadataRecord {
    /// Build a record from a dataset, dropping its pixel data.
    pub fn from_dataset(mut dataset: InMemDicomObject) -> Result<Self, CodecError> {
        dataset.remove_element(tags::PIXEL_DATA);
        let sop_instance_uid = string_attribute(&dataset, tags::SOP_INSTANCE_UID)
            .ok_or(CodecError::MissingAttribute("SOPInstanceUID"))?;
        let series_instance_uid =
            string_attribute(&dataset, tags::SERIES_INSTANCE_UID).unwrap_or_default();
        let sop_class_uid = string_attribute(&dataset, tags::SOP_CLASS_UID)
            .ok_or(CodecError::MissingAttribute("SOPClassUID"))?;

        Ok(Self {
            sop_instance_uid,
            series_instance_uid,
            sop_class_uid,
            dataset,
        })
    }
}

/// One decoded plane: samples in modality units, row-major (rows, columns).
#[derive(Debug, Clone)]
pub struct DecodedPlane {
    pub pixels: Array2<i16>,
    pub format: PixelFormat,
    pub metadata: MetadataRecord,
}

pub trait SeriesCodec: Sync {
    /// Read the header of `path`. `Ok(None)` means the file is not an image
    /// slice and is ignored; an error means it looks like one but is broken.
    fn probe(&self, path: &Path) -> Result<Option<SliceHeader>, CodecError>;

    fn decode_plane(&self, slice: &SliceRef) -> Result<DecodedPlane, CodecError>;

    /// Raw stored samples of a single file, shaped (frames, rows, columns).
    fn decode_volume(&self, path: &Path) -> Result<Array3<i32>, CodecError>;

    /// Write one plane with `metadata` to `target` and return the written path.
    fn encode_plane(
        &self,
        plane: ArrayView2<'_, i16>,
        metadata: &MetadataRecord,
        target: &Path,
        identifiers: &IdentifierPolicy,
    ) -> Result<PathBuf, CodecError>;
}

/// Mint a UID under the `2.25` root from a random UUID.
pub fn generate_uid() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}

pub(crate) fn string_attribute(
    dataset: &InMemDicomObject,
    tag: dicom::core::Tag,
) -> Option<String> {
    dataset
        .element(tag)
        .ok()?
        .to_str()
        .ok()
        .map(|value| value.trim_end_matches(['\0', ' ']).to_string())
        .filter(|value| !value.is_empty())
}
