//! # DICOM-mask library
//!
//! This crate blanks out the voxels of a DICOM series selected by a binary
//! mask and writes the result back as a new series that keeps the identity of
//! the original one.

//!
//! The pipeline has five stages:
//!  - locate the slices of one series in a directory and order them by their
//!    position along the slice normal (never by file name)
//!  - decode the slices in parallel into one volume, keeping each slice's
//!    metadata next to its plane
//!  - read a mask of the same grid, either a single multi-frame file or a
//!    directory holding a mask series
//!  - replace every masked voxel with a single outside value (-1000 by
//!    default, air in Hounsfield units)
//!  - write each plane back with the metadata of the slice it came from,
//!    keeping SOP Instance UID and Series Instance UID unless asked otherwise
//!
//! The file format is reached only through the [`SeriesCodec`] trait.
//! [`DicomCodec`] implements it with dicom-rs; tests and other backends can
//! provide their own.
//!
//! DICOM files are assumed to have the following attributes:
//!   - Single-frame grayscale slices, 8 or 16 bits allocated
//!   - Images from the same series (Series Instance UID); when a directory
//!     holds several series the first one by UID is used unless one is
//!     requested
//!
//! # Examples
//!
//! ```no_run
//! # use dicom_mask::{DicomCodec, MaskingConfig, Pipeline};
//! let pipeline = Pipeline::new(DicomCodec, MaskingConfig::default());
//! let report = pipeline
//!     .run("dicom", "dicom-masked", "mask.dcm")
//!     .expect("should have written the masked series");
//! println!("wrote {} slices", report.written.len());
//! ```

pub mod codec;
pub mod config;
pub mod dicom_codec;
pub mod enums;
pub mod error;
pub mod mask;
pub mod pipeline;
pub mod series_locator;
pub mod series_writer;
pub mod transform;
pub mod volume;
pub mod volume_loader;

pub use codec::{CodecError, DecodedPlane, MetadataRecord, PixelFormat, SeriesCodec, SliceHeader};
pub use config::MaskingConfig;
pub use dicom_codec::DicomCodec;
pub use enums::{IdentifierPolicy, SortBy};
pub use error::{MaskingError, Result};
pub use mask::{MaskLoader, MaskVolume};
pub use pipeline::{Pipeline, PipelineReport};
pub use series_locator::{SeriesLocator, SliceRef};
pub use series_writer::{OutputNaming, SeriesWriter};
pub use volume::Volume;
pub use volume_loader::VolumeLoader;
