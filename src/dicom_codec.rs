use crate::{
    codec::{
        CodecError, DecodedPlane, MetadataRecord, PixelFormat, SeriesCodec, SliceHeader,
        generate_uid, string_attribute,
    },
    enums::IdentifierPolicy,
    series_locator::SliceRef,
};

use dicom::{
    core::{DataElement, PrimitiveValue, Tag, VR},
    dictionary_std::StandardDataDictionary,
    object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject, OpenFileOptions, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder},
    transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN,
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, Array4, ArrayView2, s};
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};
use tracing::debug;

/// [`SeriesCodec`] backed by dicom-rs.
///
/// Slices are read in any transfer syntax dicom-rs can decode and always
/// written as Explicit VR Little Endian with native pixel data.
#[derive(Debug, Default, Clone, Copy)]
pub struct DicomCodec;

/// Linear map from stored sample values to modality units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Rescale {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for Rescale {
    fn default() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
        }
    }
}

impl Rescale {
    fn from_dataset(dataset: &InMemDicomObject) -> Self {
        let read = |tag| dataset.element(tag).ok()?.to_float64().ok();
        Self {
            slope: read(tags::RESCALE_SLOPE)
                .filter(|slope| *slope != 0.0)
                .unwrap_or(1.0),
            intercept: read(tags::RESCALE_INTERCEPT).unwrap_or(0.0),
        }
    }

    pub(crate) fn to_modality(self, stored: i32) -> i16 {
        (stored as f64)
            .mul_add(self.slope, self.intercept)
            .round()
            .clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }

    pub(crate) fn to_stored(self, value: i16) -> f64 {
        ((value as f64 - self.intercept) / self.slope).round()
    }
}

/// How samples are laid out on disk for one slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct StoredLayout {
    pub format: PixelFormat,
    pub bits_stored: u16,
    pub rescale: Rescale,
}

impl StoredLayout {
    fn from_dataset(dataset: &InMemDicomObject) -> Result<Self, CodecError> {
        let read = |tag: Tag| dataset.element(tag).ok()?.to_int::<u16>().ok();

        let samples_per_pixel = read(tags::SAMPLES_PER_PIXEL).unwrap_or(1);
        if samples_per_pixel != 1 {
            return Err(CodecError::Unsupported(format!(
                "{samples_per_pixel} samples per pixel"
            )));
        }
        let bits_allocated =
            read(tags::BITS_ALLOCATED).ok_or(CodecError::MissingAttribute("BitsAllocated"))?;
        if bits_allocated != 8 && bits_allocated != 16 {
            return Err(CodecError::Unsupported(format!(
                "{bits_allocated} bits allocated"
            )));
        }
        let bits_stored = read(tags::BITS_STORED)
            .unwrap_or(bits_allocated)
            .clamp(1, bits_allocated);
        let signed = read(tags::PIXEL_REPRESENTATION).unwrap_or(0) == 1;

        Ok(Self {
            format: PixelFormat {
                bits_allocated,
                signed,
            },
            bits_stored,
            rescale: Rescale::from_dataset(dataset),
        })
    }

    /// Inclusive range of values representable with `bits_stored`.
    pub(crate) fn stored_range(&self) -> (i32, i32) {
        let bits = u32::from(self.bits_stored);
        if self.format.signed {
            (-(1 << (bits - 1)), (1 << (bits - 1)) - 1)
        } else {
            (0, (1 << bits) - 1)
        }
    }

    /// Signed 16-bit samples under the same rescale.
    fn widened(&self) -> Self {
        Self {
            format: PixelFormat {
                bits_allocated: 16,
                signed: true,
            },
            bits_stored: 16,
            rescale: self.rescale,
        }
    }

    fn holds(&self, low: i32, high: i32) -> bool {
        let (min, max) = self.stored_range();
        min <= low && high <= max
    }

    /// Inverse-rescale `plane` into stored values and pick the layout they
    /// are written with: `self` when every value fits, signed 16-bit
    /// otherwise. Values are never saturated.
    pub(crate) fn encode(
        &self,
        plane: ArrayView2<'_, i16>,
    ) -> Result<(StoredLayout, Vec<i32>), CodecError> {
        let values: Vec<i32> = plane
            .iter()
            .map(|&value| self.rescale.to_stored(value) as i32)
            .collect();
        let low = values.iter().copied().min().unwrap_or(0);
        let high = values.iter().copied().max().unwrap_or(0);

        if self.holds(low, high) {
            return Ok((*self, values));
        }
        let widened = self.widened();
        if widened.holds(low, high) {
            Ok((widened, values))
        } else {
            Err(CodecError::OutOfRange { low, high })
        }
    }

    /// Rewrite the image pixel description of `dataset` to this layout.
    fn describe(&self, dataset: &mut InMemDicomObject) {
        let us = |tag: Tag, value: u16| DataElement::new(tag, VR::US, PrimitiveValue::from(value));
        dataset.put(us(tags::BITS_ALLOCATED, self.format.bits_allocated));
        dataset.put(us(tags::BITS_STORED, self.bits_stored));
        dataset.put(us(tags::HIGH_BIT, self.bits_stored - 1));
        dataset.put(us(tags::PIXEL_REPRESENTATION, u16::from(self.format.signed)));
        // VR of these follows the old pixel representation.
        dataset.remove_element(tags::SMALLEST_IMAGE_PIXEL_VALUE);
        dataset.remove_element(tags::LARGEST_IMAGE_PIXEL_VALUE);
    }

    fn pixel_data_element(&self, values: Vec<i32>) -> DataElement<InMemDicomObject> {
        if self.format.bits_allocated == 8 {
            let bytes: Vec<u8> = values.into_iter().map(|v| v as u8).collect();
            DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::U8(bytes.into()))
        } else {
            let words: Vec<u16> = values.into_iter().map(|v| v as u16).collect();
            DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::U16(words.into()))
        }
    }
}

impl DicomCodec {
    /// Write `dataset` as a Part 10 file in Explicit VR Little Endian.
    pub fn write_file(
        dataset: InMemDicomObject,
        sop_class_uid: &str,
        sop_instance_uid: &str,
        path: &Path,
    ) -> Result<(), CodecError> {
        let file_meta = FileMetaTableBuilder::new()
            .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
            .media_storage_sop_class_uid(sop_class_uid)
            .media_storage_sop_instance_uid(sop_instance_uid)
            .build()
            .map_err(|e| CodecError::Meta(e.to_string()))?;

        let mut file_obj =
            FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, file_meta);
        for element in dataset {
            file_obj.put(element);
        }
        file_obj.write_to_file(path)?;
        Ok(())
    }

    fn has_dicom_magic(path: &Path) -> Result<bool, CodecError> {
        let mut preamble = Vec::with_capacity(132);
        File::open(path)?.take(132).read_to_end(&mut preamble)?;
        Ok(preamble.len() == 132 && &preamble[128..] == b"DICM")
    }

    fn read_header(dataset: &InMemDicomObject) -> Option<SliceHeader> {
        let int = |tag| dataset.element(tag).ok()?.to_int::<i32>().ok();
        let float = |tag| dataset.element(tag).ok()?.to_float64().ok();
        let floats = |tag| dataset.element(tag).ok()?.to_multi_float64().ok();

        let rows = u16::try_from(int(tags::ROWS)?).ok()?;
        let columns = u16::try_from(int(tags::COLUMNS)?).ok()?;

        Some(SliceHeader {
            series_instance_uid: string_attribute(dataset, tags::SERIES_INSTANCE_UID),
            sop_instance_uid: string_attribute(dataset, tags::SOP_INSTANCE_UID),
            instance_number: int(tags::INSTANCE_NUMBER),
            image_position: floats(tags::IMAGE_POSITION_PATIENT)
                .and_then(|v| v.try_into().ok()),
            image_orientation: floats(tags::IMAGE_ORIENTATION_PATIENT)
                .and_then(|v| v.try_into().ok()),
            slice_location: float(tags::SLICE_LOCATION),
            rows,
            columns,
        })
    }

    /// Stored samples of every frame, shaped (frames, rows, columns).
    fn decode_stored(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<Array3<i32>, CodecError> {
        let pixel_data = dicom_object.decode_pixel_data()?;
        let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
        let samples: Array4<i32> = pixel_data.to_ndarray_with_options(&options)?;
        Ok(samples.slice_move(s![.., .., .., 0]))
    }
}

impl SeriesCodec for DicomCodec {
    fn probe(&self, path: &Path) -> Result<Option<SliceHeader>, CodecError> {
        if !Self::has_dicom_magic(path)? {
            debug!(path = %path.display(), "skipping non-DICOM file");
            return Ok(None);
        }
        let dicom_object = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)?;
        Ok(Self::read_header(&dicom_object))
    }

    fn decode_plane(&self, slice: &SliceRef) -> Result<DecodedPlane, CodecError> {
        let dicom_object = open_file(&slice.path)?;
        let layout = StoredLayout::from_dataset(&dicom_object)?;

        let stored = Self::decode_stored(&dicom_object)?;
        if stored.dim().0 != 1 {
            return Err(CodecError::Unsupported(format!(
                "{} frames in a single slice",
                stored.dim().0
            )));
        }
        let plane: Array2<i16> = stored
            .slice_move(s![0, .., ..])
            .mapv(|v| layout.rescale.to_modality(v));

        let metadata = MetadataRecord::from_dataset(dicom_object.into_inner())?;
        Ok(DecodedPlane {
            pixels: plane,
            format: layout.format,
            metadata,
        })
    }

    fn decode_volume(&self, path: &Path) -> Result<Array3<i32>, CodecError> {
        let dicom_object = open_file(path)?;
        StoredLayout::from_dataset(&dicom_object)?;
        Self::decode_stored(&dicom_object)
    }

    fn encode_plane(
        &self,
        plane: ArrayView2<'_, i16>,
        metadata: &MetadataRecord,
        target: &Path,
        identifiers: &IdentifierPolicy,
    ) -> Result<PathBuf, CodecError> {
        let mut dataset = metadata.dataset.clone();
        let layout = StoredLayout::from_dataset(&dataset)?;

        let sop_instance_uid = match identifiers {
            IdentifierPolicy::Retain => metadata.sop_instance_uid.clone(),
            IdentifierPolicy::Regenerate {
                series_instance_uid,
            } => {
                let uid = generate_uid();
                dataset.put(DataElement::new(
                    tags::SOP_INSTANCE_UID,
                    VR::UI,
                    PrimitiveValue::from(uid.as_str()),
                ));
                dataset.put(DataElement::new(
                    tags::SERIES_INSTANCE_UID,
                    VR::UI,
                    PrimitiveValue::from(series_instance_uid.as_str()),
                ));
                uid
            }
        };

        let (written, values) = layout.encode(plane)?;
        if written != layout {
            debug!(path = %target.display(), "widening pixel representation to signed 16-bit");
            written.describe(&mut dataset);
        }
        dataset.put(written.pixel_data_element(values));

        Self::write_file(dataset, &metadata.sop_class_uid, &sop_instance_uid, target)?;
        Ok(target.to_path_buf())
    }
}
