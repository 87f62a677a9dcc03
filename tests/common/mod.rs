#![allow(dead_code)]

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;
use dicom_mask::{
    CodecError, DecodedPlane, IdentifierPolicy, MetadataRecord, PixelFormat, SeriesCodec,
    SliceHeader, SliceRef,
};
use ndarray::{Array2, Array3, ArrayView2, Axis};

pub const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
pub const SERIES_UID: &str = "1.2.826.0.1.3680043.2.1125.1";

pub fn record(sop_instance_uid: &str, series_instance_uid: &str) -> MetadataRecord {
    let dataset = InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(CT_IMAGE_STORAGE)),
        DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(sop_instance_uid),
        ),
        DataElement::new(
            tags::SERIES_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(series_instance_uid),
        ),
    ]);
    MetadataRecord::from_dataset(dataset).expect("fixture record is complete")
}

#[derive(Debug, Clone)]
pub struct MockSlice {
    pub header: SliceHeader,
    pub pixels: Array2<i16>,
    pub format: PixelFormat,
    pub record: MetadataRecord,
}

#[derive(Debug, Clone)]
pub struct WrittenSlice {
    pub path: PathBuf,
    pub pixels: Array2<i16>,
    pub source_uid: String,
    pub identifiers: IdentifierPolicy,
}

impl WrittenSlice {
    /// The persistent identifier the slice would carry on disk.
    pub fn output_uid(&self) -> Option<&str> {
        match self.identifiers {
            IdentifierPolicy::Retain => Some(&self.source_uid),
            IdentifierPolicy::Regenerate { .. } => None,
        }
    }
}

/// In-memory codec keyed by file name. Files must still exist on disk so the
/// locator can list them; their content is ignored.
#[derive(Debug, Default)]
pub struct MemoryCodec {
    slices: HashMap<String, MockSlice>,
    masks: HashMap<String, Array3<i32>>,
    broken: HashMap<String, String>,
    pub fail_write_at: Option<String>,
    written: Mutex<Vec<WrittenSlice>>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}

impl MemoryCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an axial slice at height `z` filled with `value`.
    pub fn add_slice(
        &mut self,
        directory: &Path,
        name: &str,
        z: f64,
        uid: &str,
        pixels: Array2<i16>,
    ) -> PathBuf {
        let path = directory.join(name);
        fs::write(&path, b"slice").unwrap();
        let (rows, columns) = pixels.dim();
        self.slices.insert(
            name.to_string(),
            MockSlice {
                header: SliceHeader {
                    series_instance_uid: Some(SERIES_UID.to_string()),
                    sop_instance_uid: Some(uid.to_string()),
                    instance_number: None,
                    image_position: Some([0.0, 0.0, z]),
                    image_orientation: Some([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
                    slice_location: Some(z),
                    rows: rows as u16,
                    columns: columns as u16,
                },
                pixels,
                format: PixelFormat::default(),
                record: record(uid, SERIES_UID),
            },
        );
        path
    }

    pub fn slice_mut(&mut self, name: &str) -> &mut MockSlice {
        self.slices.get_mut(name).expect("slice was registered")
    }

    pub fn add_mask(&mut self, directory: &Path, name: &str, samples: Array3<i32>) -> PathBuf {
        let path = directory.join(name);
        fs::write(&path, b"mask").unwrap();
        self.masks.insert(name.to_string(), samples);
        path
    }

    /// Make decoding of `name` fail with `message`.
    pub fn break_slice(&mut self, name: &str, message: &str) {
        self.broken.insert(name.to_string(), message.to_string());
    }

    pub fn written(&self) -> Vec<WrittenSlice> {
        let mut written = self.written.lock().unwrap().clone();
        written.sort_by(|a, b| a.path.cmp(&b.path));
        written
    }
}

impl SeriesCodec for MemoryCodec {
    fn probe(&self, path: &Path) -> Result<Option<SliceHeader>, CodecError> {
        Ok(self
            .slices
            .get(&file_name(path))
            .map(|slice| slice.header.clone()))
    }

    fn decode_plane(&self, slice: &SliceRef) -> Result<DecodedPlane, CodecError> {
        let name = file_name(&slice.path);
        if let Some(message) = self.broken.get(&name) {
            return Err(CodecError::Unsupported(message.clone()));
        }
        let mock = self
            .slices
            .get(&name)
            .ok_or(CodecError::MissingAttribute("PixelData"))?;
        Ok(DecodedPlane {
            pixels: mock.pixels.clone(),
            format: mock.format,
            metadata: mock.record.clone(),
        })
    }

    /// Masks by name, or a registered slice as one frame of stored samples.
    fn decode_volume(&self, path: &Path) -> Result<Array3<i32>, CodecError> {
        let name = file_name(path);
        if let Some(samples) = self.masks.get(&name) {
            return Ok(samples.clone());
        }
        let mock = self
            .slices
            .get(&name)
            .ok_or(CodecError::MissingAttribute("PixelData"))?;
        Ok(mock.pixels.mapv(i32::from).insert_axis(Axis(0)))
    }

    fn encode_plane(
        &self,
        plane: ArrayView2<'_, i16>,
        metadata: &MetadataRecord,
        target: &Path,
        identifiers: &IdentifierPolicy,
    ) -> Result<PathBuf, CodecError> {
        if self.fail_write_at.as_deref() == Some(file_name(target).as_str()) {
            return Err(CodecError::Io(std::io::Error::other("disk full")));
        }
        fs::write(target, b"written")?;
        self.written.lock().unwrap().push(WrittenSlice {
            path: target.to_path_buf(),
            pixels: plane.to_owned(),
            source_uid: metadata.sop_instance_uid.clone(),
            identifiers: identifiers.clone(),
        });
        Ok(target.to_path_buf())
    }
}

pub fn count_files(directory: &Path) -> usize {
    fs::read_dir(directory)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}
