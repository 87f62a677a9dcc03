//! Settings shared by every stage of a masking run.

use crate::{
    codec::generate_uid,
    enums::{IdentifierPolicy, SortBy},
    series_writer::OutputNaming,
    transform::DEFAULT_OUTSIDE_VALUE,
};

#[derive(Debug, Clone)]
pub struct MaskingConfig {
    /// Value written to every masked voxel, in modality units.
    pub outside_value: i16,
    pub sort_by: SortBy,
    /// Series to process when the input directory holds several.
    pub series_uid: Option<String>,
    pub keep_original_uids: bool,
    pub naming: OutputNaming,
    pub show_progress: bool,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            outside_value: DEFAULT_OUTSIDE_VALUE,
            sort_by: SortBy::default(),
            series_uid: None,
            keep_original_uids: true,
            naming: OutputNaming::default(),
            show_progress: true,
        }
    }
}

impl MaskingConfig {
    /// Identifier handling for one run. A fresh series UID is minted per call
    /// when original UIDs are not kept.
    pub fn identifier_policy(&self) -> IdentifierPolicy {
        if self.keep_original_uids {
            IdentifierPolicy::Retain
        } else {
            IdentifierPolicy::Regenerate {
                series_instance_uid: generate_uid(),
            }
        }
    }
}
