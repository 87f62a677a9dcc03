/// Attribute used to put the slices of a series in spatial order.
///
/// File names are never consulted: the key always comes from the slice's own
/// header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// Image Position (Patient) projected on the slice normal
    #[default]
    ImagePositionPatient,
    SliceLocation,
    InstanceNumber,
}

impl SortBy {
    /// The chain of methods tried, starting with `self`, when some slices lack
    /// the requested attribute.
    pub fn fallback_chain(self) -> &'static [SortBy] {
        match self {
            SortBy::ImagePositionPatient => &[
                SortBy::ImagePositionPatient,
                SortBy::SliceLocation,
                SortBy::InstanceNumber,
            ],
            SortBy::SliceLocation => &[SortBy::SliceLocation, SortBy::InstanceNumber],
            SortBy::InstanceNumber => &[SortBy::InstanceNumber],
        }
    }
}

/// What the codec does with the persistent identifiers of a slice when it is
/// written back.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum IdentifierPolicy {
    /// Keep SOP Instance UID and Series Instance UID from the input slice
    #[default]
    Retain,
    /// Mint a new SOP Instance UID per slice and stamp the given series UID
    Regenerate { series_instance_uid: String },
}
