//! Negated-mask voxel transform: every masked voxel is replaced by a single
//! outside value, every other voxel is left untouched.

use crate::{error::Result, mask::MaskVolume, volume::Volume};

use ndarray::{Array3, Axis};
use rayon::prelude::*;

/// Replacement value for masked voxels unless configured otherwise (air in
/// Hounsfield units).
pub const DEFAULT_OUTSIDE_VALUE: i16 = -1000;

/// Blank out masked voxels of `volume`. Metadata is carried over untouched.
pub fn apply(mut volume: Volume, mask: &MaskVolume, outside_value: i16) -> Result<Volume> {
    apply_in_place(volume.data_mut(), mask, outside_value)?;
    Ok(volume)
}

/// Same as [`apply`] on a bare array, partitioned by slice across the rayon
/// pool.
pub fn apply_in_place(data: &mut Array3<i16>, mask: &MaskVolume, outside_value: i16) -> Result<()> {
    mask.ensure_shape(data.dim())?;

    data.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(mask.data().axis_iter(Axis(0)).into_par_iter())
        .for_each(|(mut plane, mask_plane)| {
            plane.zip_mut_with(&mask_plane, |value, &masked| {
                if masked {
                    *value = outside_value;
                }
            });
        });
    Ok(())
}
