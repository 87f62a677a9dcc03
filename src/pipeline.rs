use crate::{
    codec::SeriesCodec,
    config::MaskingConfig,
    error::{Dim3, Result},
    mask::MaskLoader,
    series_locator::SeriesLocator,
    series_writer::SeriesWriter,
    transform,
    volume::Volume,
    volume_loader::VolumeLoader,
};

use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome of a successful run.
#[derive(Debug)]
pub struct PipelineReport {
    /// Input slices in spatial order
    pub input_slices: Vec<PathBuf>,
    /// Output slices, `written[i]` holds the plane read from `input_slices[i]`
    pub written: Vec<PathBuf>,
    pub dim: Dim3,
    pub masked_voxels: usize,
    /// The masked volume as written
    pub volume: Volume,
}

/// Runs locate → assemble (alongside mask reading) → mask → split.
///
/// Every stage error aborts the run and is returned unchanged.
pub struct Pipeline<C> {
    codec: C,
    config: MaskingConfig,
}

impl<C: SeriesCodec> Pipeline<C> {
    pub fn new(codec: C, config: MaskingConfig) -> Self {
        Self { codec, config }
    }

    pub fn config(&self) -> &MaskingConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn progress_bar(&self, len: usize, stage: &'static str) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg:>8} [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        ProgressBar::new(len as u64)
            .with_style(style)
            .with_message(stage)
    }

    pub fn run(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        mask: impl AsRef<Path>,
    ) -> Result<PipelineReport> {
        let (input, output, mask) = (input.as_ref(), output.as_ref(), mask.as_ref());
        let codec: &dyn SeriesCodec = &self.codec;

        let slices = SeriesLocator::locate(
            codec,
            input,
            self.config.sort_by,
            self.config.series_uid.as_deref(),
        )?;

        let expected = slices.first().map_or((0, 0, 0), |slice| {
            (
                slices.len(),
                usize::from(slice.header.rows),
                usize::from(slice.header.columns),
            )
        });
        let decode_progress = self.progress_bar(slices.len(), "decode");
        let (volume, mask_volume) = rayon::join(
            || VolumeLoader::assemble(codec, input, &slices, &decode_progress),
            || MaskLoader::load(codec, mask, expected, self.config.sort_by),
        );
        let volume = volume?;
        let mask_volume = mask_volume?;

        let masked_voxels = mask_volume.masked_count();
        let volume = transform::apply(volume, &mask_volume, self.config.outside_value)?;
        info!(
            masked_voxels,
            outside_value = self.config.outside_value,
            "applied mask"
        );

        let identifiers = self.config.identifier_policy();
        let encode_progress = self.progress_bar(slices.len(), "encode");
        let written = SeriesWriter::split(
            codec,
            &volume,
            output,
            &self.config.naming,
            &identifiers,
            &encode_progress,
        )?;

        Ok(PipelineReport {
            input_slices: slices.into_iter().map(|slice| slice.path).collect(),
            written,
            dim: volume.dim(),
            masked_voxels,
            volume,
        })
    }
}
