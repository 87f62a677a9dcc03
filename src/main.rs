use std::{
    error::Error,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, ValueEnum};
use dicom_mask::{
    DicomCodec, MaskingConfig, MaskingError, OutputNaming, Pipeline, PipelineReport, SortBy,
};
use tracing::{Level, error, info};

#[derive(Parser, Debug)]
#[command(name = "dicom-mask", version, about = "Blank out masked voxels of a DICOM series")]
struct Cli {
    /// Directory holding the input series
    #[arg(value_name = "DICOM_DIRECTORY")]
    input: PathBuf,

    /// Directory the masked series is written to (created if absent)
    #[arg(value_name = "OUTPUT_DICOM_DIRECTORY")]
    output: PathBuf,

    /// Mask file (single or multi-frame DICOM) or directory holding a mask series
    #[arg(value_name = "MASK_FILE")]
    mask: PathBuf,

    /// Value written to masked voxels, in modality units
    #[arg(long, default_value_t = -1000, allow_negative_numbers = true)]
    outside_value: i16,

    /// Attribute used to order the slices
    #[arg(long, value_enum, default_value_t = SortArg::ImagePositionPatient)]
    sort_by: SortArg,

    /// Series Instance UID to process when the directory holds several series
    #[arg(long)]
    series: Option<String>,

    /// Mint new SOP Instance and Series Instance UIDs instead of keeping the originals
    #[arg(long)]
    new_uids: bool,

    /// File name prefix of the output slices
    #[arg(long, default_value = "IM")]
    prefix: String,

    /// Save the middle output slice as a PNG
    #[arg(long, value_name = "PNG")]
    preview: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    ImagePositionPatient,
    SliceLocation,
    InstanceNumber,
}

impl From<SortArg> for SortBy {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::ImagePositionPatient => SortBy::ImagePositionPatient,
            SortArg::SliceLocation => SortBy::SliceLocation,
            SortArg::InstanceNumber => SortBy::InstanceNumber,
        }
    }
}

impl Cli {
    fn config(&self) -> MaskingConfig {
        MaskingConfig {
            outside_value: self.outside_value,
            sort_by: self.sort_by.into(),
            series_uid: self.series.clone(),
            keep_original_uids: !self.new_uids,
            naming: OutputNaming {
                prefix: self.prefix.clone(),
                ..Default::default()
            },
            show_progress: !self.quiet,
        }
    }

    fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::INFO
        }
    }
}

fn save_preview(report: &PipelineReport, path: &Path) {
    let middle = report.dim.0 / 2;
    match report.volume.plane_preview(middle, 40.0, 400.0) {
        Some(image) => match image.save(path) {
            Ok(()) => info!(path = %path.display(), slice = middle, "saved preview"),
            Err(e) => error!(path = %path.display(), "could not save preview: {e}"),
        },
        None => error!(slice = middle, "could not render preview"),
    }
}

fn report_error(err: &MaskingError) {
    eprintln!("error[{}]: {}", err.kind(), err);
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("warning: could not install the log subscriber: {e}");
    }

    let pipeline = Pipeline::new(DicomCodec, cli.config());
    match pipeline.run(&cli.input, &cli.output, &cli.mask) {
        Ok(report) => {
            info!(
                slices = report.written.len(),
                masked_voxels = report.masked_voxels,
                output = %cli.output.display(),
                "done"
            );
            if let Some(path) = &cli.preview {
                save_preview(&report, path);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}
