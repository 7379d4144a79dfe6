use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::GrayImage;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use blobcam_core::{
    admin::{format_state, AppMode, ApplicationState},
    frame::{HEIGHT, WIDTH},
    morph::BorderPolicy,
    pipeline::{FramePipeline, LabelSource, PipelineConfig, ThresholdMode},
    regions::ConnectedComponentLabeler,
};

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "blobcam",
    version,
    about = "Frame analysis pipeline of the blob-counting camera",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pipeline invocation over a single image and save the
    /// annotated display frame.
    Analyze {
        /// Input image path
        #[arg(short, long)]
        input: PathBuf,

        /// Annotated output image path
        #[arg(short, long, default_value = "annotated.png")]
        output: PathBuf,

        /// Binarization cut on the wire convention (0 = auto via Otsu)
        #[arg(short, long, default_value_t = 0)]
        threshold: u8,

        /// Feed the erosion output to region labeling instead of the
        /// dilation output
        #[arg(long)]
        label_erosion: bool,

        /// Copy source borders through the morphology passes instead of
        /// leaving them untouched
        #[arg(long)]
        defined_borders: bool,

        /// Print the device state as JSON instead of the text wire format
        #[arg(long)]
        json: bool,
    },

    /// Analyze every image in a directory, writing annotated copies.
    Batch {
        /// Directory of input images
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for annotated outputs
        #[arg(short, long, default_value = "annotated")]
        output: PathBuf,

        /// Binarization cut on the wire convention (0 = auto via Otsu)
        #[arg(short, long, default_value_t = 0)]
        threshold: u8,
    },
}

// ── State reporting ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StateReport {
    threshold: u8,
    resolved_threshold: u8,
    object_count: u32,
    step_counter: u32,
    width: u32,
    height: u32,
    image_timestamp: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            input,
            output,
            threshold,
            label_erosion,
            defined_borders,
            json,
        } => cmd_analyze(
            input,
            output,
            threshold,
            label_erosion,
            defined_borders,
            json,
        ),
        Commands::Batch {
            input,
            output,
            threshold,
        } => cmd_batch(input, output, threshold),
    }
}

// ── analyze ───────────────────────────────────────────────────────────────────

fn cmd_analyze(
    input: PathBuf,
    output: PathBuf,
    threshold: u8,
    label_erosion: bool,
    defined_borders: bool,
    json: bool,
) -> Result<()> {
    let config = PipelineConfig {
        threshold: ThresholdMode::from_wire(threshold),
        label_source: if label_erosion {
            LabelSource::Erosion
        } else {
            LabelSource::Dilation
        },
        border_policy: if defined_borders {
            BorderPolicy::CopySource
        } else {
            BorderPolicy::Preserve
        },
    };
    let mut pipeline = FramePipeline::new(config, ConnectedComponentLabeler::default());

    let frame = load_working_frame(&input)?;
    let state = pipeline
        .process(&frame)
        .with_context(|| format!("analysis failed for {}", input.display()))?;

    save_display(pipeline.display().data.clone(), &output)?;
    info!(
        output = %output.display(),
        objects = state.object_count,
        "annotated frame written"
    );

    let timestamp = unix_timestamp();
    if json {
        let report = StateReport {
            threshold,
            resolved_threshold: state.resolved_threshold,
            object_count: state.object_count,
            step_counter: state.step_counter,
            width: WIDTH,
            height: HEIGHT,
            image_timestamp: timestamp,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let app_state = ApplicationState {
            new_image_ready: true,
            image_timestamp: timestamp,
            mode: AppMode::CaptureOn,
            image_type: 0,
            exposure_time: 0,
            threshold: i32::from(threshold),
            device: state,
        };
        print!("{}", format_state(&app_state));
    }
    Ok(())
}

// ── batch ─────────────────────────────────────────────────────────────────────

fn cmd_batch(input: PathBuf, output: PathBuf, threshold: u8) -> Result<()> {
    let config = PipelineConfig {
        threshold: ThresholdMode::from_wire(threshold),
        ..PipelineConfig::default()
    };

    std::fs::create_dir_all(&output)
        .with_context(|| format!("cannot create output directory {}", output.display()))?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(&input)
        .with_context(|| format!("cannot read input directory {}", input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_image_path(p))
        .collect();
    files.sort();

    if files.is_empty() {
        warn!(dir = %input.display(), "no images found");
        return Ok(());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("valid progress template"),
    );

    // One pipeline per rayon worker; each owns its buffer set.
    let results: Vec<Result<u32>> = files
        .par_iter()
        .map_init(
            || FramePipeline::new(config, ConnectedComponentLabeler::default()),
            |pipeline, path| {
                let frame = load_working_frame(path)?;
                let state = pipeline
                    .process(&frame)
                    .with_context(|| format!("analysis failed for {}", path.display()))?;
                let file_name = path.file_stem().unwrap_or_default();
                let mut out_path = output.join(file_name);
                out_path.set_extension("png");
                save_display(pipeline.display().data.clone(), &out_path)?;
                pb.inc(1);
                Ok(state.object_count)
            },
        )
        .collect();
    pb.finish_with_message("done");

    let mut failures = 0usize;
    let mut total_objects = 0u64;
    for (path, result) in files.iter().zip(&results) {
        match result {
            Ok(count) => total_objects += u64::from(*count),
            Err(e) => {
                failures += 1;
                warn!(file = %path.display(), "failed: {e:#}");
            }
        }
    }
    info!(
        frames = files.len() - failures,
        failures, total_objects, "batch complete"
    );
    anyhow::ensure!(failures == 0, "{failures} frame(s) failed");
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Load an image as grayscale at the working resolution, resizing with
/// bilinear convolution when the source geometry differs.
fn load_working_frame(path: &Path) -> Result<Vec<u8>> {
    let img = image::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .into_luma8();

    if (img.width(), img.height()) == (WIDTH, HEIGHT) {
        return Ok(img.into_raw());
    }

    use fast_image_resize as fr;
    let src = fr::images::ImageRef::new(img.width(), img.height(), img.as_raw(), fr::PixelType::U8)
        .context("failed to create resize source")?;
    let mut dst = fr::images::Image::new(WIDTH, HEIGHT, fr::PixelType::U8);
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    fr::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("failed to resize to the working resolution")?;
    Ok(dst.into_vec())
}

fn save_display(data: Vec<u8>, path: &Path) -> Result<()> {
    let img = GrayImage::from_raw(WIDTH, HEIGHT, data).context("display buffer geometry")?;
    img.save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn is_image_path(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("png" | "jpg" | "jpeg" | "bmp" | "pgm" | "tiff" | "tif")
    )
}

fn unix_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
