//! pipeline — per-frame orchestration and the device state record
//!
//! One caller invokes [`FramePipeline::process`] once per acquired frame,
//! run-to-completion, no overlap. The pipeline owns its buffer set and the
//! labeling collaborator; the only fallible edge is the collaborator call,
//! whose error is surfaced to the caller untouched.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::frame::{FrameBuffers, GrayFrame};
use crate::morph::{copy_border, dilate3x3, erode3x3, BorderPolicy};
use crate::regions::{binarize, draw_bbox, RegionLabeler, BINARY_SPLIT, MARKER};
use crate::segment::{accumulate_histogram, otsu_threshold, threshold};

/// How the binarization cut is chosen each frame.
///
/// The external wire collapses "compute automatically" and "threshold 0"
/// into the single value 0; that overload stops at [`ThresholdMode::from_wire`]
/// and the rest of the core only sees the tagged form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdMode {
    /// Recompute via histogram + between-class variance every frame.
    #[default]
    Auto,
    /// Fixed externally supplied cut value.
    Manual(u8),
}

impl ThresholdMode {
    /// Map the external wire convention (0 = compute automatically).
    pub fn from_wire(raw: u8) -> Self {
        if raw == 0 {
            Self::Auto
        } else {
            Self::Manual(raw)
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::Manual(v) => v,
        }
    }
}

/// Which morphology output feeds the labeling collaborator.
///
/// The reference device computes the erosion buffer but hands the *dilation*
/// buffer to labeling; whether that was intended is an open question, so both
/// wirings are available and the literal one is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelSource {
    #[default]
    Dilation,
    Erosion,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineConfig {
    pub threshold: ThresholdMode,
    pub label_source: LabelSource,
    pub border_policy: BorderPolicy,
}

/// Frame-synchronous state record read by the administration path. Written
/// as a whole record once per completed frame; readers receive copies, so a
/// polling reader sees either the previous or the new record, never a mix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    /// Cut value actually used for the last frame (manual or Otsu result).
    pub resolved_threshold: u8,
    /// Number of regions found in the last frame.
    pub object_count: u32,
    /// Completed-frame counter, wrapping.
    pub step_counter: u32,
}

/// The per-frame analysis pipeline: fixed buffer set, stage sequencing, and
/// device state publication.
pub struct FramePipeline<L: RegionLabeler> {
    buffers: FrameBuffers,
    config: PipelineConfig,
    labeler: L,
    state: DeviceState,
    binary: GrayFrame,
    prof_frames: u64,
    prof_segment: Duration,
    prof_morph: Duration,
    prof_label: Duration,
}

impl<L: RegionLabeler> FramePipeline<L> {
    /// Pipeline at the device working resolution.
    pub fn new(config: PipelineConfig, labeler: L) -> Self {
        Self::with_buffers(FrameBuffers::working(), config, labeler)
    }

    /// Pipeline over an explicit buffer set (any geometry; used by tests and
    /// bench rigs).
    pub fn with_buffers(buffers: FrameBuffers, config: PipelineConfig, labeler: L) -> Self {
        let binary = GrayFrame::new(buffers.width(), buffers.height());
        Self {
            buffers,
            config,
            labeler,
            state: DeviceState::default(),
            binary,
            prof_frames: 0,
            prof_segment: Duration::ZERO,
            prof_morph: Duration::ZERO,
            prof_label: Duration::ZERO,
        }
    }

    /// Last published device state.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    /// Reconfigure the next frame (threshold pushes from the administration
    /// path land here between invocations).
    pub fn set_config(&mut self, config: PipelineConfig) {
        self.config = config;
    }

    /// Annotated display frame of the last completed invocation.
    pub fn display(&self) -> &GrayFrame {
        &self.buffers.display
    }

    /// The full buffer set (stage outputs of the last invocation).
    pub fn buffers(&self) -> &FrameBuffers {
        &self.buffers
    }

    /// Run the pipeline once over `input`, a row-major grayscale frame of
    /// the pipeline geometry.
    ///
    /// A wrong input length is a precondition violation and panics; the only
    /// runtime error path is a failure reported by the labeling
    /// collaborator.
    pub fn process(&mut self, input: &[u8]) -> Result<DeviceState> {
        assert_eq!(
            input.len(),
            self.buffers.grayscale.len(),
            "input frame size does not match the pipeline geometry"
        );
        self.buffers.grayscale.data.copy_from_slice(input);

        // Segmentation: resolve the cut, then build the two-level frame.
        let segment_start = Instant::now();
        let cut = match self.config.threshold {
            ThresholdMode::Manual(v) => v,
            ThresholdMode::Auto => {
                let mut hist = [0u32; 256];
                accumulate_histogram(&mut hist, &self.buffers.grayscale);
                otsu_threshold(&hist)
            }
        };
        threshold(&mut self.buffers.threshold, &self.buffers.grayscale, cut);
        self.prof_segment += segment_start.elapsed();

        // Morphology: dilation, then erosion of the dilation output.
        let morph_start = Instant::now();
        dilate3x3(&mut self.buffers.dilation, &self.buffers.threshold);
        if self.config.border_policy == BorderPolicy::CopySource {
            copy_border(&mut self.buffers.dilation, &self.buffers.threshold);
        }
        erode3x3(&mut self.buffers.erosion, &self.buffers.dilation);
        if self.config.border_policy == BorderPolicy::CopySource {
            copy_border(&mut self.buffers.erosion, &self.buffers.dilation);
        }
        self.prof_morph += morph_start.elapsed();

        // Region extraction on the configured source, then the overlay.
        let label_start = Instant::now();
        let source = match self.config.label_source {
            LabelSource::Dilation => &self.buffers.dilation,
            LabelSource::Erosion => &self.buffers.erosion,
        };
        binarize(&mut self.binary, source, BINARY_SPLIT);
        let regions = self
            .labeler
            .label(&self.binary)
            .context("region labeling failed")?;

        self.buffers.display.copy_from(&self.buffers.grayscale);
        draw_bbox(&mut self.buffers.display, &regions, MARKER);
        self.prof_label += label_start.elapsed();

        self.state = DeviceState {
            resolved_threshold: cut,
            object_count: regions.count(),
            step_counter: self.state.step_counter.wrapping_add(1),
        };
        debug!(
            cut,
            objects = self.state.object_count,
            step = self.state.step_counter,
            "frame processed"
        );

        self.prof_frames += 1;
        if self.prof_frames > 0 && self.prof_frames % 300 == 0 {
            info!(
                frames = self.prof_frames,
                segment_ms_per_frame = format!(
                    "{:.3}",
                    self.prof_segment.as_secs_f64() * 1000.0 / self.prof_frames as f64
                ),
                morph_ms_per_frame = format!(
                    "{:.3}",
                    self.prof_morph.as_secs_f64() * 1000.0 / self.prof_frames as f64
                ),
                label_ms_per_frame = format!(
                    "{:.3}",
                    self.prof_label.as_secs_f64() * 1000.0 / self.prof_frames as f64
                ),
                "pipeline stage timings"
            );
        }

        Ok(self.state)
    }
}
