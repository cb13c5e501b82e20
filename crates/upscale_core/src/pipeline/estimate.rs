//! Dry-run estimation of stage shapes from clip metadata.

use std::fmt;

use crate::models::{ClipInfo, FrameRange, ModelSelector, PixelFormat, Resolution};

use super::align::{pad_resolution, restore};
use super::config::{InterpolationStage, PipelineConfig, UpscaleStage};
use super::video_core::{run, SourceSpec, Stage, StageError, VideoCore};

/// Computes what each stage would produce without touching any frames.
#[derive(Debug, Clone)]
pub struct EstimateCore {
    source: ClipInfo,
    /// Scale used for custom model files, whose scale can't be known.
    custom_scale: Option<u32>,
    stages: Vec<(Stage, ClipInfo)>,
    output: Option<ClipInfo>,
}

impl EstimateCore {
    pub fn new(source: ClipInfo, custom_scale: Option<u32>) -> Self {
        Self {
            source,
            custom_scale,
            stages: Vec::new(),
            output: None,
        }
    }

    /// Stages that ran, with the clip each produced.
    pub fn stages(&self) -> &[(Stage, ClipInfo)] {
        &self.stages
    }

    pub fn output(&self) -> Option<&ClipInfo> {
        self.output.as_ref()
    }

    fn record(&mut self, stage: Stage, clip: ClipInfo) -> ClipInfo {
        self.stages.push((stage, clip));
        clip
    }
}

impl VideoCore for EstimateCore {
    type Clip = ClipInfo;

    fn load(&mut self, _source: &SourceSpec) -> Result<ClipInfo, StageError> {
        Ok(self.record(Stage::Load, self.source))
    }

    fn trim(&mut self, clip: &ClipInfo, range: FrameRange) -> Result<ClipInfo, StageError> {
        let trimmed = clip
            .trim(range)
            .map_err(|e| StageError::clip(Stage::Trim, e))?;
        Ok(self.record(Stage::Trim, trimmed))
    }

    fn pad_for_inference(
        &mut self,
        clip: &ClipInfo,
        block: u32,
        format: PixelFormat,
        _matrix: &str,
    ) -> Result<ClipInfo, StageError> {
        if block == 0 {
            return Err(StageError::failed(Stage::Pad, "block size must be non-zero"));
        }
        let padded = ClipInfo {
            resolution: pad_resolution(clip.resolution, block),
            format,
            ..*clip
        };
        Ok(self.record(Stage::Pad, padded))
    }

    fn upscale(&mut self, clip: &ClipInfo, stage: &UpscaleStage) -> Result<ClipInfo, StageError> {
        let scale = stage
            .model
            .known_scale()
            .or(self.custom_scale)
            .ok_or_else(|| match &stage.model {
                ModelSelector::CustomPath(path) => StageError::failed(
                    Stage::Upscale,
                    format!("scale of {} is unknown; pass a custom scale", path.display()),
                ),
                ModelSelector::Preset(_) => StageError::failed(Stage::Upscale, "unknown scale"),
            })?;

        if scale == 0 {
            return Err(StageError::failed(Stage::Upscale, "scale must be non-zero"));
        }
        let scaled = clip
            .resolution
            .width
            .checked_mul(scale)
            .zip(clip.resolution.height.checked_mul(scale))
            .ok_or_else(|| {
                StageError::failed(
                    Stage::Upscale,
                    format!("{} scaled by {} overflows", clip.resolution, scale),
                )
            })?;

        let mut out = *clip;
        out.resolution = Resolution::new(scaled.0, scaled.1);
        Ok(self.record(Stage::Upscale, out))
    }

    fn interpolate(
        &mut self,
        clip: &ClipInfo,
        stage: &InterpolationStage,
    ) -> Result<ClipInfo, StageError> {
        let factor = stage.frame_multiplier();
        let num_frames = u32::try_from(factor)
            .ok()
            .and_then(|f| clip.num_frames.checked_mul(f))
            .ok_or_else(|| {
                StageError::failed(
                    Stage::Interpolate,
                    format!("{} frames times {} overflows", clip.num_frames, factor),
                )
            })?;
        let out = ClipInfo {
            fps: clip.fps.multiplied(factor),
            num_frames,
            ..*clip
        };
        Ok(self.record(Stage::Interpolate, out))
    }

    fn restore(
        &mut self,
        result: &ClipInfo,
        reference: &ClipInfo,
        block: u32,
        format: PixelFormat,
        _matrix: &str,
    ) -> Result<ClipInfo, StageError> {
        if block == 0 {
            return Err(StageError::failed(Stage::Restore, "block size must be non-zero"));
        }
        let padded = pad_resolution(reference.resolution, block);
        let out = ClipInfo {
            resolution: restore(reference.resolution, padded, result.resolution),
            format,
            ..*result
        };
        Ok(self.record(Stage::Restore, out))
    }

    fn set_output(&mut self, clip: &ClipInfo) -> Result<(), StageError> {
        self.output = Some(*clip);
        Ok(())
    }
}

/// Result of a dry run.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub stages: Vec<(Stage, ClipInfo)>,
    pub output: ClipInfo,
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (stage, clip) in &self.stages {
            writeln!(f, "{:<12} {}", stage.to_string(), clip)?;
        }
        write!(f, "{:<12} {}", "output", self.output)
    }
}

/// Estimate every stage for `range` of a clip described by `info`.
pub fn estimate(
    info: ClipInfo,
    range: FrameRange,
    config: &PipelineConfig,
    custom_scale: Option<u32>,
) -> Result<Estimate, StageError> {
    let mut core = EstimateCore::new(info, custom_scale);
    // The source path is not consulted by the estimator.
    let source = SourceSpec::new("", "");
    let output = run(&mut core, &source, range, config)?;
    Ok(Estimate {
        stages: core.stages,
        output,
    })
}
