//! Stage sequencing over an abstract video backend.
//!
//! `VideoCore` is the seam to the decoder, inference runtime and resizer.
//! `run` drives the stages in a fixed order and never inspects clips itself.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{ClipError, FrameRange, PixelFormat};

use super::config::{InterpolationStage, PipelineConfig, UpscaleStage};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Trim,
    Pad,
    Upscale,
    Interpolate,
    Restore,
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Trim => "trim",
            Stage::Pad => "pad",
            Stage::Upscale => "upscale",
            Stage::Interpolate => "interpolate",
            Stage::Restore => "restore",
            Stage::Output => "output",
        };
        write!(f, "{}", name)
    }
}

/// Error raised by a stage. Passed through `run` unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("{stage} stage failed: {message}")]
    Failed { stage: Stage, message: String },

    #[error("{stage} stage rejected clip: {source}")]
    Clip {
        stage: Stage,
        #[source]
        source: ClipError,
    },
}

impl StageError {
    pub fn failed(stage: Stage, message: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            message: message.into(),
        }
    }

    pub fn clip(stage: Stage, source: ClipError) -> Self {
        Self::Clip { stage, source }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Failed { stage, .. } | Self::Clip { stage, .. } => *stage,
        }
    }
}

/// Source file plus the decoder's index cache location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub input: PathBuf,
    pub cache: PathBuf,
}

impl SourceSpec {
    pub fn new(input: impl Into<PathBuf>, cache: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            cache: cache.into(),
        }
    }

    /// Cache placed next to the input as `<input>.lwi`.
    pub fn beside_input(input: impl Into<PathBuf>) -> Self {
        let input = input.into();
        let mut cache = input.clone().into_os_string();
        cache.push(".lwi");
        Self {
            input,
            cache: PathBuf::from(cache),
        }
    }
}

/// Operations the pipeline needs from a video backend.
///
/// Each operation consumes a clip by reference and returns a new one.
pub trait VideoCore {
    type Clip;

    fn load(&mut self, source: &SourceSpec) -> Result<Self::Clip, StageError>;

    fn trim(&mut self, clip: &Self::Clip, range: FrameRange) -> Result<Self::Clip, StageError>;

    /// Convert to the inference format at a size padded to `block`.
    fn pad_for_inference(
        &mut self,
        clip: &Self::Clip,
        block: u32,
        format: PixelFormat,
        matrix: &str,
    ) -> Result<Self::Clip, StageError>;

    fn upscale(&mut self, clip: &Self::Clip, stage: &UpscaleStage)
        -> Result<Self::Clip, StageError>;

    fn interpolate(
        &mut self,
        clip: &Self::Clip,
        stage: &InterpolationStage,
    ) -> Result<Self::Clip, StageError>;

    /// Resize `result` to the reference size times the measured scale and
    /// convert to the output format.
    fn restore(
        &mut self,
        result: &Self::Clip,
        reference: &Self::Clip,
        block: u32,
        format: PixelFormat,
        matrix: &str,
    ) -> Result<Self::Clip, StageError>;

    fn set_output(&mut self, clip: &Self::Clip) -> Result<(), StageError>;
}

/// Run every configured stage for `range` of `source` and return the final clip.
pub fn run<C: VideoCore>(
    core: &mut C,
    source: &SourceSpec,
    range: FrameRange,
    config: &PipelineConfig,
) -> Result<C::Clip, StageError> {
    tracing::debug!(
        "Pipeline for {} frames {} (interpolation: {})",
        source.input.display(),
        range,
        config.interpolation.is_some()
    );

    let src = core.load(source)?;
    let trimmed = core.trim(&src, range)?;
    let padded = core.pad_for_inference(
        &trimmed,
        config.block_size,
        config.inference_format,
        &config.matrix,
    )?;

    let mut result = core.upscale(&padded, &config.upscale)?;
    if let Some(stage) = &config.interpolation {
        result = core.interpolate(&result, stage)?;
    }

    let output = core.restore(
        &result,
        &trimmed,
        config.block_size,
        config.output_format,
        &config.matrix,
    )?;
    core.set_output(&output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{lookup_rife, BackendOptions, ModelSelector, DEFAULT_RIFE_PRESET};

    /// Records the order of calls; optionally fails at one stage.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<Stage>,
        fail_at: Option<Stage>,
    }

    impl Recorder {
        fn step(&mut self, stage: Stage) -> Result<Stage, StageError> {
            self.calls.push(stage);
            if self.fail_at == Some(stage) {
                return Err(StageError::failed(stage, "boom"));
            }
            Ok(stage)
        }
    }

    impl VideoCore for Recorder {
        type Clip = Stage;

        fn load(&mut self, _: &SourceSpec) -> Result<Stage, StageError> {
            self.step(Stage::Load)
        }
        fn trim(&mut self, _: &Stage, _: FrameRange) -> Result<Stage, StageError> {
            self.step(Stage::Trim)
        }
        fn pad_for_inference(
            &mut self,
            _: &Stage,
            _: u32,
            _: PixelFormat,
            _: &str,
        ) -> Result<Stage, StageError> {
            self.step(Stage::Pad)
        }
        fn upscale(&mut self, _: &Stage, _: &UpscaleStage) -> Result<Stage, StageError> {
            self.step(Stage::Upscale)
        }
        fn interpolate(&mut self, _: &Stage, _: &InterpolationStage) -> Result<Stage, StageError> {
            self.step(Stage::Interpolate)
        }
        fn restore(
            &mut self,
            _: &Stage,
            reference: &Stage,
            _: u32,
            _: PixelFormat,
            _: &str,
        ) -> Result<Stage, StageError> {
            assert_eq!(*reference, Stage::Trim, "restore must reference the trimmed clip");
            self.step(Stage::Restore)
        }
        fn set_output(&mut self, _: &Stage) -> Result<(), StageError> {
            self.step(Stage::Output).map(|_| ())
        }
    }

    fn config(rife: bool) -> PipelineConfig {
        let config = PipelineConfig::new(UpscaleStage {
            model: ModelSelector::CustomPath("/m.onnx".into()),
            backend: BackendOptions::default(),
        });
        if rife {
            let preset = lookup_rife(DEFAULT_RIFE_PRESET).unwrap();
            config.with_interpolation(InterpolationStage::new(preset, BackendOptions::default()))
        } else {
            config
        }
    }

    fn source() -> SourceSpec {
        SourceSpec::new("/in.mkv", "/in.lwi")
    }

    #[test]
    fn stages_run_in_order_with_interpolation() {
        let mut core = Recorder::default();
        let out = run(&mut core, &source(), FrameRange::new(0, 10).unwrap(), &config(true)).unwrap();

        assert_eq!(out, Stage::Restore);
        assert_eq!(
            core.calls,
            vec![
                Stage::Load,
                Stage::Trim,
                Stage::Pad,
                Stage::Upscale,
                Stage::Interpolate,
                Stage::Restore,
                Stage::Output
            ]
        );
    }

    #[test]
    fn interpolation_is_never_invoked_when_disabled() {
        let mut core = Recorder::default();
        run(&mut core, &source(), FrameRange::new(0, 10).unwrap(), &config(false)).unwrap();
        assert!(!core.calls.contains(&Stage::Interpolate));
        assert_eq!(core.calls.len(), 6);
    }

    #[test]
    fn stage_error_propagates_unchanged_and_stops() {
        let mut core = Recorder {
            fail_at: Some(Stage::Upscale),
            ..Default::default()
        };
        let err = run(&mut core, &source(), FrameRange::new(0, 10).unwrap(), &config(true))
            .unwrap_err();

        assert_eq!(err, StageError::failed(Stage::Upscale, "boom"));
        assert_eq!(err.stage(), Stage::Upscale);
        assert_eq!(core.calls.last(), Some(&Stage::Upscale));
    }

    #[test]
    fn cache_beside_input() {
        let spec = SourceSpec::beside_input("/media/ep01.mkv");
        assert_eq!(spec.cache, PathBuf::from("/media/ep01.mkv.lwi"));
    }
}
