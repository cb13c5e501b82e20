//! VapourSynth script rendering.
//!
//! `ScriptCore` implements `VideoCore` by appending one Python statement per
//! stage. The resulting script has every value baked in and needs no `-a`
//! arguments or environment variables when run through `vspipe`.

use std::collections::HashSet;
use std::path::Path;

use crate::models::{FrameRange, ModelSelector, PixelFormat};

use super::config::{InterpolationStage, PipelineConfig, UpscaleStage};
use super::video_core::{run, SourceSpec, Stage, StageError, VideoCore};

const HEADER: &str = "\
import vapoursynth as vs
from vapoursynth import core
import vsmlrt
";

/// A clip inside the script, named by its Python variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptClip {
    pub var: String,
}

/// Builds a script statement by statement.
#[derive(Debug, Default)]
pub struct ScriptCore {
    lines: Vec<String>,
    names: HashSet<String>,
    has_output: bool,
}

impl ScriptCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete script text. Fails if no output clip was set.
    pub fn finish(self) -> Result<String, StageError> {
        if !self.has_output {
            return Err(StageError::failed(Stage::Output, "script has no output clip"));
        }

        let mut script = String::from(HEADER);
        script.push('\n');
        for line in &self.lines {
            script.push_str(line);
            script.push('\n');
        }
        Ok(script)
    }

    /// Reserve a variable name, suffixing a counter if already taken.
    fn fresh(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 1;
        while self.names.contains(&name) {
            n += 1;
            name = format!("{}{}", base, n);
        }
        self.names.insert(name.clone());
        name
    }

    fn emit(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Emit `var = expr` for a fresh variable and return the clip.
    fn assign(&mut self, base: &str, expr: String) -> ScriptClip {
        let var = self.fresh(base);
        self.emit(format!("{} = {}", var, expr));
        ScriptClip { var }
    }

    /// Emit padded width and height variables for `clip`.
    fn padded_dims(&mut self, clip: &ScriptClip, block: u32) -> (String, String) {
        let w = self.fresh("tw");
        let h = self.fresh("th");
        let round = block.saturating_sub(1);
        self.emit(format!("{w} = ({}.width + {round}) // {block} * {block}", clip.var));
        self.emit(format!("{h} = ({}.height + {round}) // {block} * {block}", clip.var));
        (w, h)
    }
}

impl VideoCore for ScriptCore {
    type Clip = ScriptClip;

    fn load(&mut self, source: &SourceSpec) -> Result<ScriptClip, StageError> {
        let expr = format!(
            "core.lsmas.LWLibavSource({}, prefer_hw=0, cachefile={})",
            py_path(Stage::Load, &source.input)?,
            py_path(Stage::Load, &source.cache)?
        );
        Ok(self.assign("src", expr))
    }

    fn trim(&mut self, clip: &ScriptClip, range: FrameRange) -> Result<ScriptClip, StageError> {
        let expr = format!("{}[{}:{}]", clip.var, range.from(), range.to());
        Ok(self.assign("trimmed", expr))
    }

    fn pad_for_inference(
        &mut self,
        clip: &ScriptClip,
        block: u32,
        format: PixelFormat,
        matrix: &str,
    ) -> Result<ScriptClip, StageError> {
        if block == 0 {
            return Err(StageError::failed(Stage::Pad, "block size must be non-zero"));
        }
        if !format.is_rgb() {
            return Err(StageError::failed(
                Stage::Pad,
                format!("inference format {} is not RGB", format),
            ));
        }

        let (w, h) = self.padded_dims(clip, block);
        let expr = format!(
            "core.resize.Bicubic({}, {w}, {h}, format={}, matrix_in_s={}, src_width={w}, src_height={h})",
            clip.var,
            format.vs_constant(),
            py_str(matrix),
        );
        Ok(self.assign("padded", expr))
    }

    fn upscale(
        &mut self,
        clip: &ScriptClip,
        stage: &UpscaleStage,
    ) -> Result<ScriptClip, StageError> {
        let backend = stage.backend.to_python();
        let expr = match &stage.model {
            ModelSelector::Preset(preset) => format!(
                "vsmlrt.RealESRGANv2({}, model={}, backend={})  # {}",
                clip.var, preset.id, backend, preset.name
            ),
            ModelSelector::CustomPath(path) => format!(
                "vsmlrt.inference({}, {}, backend={})",
                clip.var,
                py_path(Stage::Upscale, path)?,
                backend
            ),
        };
        Ok(self.assign("upscaled", expr))
    }

    fn interpolate(
        &mut self,
        clip: &ScriptClip,
        stage: &InterpolationStage,
    ) -> Result<ScriptClip, StageError> {
        let expr = format!(
            "vsmlrt.RIFE({}, model={}, ensemble={}, backend={}, scale={:?}, _implementation=1)  # {}",
            clip.var,
            stage.model.value,
            if stage.ensemble { "True" } else { "False" },
            stage.backend.to_python(),
            stage.scale,
            stage.model.name,
        );
        Ok(self.assign("interpolated", expr))
    }

    fn restore(
        &mut self,
        result: &ScriptClip,
        reference: &ScriptClip,
        block: u32,
        format: PixelFormat,
        matrix: &str,
    ) -> Result<ScriptClip, StageError> {
        if block == 0 {
            return Err(StageError::failed(Stage::Restore, "block size must be non-zero"));
        }

        let (pw, ph) = self.padded_dims(reference, block);
        let ow = self.fresh("ow");
        let oh = self.fresh("oh");
        self.emit(format!("{ow} = {}.width * ({}.width // {pw})", reference.var, result.var));
        self.emit(format!("{oh} = {}.height * ({}.height // {ph})", reference.var, result.var));

        let expr = format!(
            "core.resize.Bicubic({}, {ow}, {oh}, format={}, matrix_s={}, src_width={ow}, src_height={oh})",
            result.var,
            format.vs_constant(),
            py_str(matrix),
        );
        Ok(self.assign("video", expr))
    }

    fn set_output(&mut self, clip: &ScriptClip) -> Result<(), StageError> {
        self.emit(format!("{}.set_output()", clip.var));
        self.has_output = true;
        Ok(())
    }
}

/// Render the complete script for one frame range.
pub fn render_script(
    source: &SourceSpec,
    range: FrameRange,
    config: &PipelineConfig,
) -> Result<String, StageError> {
    let mut core = ScriptCore::new();
    run(&mut core, source, range, config)?;
    core.finish()
}

/// Python string literal. JSON string escaping is valid Python syntax.
fn py_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value))
}

/// Python literal for a path. Paths that are not UTF-8 can't be written
/// into the script without changing them.
fn py_path(stage: Stage, path: &Path) -> Result<String, StageError> {
    path.to_str().map(py_str).ok_or_else(|| {
        StageError::failed(stage, format!("path {} is not valid UTF-8", path.display()))
    })
}
