//! In-process inspection of rendered scripts with libvapoursynth-script.

use vapoursynth::prelude::*;
use vapoursynth::video_info::Property;

use crate::models::{ClipInfo, FrameRate, PixelFormat, Resolution};
use crate::tools::ToolError;

const TOOL: &str = "vapoursynth";

/// Evaluate `script` and read the shape of output node 0.
///
/// Resolution, frame rate and format must be constant.
pub fn inspect_script(script: &str) -> Result<ClipInfo, ToolError> {
    let environment = Environment::from_script(script)
        .map_err(|e| ToolError::parse(TOOL, format!("script evaluation failed: {}", e)))?;
    let (node, _) = environment
        .get_output(0)
        .map_err(|e| ToolError::parse(TOOL, format!("no output node: {}", e)))?;

    let info = node.info();
    let resolution = match info.resolution {
        Property::Constant(r) => Resolution::new(r.width as u32, r.height as u32),
        Property::Variable => return Err(ToolError::parse(TOOL, "variable resolution")),
    };
    let fps = match info.framerate {
        Property::Constant(f) => FrameRate::new(f.numerator, f.denominator),
        Property::Variable => return Err(ToolError::parse(TOOL, "variable frame rate")),
    };
    let format = match info.format {
        Property::Constant(f) => {
            PixelFormat::parse(f.name()).map_err(|e| ToolError::parse(TOOL, e.to_string()))?
        }
        Property::Variable => return Err(ToolError::parse(TOOL, "variable format")),
    };

    tracing::debug!(
        "Script output: {} {} {} fps, {} frames",
        resolution,
        format,
        fps,
        info.num_frames
    );

    Ok(ClipInfo {
        resolution,
        format,
        fps,
        num_frames: info.num_frames as u32,
    })
}
