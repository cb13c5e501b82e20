//! vspipe invocations: rendering to y4m and reading script info.

use std::path::Path;

use crate::models::{ClipInfo, FrameRate, PixelFormat, Resolution};

use super::runner::run_output;
use super::{ToolCommand, ToolError};

const TOOL: &str = "vspipe";

/// Render `script` as y4m to stdout.
pub fn render_command(vspipe: &str, script: &Path) -> ToolCommand {
    ToolCommand::new(TOOL, vspipe)
        .args(["-c", "y4m"])
        .arg(script)
        .arg("-")
}

/// Print output node info for `script` without rendering.
pub fn info_command(vspipe: &str, script: &Path) -> ToolCommand {
    ToolCommand::new(TOOL, vspipe).arg("-i").arg(script).arg("-")
}

/// Parse `vspipe -i` output.
///
/// Only `Width`, `Height`, `Frames`, `FPS` and `Format Name` are read; other
/// keys are ignored.
pub fn parse_info(text: &str) -> Result<ClipInfo, ToolError> {
    let mut width = None;
    let mut height = None;
    let mut frames = None;
    let mut fps = None;
    let mut format = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Width" => width = Some(parse_number(key, value)?),
            "Height" => height = Some(parse_number(key, value)?),
            "Frames" => frames = Some(parse_number(key, value)?),
            "FPS" => {
                // "24000/1001 (23.976 fps)"
                let rate = value.split_whitespace().next().unwrap_or("");
                fps = Some(
                    FrameRate::parse(rate).map_err(|e| ToolError::parse(TOOL, e.to_string()))?,
                );
            }
            "Format Name" => {
                format = Some(
                    PixelFormat::parse(value).map_err(|e| ToolError::parse(TOOL, e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let missing = |what: &str| ToolError::parse(TOOL, format!("missing {} in info output", what));
    Ok(ClipInfo {
        resolution: Resolution::new(width.ok_or_else(|| missing("Width"))?, height.ok_or_else(|| missing("Height"))?),
        format: format.ok_or_else(|| missing("Format Name"))?,
        fps: fps.ok_or_else(|| missing("FPS"))?,
        num_frames: frames.ok_or_else(|| missing("Frames"))?,
    })
}

fn parse_number(key: &str, value: &str) -> Result<u32, ToolError> {
    value
        .parse::<u32>()
        .map_err(|e| ToolError::parse(TOOL, format!("{} '{}': {}", key.trim(), value, e)))
}

/// Run `vspipe -i` on `script` and parse the result.
pub fn info(vspipe: &str, script: &Path) -> Result<ClipInfo, ToolError> {
    let cmd = info_command(vspipe, script);
    tracing::debug!("Running: {}", cmd);
    let stdout = run_output(&cmd)?;
    parse_info(&stdout)
}
