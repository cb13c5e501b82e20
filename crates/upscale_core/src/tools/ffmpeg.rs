//! ffmpeg invocations for encoding parts and assembling the final file.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use super::{ToolCommand, ToolError};

const TOOL: &str = "ffmpeg";

/// Encode y4m from stdin into `output`, reporting progress on stdout.
pub fn part_command(
    ffmpeg: &str,
    input_args: &[String],
    transcode_args: &[String],
    output: &Path,
) -> ToolCommand {
    ToolCommand::new(TOOL, ffmpeg)
        .args(input_args)
        .args(["-i", "-"])
        .args(transcode_args)
        .args(["-progress", "pipe:1", "-nostats"])
        .arg("-y")
        .arg(output)
}

/// Concatenate the parts listed in `list` and copy every non-video stream,
/// chapters and metadata from `original`.
pub fn concat_command(ffmpeg: &str, list: &Path, original: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new(TOOL, ffmpeg)
        .args(["-hide_banner", "-loglevel", "info"])
        .args(["-f", "concat", "-safe", "0", "-i"])
        .arg(list)
        .args(["-f", "matroska", "-i"])
        .arg(original)
        .args(["-map_metadata", "1", "-map", "0:v:0", "-map", "1", "-map", "-1:v:0"])
        .args(["-c", "copy", "-seek2any", "1", "-g", "24"])
        .arg("-y")
        .arg(output)
}

/// Quote a path for the concat demuxer: single quotes, with `'` as `'\''`.
pub fn concat_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

/// Concat list contents for `parts`, one `file` line each.
pub fn concat_list(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| format!("file {}\n", concat_quote(p)))
        .collect()
}

/// Write the concat list file.
pub fn write_concat_list(list: &Path, parts: &[PathBuf]) -> Result<(), ToolError> {
    fs::write(list, concat_list(parts))
        .map_err(|e| ToolError::io(format!("writing {}", list.display()), e))
}

/// Arguments as strings, for assertions and logging.
pub fn args_lossy(args: &[OsString]) -> Vec<String> {
    args.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{split_args, EncodeSettings};
    use tempfile::tempdir;

    #[test]
    fn part_command_orders_arguments() {
        let encode = EncodeSettings::default();
        let cmd = part_command(
            "ffmpeg",
            &split_args(&encode.ffmpeg_input_args),
            &split_args("-c:v hevc_nvenc"),
            Path::new("/tmp/work-0000000.mkv"),
        );
        let args = args_lossy(&cmd.args);

        assert_eq!(&args[..6], ["-hide_banner", "-loglevel", "info", "-stats_period", "10", "-i"]);
        assert_eq!(args[6], "-");
        assert_eq!(&args[7..9], ["-c:v", "hevc_nvenc"]);
        assert_eq!(
            &args[9..],
            ["-progress", "pipe:1", "-nostats", "-y", "/tmp/work-0000000.mkv"]
        );
    }

    #[test]
    fn concat_command_maps_original_streams() {
        let cmd = concat_command(
            "ffmpeg",
            Path::new("/w/files.txt"),
            Path::new("/m/in.mkv"),
            Path::new("/w/combined.mkv"),
        );
        let line = args_lossy(&cmd.args).join(" ");
        assert!(line.contains("-f concat -safe 0 -i /w/files.txt"));
        assert!(line.contains("-f matroska -i /m/in.mkv"));
        assert!(line.contains("-map_metadata 1 -map 0:v:0 -map 1 -map -1:v:0 -c copy"));
        assert!(line.ends_with("-y /w/combined.mkv"));
    }

    #[test]
    fn concat_list_escapes_single_quotes() {
        let parts = vec![
            PathBuf::from("/w/0000000+7200.mkv"),
            PathBuf::from("/w/It's/0007200+7200.mkv"),
        ];
        assert_eq!(
            concat_list(&parts),
            "file '/w/0000000+7200.mkv'\nfile '/w/It'\\''s/0007200+7200.mkv'\n"
        );
    }

    #[test]
    fn writes_list_file() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("files.txt");
        write_concat_list(&list, &[dir.path().join("0000000+7200.mkv")]).unwrap();
        let content = fs::read_to_string(&list).unwrap();
        assert!(content.starts_with("file '"));
        assert!(content.ends_with("0000000+7200.mkv'\n"));
    }
}
