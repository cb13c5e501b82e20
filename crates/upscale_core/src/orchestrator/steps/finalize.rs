//! Finalize step: joins the parts, carries over the original's other
//! streams and moves the result into place.

use std::fs;
use std::io;
use std::path::Path;

use crate::logging::JobLogger;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{
    Context, FinalizeOutput, JobState, MoveMethod, StepOutcome, COMBINED_FILE,
};
use crate::tools::{ffmpeg, run_logged};

pub struct FinalizeStep;

impl FinalizeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FinalizeStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Move `src` to `dest`: hard link then unlink, or rename when linking fails.
pub fn move_file(src: &Path, dest: &Path, logger: &JobLogger) -> io::Result<MoveMethod> {
    match fs::hard_link(src, dest) {
        Ok(()) => {
            fs::remove_file(src)?;
            Ok(MoveMethod::HardLink)
        }
        Err(e) => {
            logger.warn(&format!(
                "Cannot hard link {} to {}: {}",
                src.display(),
                dest.display(),
                e
            ));
            fs::rename(src, dest)?;
            Ok(MoveMethod::Rename)
        }
    }
}

/// Delete every `.mkv` file directly inside `dir`. Returns how many went.
pub fn remove_video_files(dir: &Path, logger: &JobLogger) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "mkv") {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => logger.warn(&format!("Cannot remove {}: {}", path.display(), e)),
            }
        }
    }
    Ok(removed)
}

impl PipelineStep for FinalizeStep {
    fn name(&self) -> &str {
        "Finalize"
    }

    fn description(&self) -> &str {
        "Combine parts and move to output"
    }

    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        let parts = state
            .parts
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("parts not rendered"))?;
        if !parts.list_file.exists() {
            return Err(StepError::file_not_found(parts.list_file.display().to_string()));
        }
        if ctx.job.output.exists() {
            return Err(StepError::precondition_failed(format!(
                "output {} appeared while the job was running",
                ctx.job.output.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let parts = state
            .parts
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("parts not rendered"))?;

        let combined = ctx.work_path(COMBINED_FILE);
        ctx.logger
            .info(&format!("Combining {} parts", parts.parts.len()));
        let cmd = ffmpeg::concat_command(
            &ctx.options.tools.ffmpeg,
            &parts.list_file,
            &ctx.job.input,
            &combined,
        );
        run_logged(&cmd, &ctx.logger, ctx.cancel_flag())?;

        ctx.logger
            .info(&format!("Moving combined file to {}", ctx.job.output.display()));
        let method = move_file(&combined, &ctx.job.output, &ctx.logger)
            .map_err(|e| StepError::io_error("moving combined file to output", e))?;

        let cleaned = remove_video_files(&ctx.work_dir, &ctx.logger)
            .map_err(|e| StepError::io_error("removing temporary video files", e))?;
        ctx.logger
            .debug(&format!("Removed {} temporary video files", cleaned));

        state.finalize = Some(FinalizeOutput {
            output: ctx.job.output.clone(),
            method,
            cleaned,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, _state: &JobState) -> StepResult<()> {
        if !ctx.job.output.is_file() {
            return Err(StepError::invalid_output(format!(
                "{} was not created",
                ctx.job.output.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogConfig;
    use tempfile::tempdir;

    fn logger(dir: &Path) -> JobLogger {
        JobLogger::new("test", dir, LogConfig::default(), None).unwrap()
    }

    #[test]
    fn move_file_links_within_filesystem() {
        let dir = tempdir().unwrap();
        let log = logger(dir.path());
        let src = dir.path().join("combined.mkv");
        let dest = dir.path().join("out 2160p.mkv");
        fs::write(&src, b"video").unwrap();

        let method = move_file(&src, &dest, &log).unwrap();
        assert_eq!(method, MoveMethod::HardLink);
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"video");
    }

    #[test]
    fn move_file_fails_for_missing_source() {
        let dir = tempdir().unwrap();
        let log = logger(dir.path());
        let err = move_file(&dir.path().join("nope.mkv"), &dir.path().join("x.mkv"), &log);
        assert!(err.is_err());
    }

    #[test]
    fn cleanup_only_removes_mkv_files() {
        let dir = tempdir().unwrap();
        let log = logger(dir.path());
        let root = dir.path();
        fs::write(root.join("0000000+7200.mkv"), b"").unwrap();
        fs::write(root.join("work-0007200.mkv"), b"").unwrap();
        fs::write(root.join("files.txt"), b"").unwrap();
        fs::write(root.join("framecount"), b"10").unwrap();
        fs::create_dir(root.join("dir.mkv")).unwrap();

        assert_eq!(remove_video_files(root, &log).unwrap(), 2);
        assert!(root.join("files.txt").exists());
        assert!(root.join("framecount").exists());
        assert!(root.join("upscale.log").exists());
        assert!(root.join("dir.mkv").is_dir());
    }
}
