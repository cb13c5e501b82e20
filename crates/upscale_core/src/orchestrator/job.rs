//! Running a single upscale job end to end.

use std::fs;
use std::path;
use std::sync::Arc;

use crate::jobs::job_id;
use crate::logging::JobLogger;

use super::create_upscale_pipeline;
use super::errors::{PipelineError, PipelineResult};
use super::pipeline::CancelHandle;
use super::types::{Context, JobOutcome, JobState, ProgressCallback, UpscaleJob, WorkerOptions};

/// Upscale `job.input` into `job.output`.
///
/// An existing output is not an error: the job is skipped with a warning.
/// Finished parts in the work directory are reused.
pub fn run_job(
    job: &UpscaleJob,
    options: &WorkerOptions,
    cancel: &CancelHandle,
    progress: Option<ProgressCallback>,
) -> PipelineResult<JobOutcome> {
    let job_name = job.name();

    if job.output.exists() {
        tracing::warn!(
            input = %job.input.display(),
            output = %job.output.display(),
            "Output already exists, skipping upscale"
        );
        return Ok(JobOutcome::AlreadyExists);
    }

    if !job.input.is_file() {
        return Err(PipelineError::validation_failed(
            &job_name,
            format!("input file {} not found", job.input.display()),
        ));
    }

    let work_dir = path::absolute(job.work_dir(&options.temp_root)).map_err(|e| {
        PipelineError::setup_failed(&job_name, format!("cannot resolve work dir: {}", e))
    })?;
    fs::create_dir_all(&work_dir).map_err(|e| {
        PipelineError::setup_failed(
            &job_name,
            format!("cannot create work dir {}: {}", work_dir.display(), e),
        )
    })?;

    tracing::info!(
        input = %job.input.display(),
        output = %job.output.display(),
        work_dir = %work_dir.display(),
        "Upscaling file"
    );

    let logger = JobLogger::new(&job_name, &work_dir, options.log_config.clone(), None)
        .map_err(|e| PipelineError::setup_failed(&job_name, format!("cannot open job log: {}", e)))?;
    let logger = Arc::new(logger);

    let pipeline = create_upscale_pipeline().with_cancel_handle(cancel.clone());
    let mut ctx = Context::new(
        job.clone(),
        options.clone(),
        work_dir,
        Arc::clone(&logger),
        cancel.clone(),
    );
    if let Some(callback) = progress {
        ctx = ctx.with_progress_callback(callback);
    }

    let mut state = JobState::new(job_id(&job.output));
    let result = pipeline.run(&ctx, &mut state);

    match &result {
        Ok(_) => logger.success(&format!("Wrote {}", job.output.display())),
        Err(e) => {
            logger.show_tail("Last tool output");
            logger.error(&e.to_string());
        }
    }
    logger.close();

    result.map(JobOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvOverrides, Settings};
    use tempfile::tempdir;

    fn options(temp_root: &path::Path) -> WorkerOptions {
        let mut settings = Settings::default();
        settings.paths.temp_root = temp_root.to_string_lossy().into_owned();
        WorkerOptions::from_settings(&settings, &EnvOverrides::default()).unwrap()
    }

    #[test]
    fn existing_output_is_skipped() {
        let dir = tempdir().unwrap();
        let job = UpscaleJob::new(dir.path().join("a 1080p.mkv"), dir.path().join("a 2160p.mkv"));
        fs::write(&job.output, b"done").unwrap();

        let outcome = run_job(&job, &options(&dir.path().join("tmp")), &CancelHandle::new(), None)
            .unwrap();
        assert!(matches!(outcome, JobOutcome::AlreadyExists));
        assert!(!dir.path().join("tmp").exists());
    }

    #[test]
    fn missing_input_fails_validation() {
        let dir = tempdir().unwrap();
        let job = UpscaleJob::new(dir.path().join("a 1080p.mkv"), dir.path().join("a 2160p.mkv"));

        let err = run_job(&job, &options(&dir.path().join("tmp")), &CancelHandle::new(), None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailed { .. }));
    }

    #[test]
    fn cancelled_job_leaves_cut_marker() {
        let dir = tempdir().unwrap();
        let job = UpscaleJob::new(dir.path().join("a 1080p.mkv"), dir.path().join("a 2160p.mkv"));
        fs::write(&job.input, b"").unwrap();
        let opts = options(&dir.path().join("tmp"));

        let cancel = CancelHandle::new();
        cancel.cancel();
        let err = run_job(&job, &opts, &cancel, None).unwrap_err();
        assert!(err.is_cancelled());

        let log = job.work_dir(&opts.temp_root).join(crate::logging::JOB_LOG_FILE);
        let text = fs::read_to_string(log).unwrap();
        assert!(text.contains(crate::logging::CUT_MARKER));
    }
}
