//! Subcommand implementations.

use std::path::{self, Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use upscale_core::config::ConfigManager;
use upscale_core::jobs::{
    derive_output, JobQueue, JobQueueEntry, JobStatus, Priority, QueueError, Scanner,
};
use upscale_core::models::{ClipInfo, FrameRange};
use upscale_core::orchestrator::{
    run_job, CancelHandle, JobOutcome, QueueProcessor, UpscaleJob, WorkerOptions,
};
use upscale_core::pipeline::{estimate, render_script, SourceSpec};
use upscale_core::tools::ffprobe;

pub fn upscale(options: &WorkerOptions, input: PathBuf, output: PathBuf) -> Result<()> {
    let job = UpscaleJob::new(path::absolute(input)?, path::absolute(output)?);
    match run_job(&job, options, &CancelHandle::new(), None)? {
        JobOutcome::Completed(run) => {
            println!(
                "Wrote {} ({} steps)",
                job.output.display(),
                run.steps_completed.len()
            );
        }
        JobOutcome::AlreadyExists => println!("{} already exists", job.output.display()),
    }
    Ok(())
}

pub fn add(
    manager: &ConfigManager,
    input: PathBuf,
    output: Option<PathBuf>,
    priority: Priority,
    force: bool,
) -> Result<()> {
    if !input.is_file() {
        bail!("input file {} not found", input.display());
    }
    let input = path::absolute(&input)?;
    let output = match output {
        Some(out) => path::absolute(out)?,
        None => derive_output(&input)?,
    };
    if output.exists() {
        bail!("output file {} already exists", output.display());
    }

    let mut queue = JobQueue::new(&manager.queue_folder());
    let entry = JobQueueEntry::new(input, output, priority);
    let id = entry.id.clone();
    queue.enqueue(entry, force)?;
    queue.save().context("saving queue")?;

    println!("Queued {}", id);
    Ok(())
}

pub fn scan(manager: &ConfigManager, dir: &Path) -> Result<()> {
    let root = path::absolute(dir)?;
    let candidates = Scanner::new(&root)
        .scan()
        .with_context(|| format!("scanning {}", root.display()))?;

    let mut queue = JobQueue::new(&manager.queue_folder());
    let mut added = 0;
    for candidate in candidates {
        let entry = JobQueueEntry::new(candidate.input, candidate.output, candidate.priority);
        match queue.enqueue(entry, false) {
            Ok(()) => added += 1,
            Err(QueueError::Conflict { id, .. }) => tracing::debug!("Already queued: {}", id),
            Err(e) => return Err(e.into()),
        }
    }
    queue.save().context("saving queue")?;

    println!("Queued {} new jobs", added);
    Ok(())
}

pub fn worker(manager: &ConfigManager, options: WorkerOptions, poll: Option<u64>) -> Result<()> {
    manager.ensure_dirs_exist()?;
    let processor = QueueProcessor::new(options, CancelHandle::new());

    loop {
        // Reload each round so jobs added meanwhile are seen.
        let mut queue = JobQueue::new(&manager.queue_folder());
        let results = processor.drain(&mut queue)?;

        let failed = results
            .iter()
            .filter(|r| r.status == JobStatus::Failed)
            .count();
        if !results.is_empty() {
            tracing::info!("Processed {} jobs, {} failed", results.len(), failed);
        }

        match poll {
            Some(secs) => thread::sleep(Duration::from_secs(secs.max(1))),
            None => {
                if failed > 0 {
                    bail!("{} of {} jobs failed", failed, results.len());
                }
                return Ok(());
            }
        }
    }
}

pub fn script(
    options: &WorkerOptions,
    input: PathBuf,
    from: u32,
    to: u32,
    cache: Option<PathBuf>,
) -> Result<()> {
    let range = FrameRange::new(from, to)?;
    let source = match cache {
        Some(cache) => SourceSpec::new(input, cache),
        None => SourceSpec::beside_input(input),
    };
    print!("{}", render_script(&source, range, &options.pipeline)?);
    Ok(())
}

fn probe(options: &WorkerOptions, input: &Path) -> Result<ClipInfo> {
    ffprobe::probe_video(&options.tools.ffprobe, input)
        .with_context(|| format!("probing {}", input.display()))
}

fn resolve_range(from: Option<u32>, to: Option<u32>, len: u32) -> Result<FrameRange> {
    let range = FrameRange::new(from.unwrap_or(0), to.unwrap_or(len))?;
    range.check_within(len)?;
    Ok(range)
}

pub fn plan(
    options: &WorkerOptions,
    input: &Path,
    from: Option<u32>,
    to: Option<u32>,
    custom_scale: Option<u32>,
) -> Result<()> {
    let info = probe(options, input)?;
    let range = resolve_range(from, to, info.num_frames)?;
    let est = estimate(info, range, &options.pipeline, custom_scale)?;

    println!("source {}", info);
    print!("{}", est);
    Ok(())
}

pub fn info(
    options: &WorkerOptions,
    input: PathBuf,
    from: Option<u32>,
    to: Option<u32>,
) -> Result<()> {
    let range = match (from, to) {
        (Some(from), Some(to)) => FrameRange::new(from, to)?,
        _ => resolve_range(from, to, probe(options, &input)?.num_frames)?,
    };
    let script = render_script(&SourceSpec::beside_input(input), range, &options.pipeline)?;
    let clip = inspect(options, &script)?;
    println!("{}", clip);
    Ok(())
}

#[cfg(feature = "vapoursynth")]
fn inspect(_options: &WorkerOptions, script: &str) -> Result<ClipInfo> {
    Ok(upscale_core::vs::inspect_script(script)?)
}

#[cfg(not(feature = "vapoursynth"))]
fn inspect(options: &WorkerOptions, script: &str) -> Result<ClipInfo> {
    use std::fs;

    use upscale_core::tools::vspipe;

    let path = std::env::temp_dir().join(format!("video-upscaler-{}.vpy", std::process::id()));
    fs::write(&path, script).with_context(|| format!("writing {}", path.display()))?;
    let result = vspipe::info(&options.tools.vspipe, &path);
    if let Err(e) = fs::remove_file(&path) {
        tracing::debug!("Cannot remove {}: {}", path.display(), e);
    }
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_defaults_to_whole_clip() {
        let range = resolve_range(None, None, 500).unwrap();
        assert_eq!((range.from(), range.to()), (0, 500));

        let range = resolve_range(Some(100), None, 500).unwrap();
        assert_eq!(range.len(), 400);
    }

    #[test]
    fn range_past_end_is_rejected() {
        assert!(resolve_range(Some(0), Some(501), 500).is_err());
        assert!(resolve_range(Some(10), Some(10), 500).is_err());
    }
}
