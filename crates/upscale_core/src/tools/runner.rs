//! Spawning and supervising child processes.
//!
//! Output is streamed line by line into the job logger while the children
//! run. Children are polled so a cancel request can kill them promptly.

use std::io::{self, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::logging::{JobLogger, LineSplitter};

use super::progress::ProgressTracker;
use super::{ToolCommand, ToolError};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run a command to completion and return its stdout.
pub fn run_output(cmd: &ToolCommand) -> Result<String, ToolError> {
    let output = cmd.to_command().output().map_err(|e| ToolError::Spawn {
        tool: cmd.tool.clone(),
        source: e,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolError::CommandFailed {
            tool: cmd.tool.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            tail: stderr.lines().map(str::to_string).collect(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command, streaming stdout and stderr into `logger`.
pub fn run_logged(
    cmd: &ToolCommand,
    logger: &JobLogger,
    cancel: &AtomicBool,
) -> Result<(), ToolError> {
    logger.command(&cmd.to_string());
    logger.clear_tail();

    let mut child = spawn(cmd, Stdio::null())?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let outcome = thread::scope(|s| {
        s.spawn(|| pump(stdout, |line| logger.output_line(&cmd.tool, line)));
        s.spawn(|| pump(stderr, |line| logger.output_line(&cmd.tool, line)));
        supervise(&mut [Running::new(&cmd.tool, child)], cancel)
    });

    finish(outcome, logger)
}

/// Run `vspipe | ffmpeg`, feeding ffmpeg's `-progress` output to `progress`.
///
/// vspipe's stdout becomes ffmpeg's stdin. Stderr of both goes into the
/// logger. If either exits non-zero the other is killed; vspipe's failure
/// is reported first when both fail.
pub fn run_piped(
    vspipe: &ToolCommand,
    ffmpeg: &ToolCommand,
    logger: &JobLogger,
    progress: &ProgressTracker,
    cancel: &AtomicBool,
) -> Result<(), ToolError> {
    logger.command(&format!("{} | {}", vspipe, ffmpeg));
    logger.clear_tail();
    logger.reset_progress();

    let mut vs_child = spawn(vspipe, Stdio::null())?;
    let Some(vs_out) = vs_child.stdout.take() else {
        kill(&mut vs_child);
        return Err(ToolError::io(
            "connecting vspipe to ffmpeg",
            io::Error::new(io::ErrorKind::BrokenPipe, "vspipe stdout not captured"),
        ));
    };

    let mut ff_child = match spawn(ffmpeg, Stdio::from(vs_out)) {
        Ok(child) => child,
        Err(e) => {
            kill(&mut vs_child);
            return Err(e);
        }
    };

    let vs_err = vs_child.stderr.take();
    let ff_err = ff_child.stderr.take();
    let ff_out = ff_child.stdout.take();

    let outcome = thread::scope(|s| {
        s.spawn(|| pump(vs_err, |line| logger.output_line(&vspipe.tool, line)));
        s.spawn(|| pump(ff_err, |line| logger.output_line(&ffmpeg.tool, line)));
        s.spawn(|| {
            pump(ff_out, |line| {
                if progress.apply_line(line) {
                    let snap = progress.snapshot();
                    logger.progress(progress.percent().unwrap_or(0), &snap.to_string());
                }
            })
        });

        supervise(
            &mut [
                Running::new(&vspipe.tool, vs_child),
                Running::new(&ffmpeg.tool, ff_child),
            ],
            cancel,
        )
    });

    finish(outcome, logger)
}

fn spawn(cmd: &ToolCommand, stdin: Stdio) -> Result<Child, ToolError> {
    tracing::debug!("Running: {}", cmd);
    cmd.to_command()
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ToolError::Spawn {
            tool: cmd.tool.clone(),
            source: e,
        })
}

/// Copy a pipe into a line callback until EOF.
fn pump<R: Read>(pipe: Option<R>, on_line: impl FnMut(&str)) {
    let Some(mut pipe) = pipe else {
        return;
    };
    let mut splitter = LineSplitter::new(on_line);
    if let Err(e) = io::copy(&mut pipe, &mut splitter) {
        tracing::debug!("Output pipe closed with error: {}", e);
    }
    splitter.finish();
}

struct Running<'a> {
    tool: &'a str,
    child: Child,
    status: Option<ExitStatus>,
}

impl<'a> Running<'a> {
    fn new(tool: &'a str, child: Child) -> Self {
        Self {
            tool,
            child,
            status: None,
        }
    }
}

/// How supervision ended, before the tail is attached.
enum Outcome {
    Success,
    Failed { tool: String, exit_code: i32 },
    Cancelled { tool: String },
    Wait { tool: String, source: io::Error },
}

fn supervise(procs: &mut [Running<'_>], cancel: &AtomicBool) -> Outcome {
    loop {
        if cancel.load(Ordering::SeqCst) {
            let tool = procs.first().map(|p| p.tool.to_string()).unwrap_or_default();
            kill_all(procs);
            return Outcome::Cancelled { tool };
        }

        let mut all_done = true;
        for i in 0..procs.len() {
            if procs[i].status.is_some() {
                continue;
            }
            match procs[i].child.try_wait() {
                Ok(Some(status)) => {
                    procs[i].status = Some(status);
                    if !status.success() {
                        let tool = procs[i].tool.to_string();
                        kill_all(procs);
                        return Outcome::Failed {
                            tool,
                            exit_code: status.code().unwrap_or(-1),
                        };
                    }
                }
                Ok(None) => all_done = false,
                Err(source) => {
                    let tool = procs[i].tool.to_string();
                    kill_all(procs);
                    return Outcome::Wait { tool, source };
                }
            }
        }

        if all_done {
            return Outcome::Success;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn kill_all(procs: &mut [Running<'_>]) {
    for p in procs.iter_mut().filter(|p| p.status.is_none()) {
        kill(&mut p.child);
    }
}

fn finish(outcome: Outcome, logger: &JobLogger) -> Result<(), ToolError> {
    match outcome {
        Outcome::Success => Ok(()),
        Outcome::Failed { tool, exit_code } => {
            logger.error(&format!("{} exited with code {}", tool, exit_code));
            logger.show_tail(&tool);
            Err(ToolError::CommandFailed {
                tool,
                exit_code,
                tail: logger.get_tail(),
            })
        }
        Outcome::Cancelled { tool } => {
            logger.warn("Cancelled, child processes killed");
            Err(ToolError::Cancelled { tool })
        }
        Outcome::Wait { tool, source } => Err(ToolError::io(format!("waiting for {}", tool), source)),
    }
}
