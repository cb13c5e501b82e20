//! video-upscaler
//!
//! Queue HD episodes, upscale them chunk by chunk through VapourSynth and
//! ffmpeg, and inspect the scripts the worker would run.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use upscale_core::config::{ConfigManager, EnvOverrides};
use upscale_core::jobs::Priority;
use upscale_core::logging::{init_tracing, init_tracing_with_file, LogLevel};
use upscale_core::orchestrator::WorkerOptions;

#[derive(Parser, Debug)]
#[command(name = "video-upscaler", version)]
#[command(about = "Upscale 1080p video to 2160p with vs-mlrt, in resumable parts")]
struct Cli {
    /// Config file, created with defaults when missing
    #[arg(long, global = true, default_value = ".config/upscaler.toml")]
    config: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upscale one file now, without the queue
    Upscale { input: PathBuf, output: PathBuf },

    /// Add a file to the queue
    Add {
        #[arg(short, long, default_value = "default",
              help = "Queue priority: critical, default or low")]
        priority: Priority,

        /// Replace the job if it is already queued
        #[arg(short, long)]
        force: bool,

        input: PathBuf,

        /// Defaults to the input name with 1080p replaced by 2160p
        output: Option<PathBuf>,
    },

    /// Queue every HD episode under a marked directory that lacks a UHD version
    Scan { dir: PathBuf },

    /// Process queued jobs
    Worker {
        /// Keep running, checking the queue every N seconds
        #[arg(long, value_name = "SECS")]
        poll: Option<u64>,
    },

    /// Print the VapourSynth script for a frame range
    Script {
        input: PathBuf,
        #[arg(long)]
        from: u32,
        #[arg(long)]
        to: u32,
        /// Index cache file; defaults to `<input>.lwi`
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Probe the input and print the clip shape after every stage
    Plan {
        input: PathBuf,
        #[arg(long)]
        from: Option<u32>,
        #[arg(long)]
        to: Option<u32>,
        /// Scale factor of a custom model file
        #[arg(long, value_name = "K", value_parser = clap::value_parser!(u32).range(1..))]
        custom_scale: Option<u32>,
    },

    /// Render the script and report what VapourSynth says it outputs
    Info {
        input: PathBuf,
        #[arg(long)]
        from: Option<u32>,
        #[arg(long)]
        to: Option<u32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut manager = ConfigManager::new(&cli.config);
    manager
        .load_or_create()
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let settings = manager.settings().clone();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        settings
            .logging
            .level
            .parse::<LogLevel>()
            .map_err(anyhow::Error::msg)
            .context("invalid logging.level")?
    };

    let _guard = match init_tracing_with_file(level, manager.logs_folder()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            init_tracing(level);
            tracing::warn!("File logging disabled: {}", e);
            None
        }
    };

    let env = EnvOverrides::from_env().context("reading environment overrides")?;
    let mut options =
        WorkerOptions::from_settings(&settings, &env).context("invalid configuration")?;
    if cli.verbose {
        options.log_config.level = LogLevel::Debug;
    }

    match cli.command {
        Command::Upscale { input, output } => commands::upscale(&options, input, output),
        Command::Add {
            priority,
            force,
            input,
            output,
        } => commands::add(&manager, input, output, priority, force),
        Command::Scan { dir } => commands::scan(&manager, &dir),
        Command::Worker { poll } => commands::worker(&manager, options, poll),
        Command::Script {
            input,
            from,
            to,
            cache,
        } => commands::script(&options, input, from, to, cache),
        Command::Plan {
            input,
            from,
            to,
            custom_scale,
        } => commands::plan(&options, &input, from, to, custom_scale),
        Command::Info { input, from, to } => commands::info(&options, input, from, to),
    }
}
