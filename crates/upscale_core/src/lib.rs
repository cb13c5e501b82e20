//! upscale_core - library behind the `video-upscaler` binary.
//!
//! Builds VapourSynth upscale/interpolation scripts, estimates their output
//! shape, and runs the chunked `vspipe | ffmpeg` worker over a persistent
//! job queue. No UI dependencies; the CLI is a thin layer on top.

pub mod config;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod tools;
#[cfg(feature = "vapoursynth")]
pub mod vs;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
