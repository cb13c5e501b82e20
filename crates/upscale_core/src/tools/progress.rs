//! Parsing of ffmpeg `-progress` output.
//!
//! ffmpeg writes blocks of `key=value` lines, each block ending with
//! `progress=continue` or `progress=end`.

use std::fmt;

use parking_lot::Mutex;

/// Latest values reported by ffmpeg.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub frame: u64,
    /// Encode speed in frames per second, as printed by ffmpeg.
    pub fps: String,
    pub bitrate_kbps: Option<f64>,
    /// Realtime multiplier, e.g. `0.394`.
    pub speed: Option<f64>,
    /// Output position, `HH:MM:SS.micros`.
    pub out_time: String,
    /// Encoder quantizer of the first output stream.
    pub quality: Option<f64>,
    pub finished: bool,
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Current FPS: {}, Time: {}", self.fps, self.out_time)
    }
}

/// Accumulates progress lines into a shared snapshot.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    total_frames: Option<u64>,
    current: Mutex<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new(total_frames: Option<u64>) -> Self {
        Self {
            total_frames,
            current: Mutex::new(ProgressSnapshot::default()),
        }
    }

    /// Apply one line. Returns `true` when the line closes a block.
    pub fn apply_line(&self, line: &str) -> bool {
        let Some((key, value)) = line.trim().split_once('=') else {
            return false;
        };
        let value = value.trim();
        let mut snap = self.current.lock();

        match key {
            "frame" => {
                if let Ok(n) = value.parse() {
                    snap.frame = n;
                }
            }
            "fps" => snap.fps = value.to_string(),
            "bitrate" => snap.bitrate_kbps = value.trim_end_matches("kbits/s").trim().parse().ok(),
            "speed" => snap.speed = value.trim_end_matches('x').trim().parse().ok(),
            "out_time" => snap.out_time = value.to_string(),
            "progress" => {
                snap.finished = value == "end";
                return true;
            }
            k if is_quality_key(k) => {
                if snap.quality.is_none() || k == "stream_0_0_q" {
                    snap.quality = value.parse().ok();
                }
            }
            _ => {}
        }
        false
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.current.lock().clone()
    }

    /// Percentage of `total_frames` encoded, if the total is known.
    pub fn percent(&self) -> Option<u32> {
        let total = self.total_frames.filter(|t| *t > 0)?;
        let frame = self.current.lock().frame.min(total);
        Some((frame * 100 / total) as u32)
    }
}

/// `stream_<file>_<stream>_q`
fn is_quality_key(key: &str) -> bool {
    key.strip_prefix("stream_")
        .and_then(|rest| rest.strip_suffix("_q"))
        .is_some_and(|ids| {
            let mut parts = ids.split('_');
            let ok = |p: Option<&str>| p.is_some_and(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()));
            ok(parts.next()) && ok(parts.next()) && parts.next().is_none()
        })
}
