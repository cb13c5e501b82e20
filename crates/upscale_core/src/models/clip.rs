//! Clip metadata: resolution, frame rate, pixel format and frame ranges.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from building clip metadata values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClipError {
    #[error("Invalid frame range [{from}, {to}): start must be before end")]
    EmptyRange { from: u32, to: u32 },

    #[error("Frame range [{from}, {to}) exceeds clip length {len}")]
    OutOfBounds { from: u32, to: u32, len: u32 },

    #[error("Invalid frame rate '{0}'")]
    InvalidFrameRate(String),

    #[error("Unsupported pixel format '{0}'")]
    UnsupportedFormat(String),
}

/// Spatial size of a clip in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Rational frame rate, e.g. 24000/1001.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u64,
    pub den: u64,
}

impl FrameRate {
    pub const fn new(num: u64, den: u64) -> Self {
        Self { num, den }
    }

    /// Parse `"24000/1001"` or a plain integer such as `"25"`.
    pub fn parse(rate: &str) -> Result<Self, ClipError> {
        let rate = rate.trim();
        let invalid = || ClipError::InvalidFrameRate(rate.to_string());

        let (num, den) = match rate.split_once('/') {
            Some((n, d)) => (
                n.trim().parse::<u64>().map_err(|_| invalid())?,
                d.trim().parse::<u64>().map_err(|_| invalid())?,
            ),
            None => (rate.parse::<u64>().map_err(|_| invalid())?, 1),
        };

        if num == 0 || den == 0 {
            return Err(invalid());
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Rate after inserting frames so that there are `factor` outputs per input.
    pub fn multiplied(&self, factor: u64) -> Self {
        Self {
            num: self.num * factor,
            den: self.den,
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Pixel formats the pipeline moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit 4:2:0, the usual delivery format of HD sources.
    #[default]
    Yuv420P8,
    /// 10-bit 4:2:0, the encoder input format.
    Yuv420P10,
    /// Half-float planar RGB, the inference input format.
    RgbH,
    /// Single-float planar RGB.
    RgbS,
    /// 8-bit planar RGB.
    Rgb24,
}

impl PixelFormat {
    /// VapourSynth preset constant for this format.
    pub fn vs_constant(&self) -> &'static str {
        match self {
            PixelFormat::Yuv420P8 => "vs.YUV420P8",
            PixelFormat::Yuv420P10 => "vs.YUV420P10",
            PixelFormat::RgbH => "vs.RGBH",
            PixelFormat::RgbS => "vs.RGBS",
            PixelFormat::Rgb24 => "vs.RGB24",
        }
    }

    /// Whether this is an RGB family format.
    pub fn is_rgb(&self) -> bool {
        matches!(self, PixelFormat::RgbH | PixelFormat::RgbS | PixelFormat::Rgb24)
    }

    /// Parse an ffprobe `pix_fmt` or a VapourSynth format name.
    pub fn parse(name: &str) -> Result<Self, ClipError> {
        match name.trim() {
            "yuv420p" | "YUV420P8" => Ok(PixelFormat::Yuv420P8),
            "yuv420p10le" | "yuv420p10be" | "YUV420P10" => Ok(PixelFormat::Yuv420P10),
            "RGBH" => Ok(PixelFormat::RgbH),
            "RGBS" => Ok(PixelFormat::RgbS),
            "gbrp" | "RGB24" => Ok(PixelFormat::Rgb24),
            other => Err(ClipError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.vs_constant().trim_start_matches("vs.");
        write!(f, "{}", name)
    }
}

/// Half-open frame interval `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFrameRange")]
pub struct FrameRange {
    from: u32,
    to: u32,
}

#[derive(Deserialize)]
struct RawFrameRange {
    from: u32,
    to: u32,
}

impl TryFrom<RawFrameRange> for FrameRange {
    type Error = ClipError;

    fn try_from(raw: RawFrameRange) -> Result<Self, Self::Error> {
        Self::new(raw.from, raw.to)
    }
}

impl FrameRange {
    /// Create a range; `from` must be strictly less than `to`.
    pub fn new(from: u32, to: u32) -> Result<Self, ClipError> {
        if from >= to {
            return Err(ClipError::EmptyRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// Range covering a whole clip of `len` frames.
    pub fn whole(len: u32) -> Result<Self, ClipError> {
        Self::new(0, len)
    }

    pub fn from(&self) -> u32 {
        self.from
    }

    pub fn to(&self) -> u32 {
        self.to
    }

    pub fn len(&self) -> u32 {
        self.to - self.from
    }

    /// Ranges are never empty; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Check the range lies inside a clip of `len` frames.
    pub fn check_within(&self, len: u32) -> Result<(), ClipError> {
        if self.to > len {
            return Err(ClipError::OutOfBounds {
                from: self.from,
                to: self.to,
                len,
            });
        }
        Ok(())
    }

    /// Source frame indices covered by the range, in order.
    pub fn indices(&self) -> Range<u32> {
        self.from..self.to
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

/// Shape of a clip as seen between pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipInfo {
    pub resolution: Resolution,
    pub format: PixelFormat,
    pub fps: FrameRate,
    pub num_frames: u32,
}

impl ClipInfo {
    /// Clip holding only the frames in `range`; everything else is unchanged.
    pub fn trim(&self, range: FrameRange) -> Result<Self, ClipError> {
        range.check_within(self.num_frames)?;
        Ok(Self {
            num_frames: range.len(),
            ..*self
        })
    }

    /// Duration in seconds at the clip's frame rate.
    pub fn duration_secs(&self) -> f64 {
        self.num_frames as f64 / self.fps.as_f64()
    }
}

impl fmt::Display for ClipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {:.3} fps, {} frames",
            self.resolution,
            self.format,
            self.fps.as_f64(),
            self.num_frames
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hd_clip(frames: u32) -> ClipInfo {
        ClipInfo {
            resolution: Resolution::new(1920, 1080),
            format: PixelFormat::Yuv420P8,
            fps: FrameRate::new(24000, 1001),
            num_frames: frames,
        }
    }

    #[test]
    fn range_rejects_empty_and_reversed() {
        assert_eq!(
            FrameRange::new(5, 5),
            Err(ClipError::EmptyRange { from: 5, to: 5 })
        );
        assert!(FrameRange::new(10, 3).is_err());
        assert!(FrameRange::new(0, 1).is_ok());
    }

    #[test]
    fn deserializing_a_range_keeps_it_non_empty() {
        let range: FrameRange = serde_json::from_str(r#"{"from":3,"to":5}"#).unwrap();
        assert_eq!(range.len(), 2);

        let err = serde_json::from_str::<FrameRange>(r#"{"from":5,"to":3}"#).unwrap_err();
        assert!(err.to_string().contains("5"), "{err}");
        assert!(serde_json::from_str::<FrameRange>(r#"{"from":4,"to":4}"#).is_err());
    }

    #[test]
    fn range_checks_clip_length() {
        let range = FrameRange::new(100, 200).unwrap();
        assert!(range.check_within(200).is_ok());
        assert!(matches!(
            range.check_within(199),
            Err(ClipError::OutOfBounds { len: 199, .. })
        ));
    }

    #[test]
    fn trim_keeps_exact_frame_count() {
        let clip = hd_clip(7200);
        for (from, to) in [(0, 1), (0, 7200), (3, 17), (7199, 7200), (1000, 4321)] {
            let range = FrameRange::new(from, to).unwrap();
            let trimmed = clip.trim(range).unwrap();
            assert_eq!(trimmed.num_frames, to - from);
            assert_eq!(trimmed.resolution, clip.resolution);
            assert_eq!(trimmed.fps, clip.fps);
        }
    }

    #[test]
    fn trim_rejects_range_past_end() {
        let clip = hd_clip(100);
        let range = FrameRange::new(50, 101).unwrap();
        assert!(clip.trim(range).is_err());
    }

    #[test]
    fn range_indices_are_in_source_order() {
        let range = FrameRange::new(4, 9).unwrap();
        let frames: Vec<u32> = range.indices().collect();
        assert_eq!(frames, vec![4, 5, 6, 7, 8]);
        assert_eq!(frames.len() as u32, range.len());
    }

    #[test]
    fn frame_rate_parses_rational_and_integer() {
        assert_eq!(FrameRate::parse("24000/1001").unwrap(), FrameRate::new(24000, 1001));
        assert_eq!(FrameRate::parse("25").unwrap(), FrameRate::new(25, 1));
        assert!(FrameRate::parse("0/0").is_err());
        assert!(FrameRate::parse("abc").is_err());
    }

    #[test]
    fn frame_rate_multiplies_numerator() {
        let rate = FrameRate::new(24000, 1001).multiplied(2);
        assert_eq!(rate, FrameRate::new(48000, 1001));
        assert!((rate.as_f64() - 47.952).abs() < 0.001);
    }

    #[test]
    fn pixel_format_round_trips_names() {
        assert_eq!(PixelFormat::parse("yuv420p10le").unwrap(), PixelFormat::Yuv420P10);
        assert_eq!(PixelFormat::parse("RGBH").unwrap(), PixelFormat::RgbH);
        assert_eq!(PixelFormat::RgbH.vs_constant(), "vs.RGBH");
        assert_eq!(PixelFormat::Yuv420P10.to_string(), "YUV420P10");
        assert!(PixelFormat::parse("nv12").is_err());
        assert!(PixelFormat::RgbH.is_rgb());
    }
}
