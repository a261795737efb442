use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::RecordError;

/// Lowest accepted encoder bit rate (0.1 Mbps).
pub const MIN_BIT_RATE: u32 = 100_000;
/// Highest accepted encoder bit rate (200 Mbps).
pub const MAX_BIT_RATE: u32 = 200 * 1_000_000;
/// Longest recording a session will run for, in seconds.
pub const MAX_TIME_LIMIT_SECS: u32 = 180;
/// Default encoder bit rate (20 Mbps).
pub const DEFAULT_BIT_RATE: u32 = 20_000_000;

/// Output serialization for encoded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Mp4,
    Webm,
    #[serde(rename = "3gpp")]
    ThreeGpp,
    RawH264,
    RawFrames,
}

/// Container flavours handed to the platform muxer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    Mpeg4,
    Webm,
    ThreeGpp,
}

impl OutputFormat {
    pub fn is_container(&self) -> bool {
        self.container_format().is_some()
    }

    pub fn container_format(&self) -> Option<ContainerFormat> {
        match self {
            Self::Mp4 => Some(ContainerFormat::Mpeg4),
            Self::Webm => Some(ContainerFormat::Webm),
            Self::ThreeGpp => Some(ContainerFormat::ThreeGpp),
            Self::RawH264 | Self::RawFrames => None,
        }
    }

    /// Only mp4 carries the frame-time metadata track.
    pub fn has_metadata_track(&self) -> bool {
        matches!(self, Self::Mp4)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::ThreeGpp => "3gpp",
            Self::RawH264 => "h264",
            Self::RawFrames => "raw-frames",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp4" => Ok(Self::Mp4),
            "webm" => Ok(Self::Webm),
            "3gpp" => Ok(Self::ThreeGpp),
            "h264" => Ok(Self::RawH264),
            "frames" | "raw-frames" => Ok(Self::RawFrames),
            other => Err(RecordError::ConfigValidation(format!(
                "unknown output format: {}",
                other
            ))),
        }
    }
}

/// Where the encoded output goes. `"-"` selects standard output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputTarget {
    File(PathBuf),
    Stdout,
}

impl OutputTarget {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Stdout => None,
        }
    }
}

impl From<&str> for OutputTarget {
    fn from(s: &str) -> Self {
        if s == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(s))
        }
    }
}

impl From<String> for OutputTarget {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<OutputTarget> for String {
    fn from(target: OutputTarget) -> Self {
        match target {
            OutputTarget::File(path) => path.to_string_lossy().into_owned(),
            OutputTarget::Stdout => "-".to_string(),
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Stdout => f.write_str("<stdout>"),
        }
    }
}

/// Encoded video dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size with both axes rounded down to the nearest even value.
    /// Encoders reject odd dimensions.
    pub fn floor_to_even(width: u32, height: u32) -> Self {
        Self {
            width: width & !1,
            height: height & !1,
        }
    }

    pub fn swapped(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn is_portrait(&self) -> bool {
        self.width < self.height
    }
}

impl fmt::Display for VideoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-session recording parameters.
///
/// Validated once when the session starts and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Requested video size. `None` uses the display size and allows the
    /// 1280x720 fallback if the encoder rejects it.
    pub video_size: Option<VideoSize>,

    /// Encoder bit rate in bits per second.
    pub bit_rate: u32,

    /// Frame rate hint for the encoder. `None` uses the display refresh rate.
    pub frame_rate: Option<f32>,

    /// Maximum number of B-frames the encoder may emit.
    pub max_b_frames: u32,

    /// Recording stops gracefully once this many seconds have elapsed.
    pub time_limit_secs: u32,

    /// Record in landscape orientation and tag the file with a 90 degree hint.
    pub rotate: bool,

    /// Frame info is stamped with monotonic time. Carried into the sidecar.
    pub monotonic_time: bool,

    /// Bind the capture to a persistent input surface instead of one created
    /// by the codec.
    pub persistent_surface: bool,

    /// Encoder component name override.
    pub codec_name: Option<String>,

    pub output_format: OutputFormat,

    pub output_target: OutputTarget,

    /// Write `<output>.metadata.json` next to a file recording.
    pub write_metadata_sidecar: bool,
}

impl RecordingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.bit_rate < MIN_BIT_RATE || self.bit_rate > MAX_BIT_RATE {
            return Err(format!(
                "bit rate {}bps outside acceptable range [{},{}]",
                self.bit_rate, MIN_BIT_RATE, MAX_BIT_RATE
            ));
        }
        if self.time_limit_secs == 0 || self.time_limit_secs > MAX_TIME_LIMIT_SECS {
            return Err(format!(
                "time limit {}s outside acceptable range [1,{}]",
                self.time_limit_secs, MAX_TIME_LIMIT_SECS
            ));
        }
        if let Some(size) = self.video_size {
            if size.width == 0 || size.height == 0 {
                return Err(format!("invalid video size: {}", size));
            }
            if size.width % 2 != 0 || size.height % 2 != 0 {
                return Err(format!("video size must be even: {}", size));
            }
        }
        if let Some(fps) = self.frame_rate {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(format!("invalid frame rate: {}", fps));
            }
        }
        if self.output_format.is_container() && self.output_target == OutputTarget::Stdout {
            return Err(format!(
                "{} output needs a file, not standard output",
                self.output_format
            ));
        }
        Ok(())
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json)
            .map_err(|e| RecordError::ConfigValidation(format!("failed to parse config: {}", e)))
    }

    pub fn size_specified(&self) -> bool {
        self.video_size.is_some()
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            video_size: None,
            bit_rate: DEFAULT_BIT_RATE,
            frame_rate: None,
            max_b_frames: 0,
            time_limit_secs: MAX_TIME_LIMIT_SECS,
            rotate: false,
            monotonic_time: false,
            persistent_surface: false,
            codec_name: None,
            output_format: OutputFormat::Mp4,
            output_target: OutputTarget::File(PathBuf::from("screenrecord.mp4")),
            write_metadata_sidecar: false,
        }
    }
}

/// Parse a bare number (`"4000000"`) or a number with an `M` suffix (`"4m"`).
pub fn parse_value_with_unit(s: &str) -> Result<u32, RecordError> {
    let invalid = || RecordError::ConfigValidation(format!("unrecognized value: {}", s));

    let (digits, multiplier) = match s.char_indices().last() {
        Some((idx, c)) if c.eq_ignore_ascii_case(&'m') => (&s[..idx], 1_000_000u64),
        _ => (s, 1u64),
    };
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    value
        .checked_mul(multiplier)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(invalid)
}
