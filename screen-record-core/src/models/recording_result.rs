use serde::{Deserialize, Serialize};

use super::config::{OutputFormat, OutputTarget, RecordingConfig, VideoSize};

/// Why the poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// The stop signal was raised.
    StopRequested,
    /// The configured time limit elapsed.
    TimeLimit,
    /// The encoder signalled end of stream.
    EndOfStream,
}

/// Result returned when a recording session completes successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub output: OutputTarget,
    pub duration_secs: f64,
    pub frame_count: u64,
    pub stop_reason: StopReason,
    /// SHA-256 of the finished output file. `None` for standard output.
    pub checksum: Option<String>,
    pub metadata: RecordingMetadata,
}

/// Description of a finished recording, exportable as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub output_format: OutputFormat,
    pub file_path: Option<String>,
    pub width: u32,
    pub height: u32,
    pub bit_rate: u32,
    pub frame_rate: f32,
    pub rotated: bool,
    #[serde(default)]
    pub monotonic_time: bool,
    pub frame_count: u64,
    pub duration_secs: f64,
    pub stop_reason: StopReason,
    pub checksum: Option<String>,
    pub has_frame_time_track: bool,
}

impl RecordingMetadata {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &RecordingConfig,
        size: VideoSize,
        frame_rate: f32,
        frame_count: u64,
        duration_secs: f64,
        stop_reason: StopReason,
        checksum: Option<String>,
        has_frame_time_track: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            output_format: config.output_format,
            file_path: config
                .output_target
                .path()
                .map(|p| p.to_string_lossy().into_owned()),
            width: size.width,
            height: size.height,
            bit_rate: config.bit_rate,
            frame_rate,
            rotated: config.rotate,
            monotonic_time: config.monotonic_time,
            frame_count,
            duration_secs,
            stop_reason,
            checksum,
            has_frame_time_track,
        }
    }
}
