use std::path::Path;

use crate::models::config::ContainerFormat;
use crate::models::error::RecordError;
use crate::models::sample::{CodecFormat, SampleFlags};

/// Timing and flags for one sample written to a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    pub presentation_time_us: i64,
    pub flags: SampleFlags,
}

/// Interface for a platform container writer (MediaMuxer-like).
///
/// The core guarantees call order: tracks and orientation hint first, then
/// `start`, then samples, then exactly one `stop`.
pub trait MediaMuxer: Send {
    /// Add a track and return its index.
    fn add_track(&mut self, format: &CodecFormat) -> Result<usize, RecordError>;

    /// File-level rotation hint in degrees.
    fn set_orientation_hint(&mut self, degrees: u32) -> Result<(), RecordError>;

    fn start(&mut self) -> Result<(), RecordError>;

    fn write_sample_data(
        &mut self,
        track_index: usize,
        data: &[u8],
        info: &SampleInfo,
    ) -> Result<(), RecordError>;

    /// Flush and finalize the container.
    fn stop(&mut self) -> Result<(), RecordError>;
}

/// Creates a muxer for an output file.
pub trait MuxerFactory: Send {
    fn create_muxer(
        &self,
        path: &Path,
        format: ContainerFormat,
    ) -> Result<Box<dyn MediaMuxer>, RecordError>;
}
