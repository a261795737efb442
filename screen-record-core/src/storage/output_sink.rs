use std::path::Path;

use crate::models::error::RecordError;
use crate::models::sample::{CodecFormat, EncodedSample};
use crate::processing::metadata_track::TimestampLog;

/// Destination for encoded output, chosen once per session.
///
/// Implemented by [`ContainerSink`](super::container_sink::ContainerSink)
/// (mp4/webm/3gpp through a platform muxer) and
/// [`RawSink`](super::raw_sink::RawSink) (elementary stream bytes).
pub trait OutputSink: Send {
    /// The encoder renegotiated its output format.
    fn on_format_changed(&mut self, format: &CodecFormat) -> Result<(), RecordError>;

    fn write_sample(&mut self, sample: &EncodedSample) -> Result<(), RecordError>;

    /// Whether codec-config buffers (SPS/PPS) should be written as samples.
    /// Containers take them from the output format instead.
    fn forwards_codec_config(&self) -> bool;

    /// Whether the loop should keep a [`TimestampLog`] for this sink.
    fn records_timestamps(&self) -> bool {
        false
    }

    /// Write the frame-time record once the loop has exited, consuming the log.
    fn write_timestamp_metadata(
        &mut self,
        _timestamps: TimestampLog,
        _realtime_offset_us: i64,
    ) -> Result<(), RecordError> {
        Ok(())
    }

    /// Finalize the output. Further writes fail.
    fn close(&mut self) -> Result<(), RecordError>;

    /// File being written, if any.
    fn output_path(&self) -> Option<&Path>;
}
