//! Frame-time metadata track encoding.
//!
//! The mp4 output carries an extra `application/octet-stream` track holding a
//! single sample: the presentation time of every recorded frame, rebased from
//! the monotonic clock onto elapsed realtime, so trace viewers (Winscope) can
//! line the video up with compositor and window-manager traces.
//!
//! Layout (all integers little-endian):
//! ```text
//! [0-15]          "#VV1NSC0PET1ME!#"   magic, no terminator
//! [16-19]         frame count          u32
//! [20 + 8*i ..]   frame i time (µs)    u64
//! ```

use crate::models::error::RecordError;
use crate::traits::clock::Clock;

/// Tag at the start of every frame-time record.
pub const FRAME_TIME_MAGIC: &[u8] = b"#VV1NSC0PET1ME!#";

const COUNT_SIZE: usize = std::mem::size_of::<u32>();
const TIMESTAMP_SIZE: usize = std::mem::size_of::<u64>();

/// Presentation timestamps of the frames written so far, in order.
///
/// Append-only during the session and consumed once at teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampLog {
    timestamps: Vec<i64>,
}

impl TimestampLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, presentation_time_us: i64) {
        self.timestamps.push(presentation_time_us);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Timestamp of the first recorded frame; the record is written at this pts.
    pub fn first(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    /// Encode the record, consuming the log.
    pub fn into_record(self, realtime_offset_us: i64) -> Vec<u8> {
        encode_frame_times(&self.timestamps, realtime_offset_us)
    }
}

/// Offset from the monotonic clock to elapsed realtime, in microseconds.
pub fn realtime_offset_us(clock: &dyn Clock) -> i64 {
    (clock.elapsed_realtime_nanos() - clock.monotonic_nanos()) / 1000
}

/// Build a frame-time record. Each timestamp is shifted by `realtime_offset_us`.
pub fn encode_frame_times(timestamps: &[i64], realtime_offset_us: i64) -> Vec<u8> {
    let mut record =
        Vec::with_capacity(FRAME_TIME_MAGIC.len() + COUNT_SIZE + timestamps.len() * TIMESTAMP_SIZE);
    record.extend_from_slice(FRAME_TIME_MAGIC);
    record.extend_from_slice(&(timestamps.len() as u32).to_le_bytes());
    for &pts in timestamps {
        record.extend_from_slice(&((pts + realtime_offset_us) as u64).to_le_bytes());
    }
    record
}

/// Parse a frame-time record back into its timestamps.
pub fn decode_frame_times(record: &[u8]) -> Result<Vec<u64>, RecordError> {
    let malformed = |what: &str| RecordError::Storage(format!("malformed frame-time record: {}", what));

    let body = record
        .strip_prefix(FRAME_TIME_MAGIC)
        .ok_or_else(|| malformed("missing magic"))?;
    if body.len() < COUNT_SIZE {
        return Err(malformed("truncated frame count"));
    }
    let (count_bytes, times) = body.split_at(COUNT_SIZE);
    let mut count = [0u8; COUNT_SIZE];
    count.copy_from_slice(count_bytes);
    let count = u32::from_le_bytes(count) as usize;

    if times.len() != count * TIMESTAMP_SIZE {
        return Err(malformed(&format!(
            "expected {} timestamps, found {} bytes",
            count,
            times.len()
        )));
    }

    Ok(times
        .chunks_exact(TIMESTAMP_SIZE)
        .map(|chunk| {
            let mut value = [0u8; TIMESTAMP_SIZE];
            value.copy_from_slice(chunk);
            u64::from_le_bytes(value)
        })
        .collect())
}
