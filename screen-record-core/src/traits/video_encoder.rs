use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::RecordError;
use crate::models::sample::{CodecFormat, SampleFlags};

/// One slot of the codec's output buffer table.
///
/// Shared with the codec runtime, which fills it before handing out its index
/// from [`VideoEncoder::dequeue_output_buffer`].
pub type OutputBuffer = Arc<Mutex<Vec<u8>>>;

/// Surface the encoder consumes frames from. Opaque to the core; the capture
/// provider knows how to bind a virtual display to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputSurface {
    pub id: u64,
    pub persistent: bool,
}

/// Parameters used to configure the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderParams {
    pub width: u32,
    pub height: u32,
    pub mime: String,
    pub color_format: i32,
    pub bit_rate: u32,
    pub frame_rate: f32,
    pub i_frame_interval_secs: u32,
    pub max_b_frames: u32,
    /// Profile/level hints, only set when B-frames are enabled.
    pub profile: Option<i32>,
    pub level: Option<i32>,
    /// Component name override; `None` picks an encoder by MIME type.
    pub codec_name: Option<String>,
}

/// Metadata for a filled output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub index: usize,
    pub offset: usize,
    pub size: usize,
    pub presentation_time_us: i64,
    pub flags: SampleFlags,
}

/// Raw result of a single dequeue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueStatus {
    Buffer(BufferInfo),
    TryAgainLater,
    OutputFormatChanged,
    OutputBuffersChanged,
    /// Any other codec status code.
    Error(i32),
}

/// Interface for a platform video encoder driven through surface input and
/// polled output.
///
/// Implemented by platform backends (e.g. a MediaCodec wrapper). Frames enter
/// through the input surface on the codec's own schedule; the core only
/// dequeues finished output.
pub trait VideoEncoder: Send {
    /// Create the codec instance and apply `params`.
    fn configure(&mut self, params: &EncoderParams) -> Result<(), RecordError>;

    /// Obtain the surface frames will be rendered into. With `persistent`,
    /// a persistent surface is created and attached instead of asking the
    /// codec for one.
    fn create_input_surface(&mut self, persistent: bool) -> Result<InputSurface, RecordError>;

    fn start(&mut self) -> Result<(), RecordError>;

    /// Wait up to `timeout` for the next output event.
    fn dequeue_output_buffer(&mut self, timeout: Duration) -> DequeueStatus;

    /// Current output buffer table, indexed by [`BufferInfo::index`].
    fn output_buffers(&mut self) -> Result<Vec<OutputBuffer>, RecordError>;

    /// Output format after an [`DequeueStatus::OutputFormatChanged`].
    fn output_format(&mut self) -> Result<CodecFormat, RecordError>;

    /// Hand a dequeued buffer back to the codec.
    fn release_output_buffer(&mut self, index: usize) -> Result<(), RecordError>;

    fn stop(&mut self) -> Result<(), RecordError>;

    /// Free the codec. A later [`configure`](Self::configure) creates a fresh
    /// instance.
    fn release(&mut self);
}
