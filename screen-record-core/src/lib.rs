//! # screen-record-core
//!
//! Platform-agnostic screen recording core library.
//!
//! Mirrors a display into a hardware video encoder through a virtual
//! display, polls the encoder's output and writes it either into a container
//! (mp4/webm/3gpp, with an auxiliary frame-time track for mp4) or as a raw
//! elementary stream. Platform backends (a MediaCodec wrapper, a compositor
//! binding, a MediaMuxer wrapper) implement the traits in [`traits`] and plug
//! into the generic [`SessionController`].
//!
//! ## Architecture
//!
//! ```text
//! screen-record-core (this crate)
//! ├── traits/       ← VideoEncoder, MediaMuxer, CaptureSurfaceProvider, DisplaySource, Clock, SessionDelegate
//! ├── models/       ← RecordError, RecordingConfig, SessionState, DisplayGeometry, EncodedSample, etc.
//! ├── processing/   ← projection math, frame-time metadata record
//! ├── encoder/      ← EncoderSession (configure, fallback, output polling)
//! ├── session/      ← SessionController (recording loop), CaptureSource, StopSignal
//! └── storage/      ← ContainerSink, RawSink, metadata sidecar
//! ```

pub mod encoder;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use encoder::session::{EncoderSession, OutputEvent};
pub use models::config::{parse_value_with_unit, OutputFormat, OutputTarget, RecordingConfig, VideoSize};
pub use models::display::{DisplayGeometry, ProjectionRect, Rect, Rotation};
pub use models::error::RecordError;
pub use models::recording_result::{RecordingMetadata, RecordingResult, StopReason};
pub use models::sample::{CodecFormat, EncodedSample, SampleFlags};
pub use models::state::SessionState;
pub use processing::metadata_track::TimestampLog;
pub use processing::projection::compute_projection;
pub use session::controller::SessionController;
pub use session::stop_signal::StopSignal;
pub use storage::container_sink::ContainerSink;
pub use storage::output_sink::OutputSink;
pub use storage::raw_sink::{ByteSinkCallback, RawSink};
pub use traits::capture_surface::{CaptureHandle, CaptureSurfaceProvider};
pub use traits::clock::{Clock, SystemClock};
pub use traits::display_source::DisplaySource;
pub use traits::media_muxer::{MediaMuxer, MuxerFactory, SampleInfo};
pub use traits::session_delegate::SessionDelegate;
pub use traits::video_encoder::{EncoderParams, InputSurface, VideoEncoder};
