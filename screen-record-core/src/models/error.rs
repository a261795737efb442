use thiserror::Error;

/// Errors that can end a recording session.
///
/// Every variant is fatal for the session. Conditions the pipeline absorbs on
/// its own (no output yet, output buffers changed, orientation change, time
/// limit reached) never surface as a `RecordError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Bit rate, geometry or time limit out of bounds. Raised before any
    /// resource is allocated.
    #[error("invalid configuration: {0}")]
    ConfigValidation(String),

    /// Codec creation, configuration, input surface acquisition or start failed.
    #[error("encoder init failed: {0}")]
    EncoderInit(String),

    /// Display lookup or virtual display / projection setup failed.
    #[error("capture setup failed: {0}")]
    CaptureSetup(String),

    /// Container rejected a track, a start, a sample or the final stop.
    #[error("muxer write failed: {0}")]
    MuxerWrite(String),

    /// The codec returned something other than data or a known control event.
    #[error("encoder poll failed: {0}")]
    Poll(String),

    /// Raw output or sidecar file I/O failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl RecordError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigValidation(_) => 2,
            Self::EncoderInit(_) => 3,
            Self::CaptureSetup(_) => 4,
            Self::MuxerWrite(_) => 5,
            Self::Poll(_) => 6,
            Self::Storage(_) => 7,
        }
    }
}
