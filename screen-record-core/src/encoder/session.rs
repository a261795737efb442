use std::time::Duration;

use crate::models::config::{RecordingConfig, VideoSize};
use crate::models::error::RecordError;
use crate::models::sample::{CodecFormat, EncodedSample, MIME_TYPE_AVC};
use crate::traits::video_encoder::{
    BufferInfo, DequeueStatus, EncoderParams, InputSurface, OutputBuffer, VideoEncoder,
};

/// Seconds between forced key frames.
pub const KEY_FRAME_INTERVAL_SECS: u32 = 10;
/// Size retried when the display-sized configuration is rejected (720p).
pub const FALLBACK_SIZE: VideoSize = VideoSize {
    width: 1280,
    height: 720,
};
/// Opaque surface colour format (`OMX_COLOR_FormatAndroidOpaque`).
pub const COLOR_FORMAT_SURFACE: i32 = 0x7F00_0789;
/// `AVCProfileMain`, requested together with B-frames.
pub const AVC_PROFILE_MAIN: i32 = 0x02;
/// `AVCLevel41`, requested together with B-frames.
pub const AVC_LEVEL_41: i32 = 0x800;

/// Encoder lifecycle.
///
/// ```text
/// unconfigured → configured → running → stopped
///       ↑______________ release() ________|
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderState {
    Unconfigured,
    Configured,
    Running,
    Stopped,
}

/// One step of the output poll.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// A filled output buffer. Release it with
    /// [`EncoderSession::release_output_buffer`] once consumed.
    Data(EncodedSample),
    /// Nothing ready within the timeout.
    Retry,
    /// The codec renegotiated its output; carries the config for the container.
    FormatChanged(CodecFormat),
    /// The output buffer table changed; call
    /// [`EncoderSession::refresh_output_buffers`].
    BuffersChanged,
    /// Unexpected codec status.
    Error(i32),
    /// The codec will produce no more output.
    EndOfStream,
}

/// Owns the video encoder and drives its asynchronous output.
pub struct EncoderSession<E: VideoEncoder> {
    encoder: E,
    state: EncoderState,
    buffers: Vec<OutputBuffer>,
    params: Option<EncoderParams>,
    input_surface: Option<InputSurface>,
}

impl<E: VideoEncoder> EncoderSession<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder,
            state: EncoderState::Unconfigured,
            buffers: Vec::new(),
            params: None,
            input_surface: None,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Parameters of the current configuration.
    pub fn params(&self) -> Option<&EncoderParams> {
        self.params.as_ref()
    }

    pub fn input_surface(&self) -> Option<&InputSurface> {
        self.input_surface.as_ref()
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Encoder parameters for `config` at `size`.
    pub fn build_params(config: &RecordingConfig, size: VideoSize, frame_rate: f32) -> EncoderParams {
        let (profile, level) = if config.max_b_frames > 0 {
            (Some(AVC_PROFILE_MAIN), Some(AVC_LEVEL_41))
        } else {
            (None, None)
        };
        EncoderParams {
            width: size.width,
            height: size.height,
            mime: MIME_TYPE_AVC.to_string(),
            color_format: COLOR_FORMAT_SURFACE,
            bit_rate: config.bit_rate,
            frame_rate,
            i_frame_interval_secs: KEY_FRAME_INTERVAL_SECS,
            max_b_frames: config.max_b_frames,
            profile,
            level,
            codec_name: config.codec_name.clone(),
        }
    }

    /// Configure and start the encoder, returning its input surface.
    ///
    /// On failure the codec is released and the session is back in
    /// `Unconfigured`, ready for another attempt.
    pub fn configure(
        &mut self,
        config: &RecordingConfig,
        size: VideoSize,
        frame_rate: f32,
    ) -> Result<InputSurface, RecordError> {
        if self.state != EncoderState::Unconfigured {
            return Err(RecordError::EncoderInit(format!(
                "cannot configure encoder in {:?} state",
                self.state
            )));
        }

        let params = Self::build_params(config, size, frame_rate);
        log::info!(
            "Configuring recorder for {} {} at {:.2}Mbps",
            size,
            params.mime,
            params.bit_rate as f64 / 1_000_000.0
        );

        match self.try_start(&params, config.persistent_surface) {
            Ok(surface) => {
                log::debug!("Codec prepared");
                self.params = Some(params);
                self.input_surface = Some(surface.clone());
                self.state = EncoderState::Running;
                Ok(surface)
            }
            Err(e) => {
                log::error!("Unable to start {} encoder at {}: {}", params.mime, size, e);
                self.encoder.release();
                self.buffers.clear();
                self.state = EncoderState::Unconfigured;
                Err(e)
            }
        }
    }

    /// [`configure`](Self::configure), retrying once at 720p when no size was
    /// requested. The fallback keeps the orientation of `size`; a second
    /// failure is returned as is.
    pub fn configure_with_fallback(
        &mut self,
        config: &RecordingConfig,
        size: VideoSize,
        frame_rate: f32,
    ) -> Result<(InputSurface, VideoSize), RecordError> {
        let err = match self.configure(config, size, frame_rate) {
            Ok(surface) => return Ok((surface, size)),
            Err(e) => e,
        };
        if config.size_specified() {
            return Err(err);
        }

        let fallback = if size.is_portrait() {
            FALLBACK_SIZE.swapped()
        } else {
            FALLBACK_SIZE
        };
        if size.width == fallback.width || size.height == fallback.height {
            return Err(err);
        }

        log::warn!("failed at {}, retrying at {}", size, fallback);
        let surface = self.configure(config, fallback, frame_rate)?;
        Ok((surface, fallback))
    }

    /// Re-read the codec's output buffer table.
    pub fn refresh_output_buffers(&mut self) -> Result<(), RecordError> {
        self.buffers = self.encoder.output_buffers()?;
        log::debug!("Encoder has {} output buffers", self.buffers.len());
        Ok(())
    }

    /// Wait up to `timeout` for the next output event.
    pub fn poll_output(&mut self, timeout: Duration) -> Result<OutputEvent, RecordError> {
        if self.state != EncoderState::Running {
            return Err(RecordError::Poll(format!(
                "cannot poll encoder in {:?} state",
                self.state
            )));
        }

        match self.encoder.dequeue_output_buffer(timeout) {
            DequeueStatus::Buffer(info) => {
                if info.size == 0 && info.flags.is_end_of_stream() {
                    self.release_output_buffer(info.index)?;
                    return Ok(OutputEvent::EndOfStream);
                }
                let payload = self.copy_payload(&info)?;
                Ok(OutputEvent::Data(EncodedSample {
                    buffer_index: info.index,
                    payload,
                    presentation_time_us: info.presentation_time_us,
                    flags: info.flags,
                }))
            }
            DequeueStatus::TryAgainLater => Ok(OutputEvent::Retry),
            DequeueStatus::OutputFormatChanged => {
                let format = self.encoder.output_format()?;
                Ok(OutputEvent::FormatChanged(format))
            }
            DequeueStatus::OutputBuffersChanged => Ok(OutputEvent::BuffersChanged),
            DequeueStatus::Error(code) => Ok(OutputEvent::Error(code)),
        }
    }

    pub fn release_output_buffer(&mut self, index: usize) -> Result<(), RecordError> {
        self.encoder
            .release_output_buffer(index)
            .map_err(|e| RecordError::Poll(format!("unable to release output buffer {}: {}", index, e)))
    }

    /// Stop a running encoder. No-op in any other state.
    pub fn stop(&mut self) -> Result<(), RecordError> {
        if self.state != EncoderState::Running {
            return Ok(());
        }
        self.state = EncoderState::Stopped;
        self.encoder.stop()
    }

    /// Free the codec. Valid from any state; repeated calls do nothing.
    pub fn release(&mut self) {
        if self.state == EncoderState::Unconfigured {
            return;
        }
        self.encoder.release();
        self.buffers.clear();
        self.input_surface = None;
        self.state = EncoderState::Unconfigured;
    }

    fn try_start(&mut self, params: &EncoderParams, persistent: bool) -> Result<InputSurface, RecordError> {
        self.encoder
            .configure(params)
            .map_err(|e| init_error("configure", e))?;
        self.state = EncoderState::Configured;

        let surface = self
            .encoder
            .create_input_surface(persistent)
            .map_err(|e| init_error(if persistent { "set input surface" } else { "create input surface" }, e))?;

        self.encoder.start().map_err(|e| init_error("start", e))?;
        self.refresh_output_buffers()
            .map_err(|e| init_error("get output buffers", e))?;
        Ok(surface)
    }

    fn copy_payload(&self, info: &BufferInfo) -> Result<Vec<u8>, RecordError> {
        let buffer = self.buffers.get(info.index).ok_or_else(|| {
            RecordError::Poll(format!(
                "output buffer index {} out of range ({} buffers)",
                info.index,
                self.buffers.len()
            ))
        })?;
        let data = buffer.lock();
        data.get(info.offset..info.offset + info.size)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                RecordError::Poll(format!(
                    "output buffer {} holds {} bytes, codec reported {}+{}",
                    info.index,
                    data.len(),
                    info.offset,
                    info.size
                ))
            })
    }
}

impl<E: VideoEncoder> Drop for EncoderSession<E> {
    fn drop(&mut self) {
        if self.state != EncoderState::Unconfigured {
            log::warn!("encoder dropped without release; releasing now");
            self.release();
        }
    }
}

fn init_error(stage: &str, e: RecordError) -> RecordError {
    match e {
        RecordError::EncoderInit(_) => e,
        other => RecordError::EncoderInit(format!("unable to {}: {}", stage, other)),
    }
}
