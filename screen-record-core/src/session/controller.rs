use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crate::encoder::session::{EncoderSession, OutputEvent};
use crate::models::config::{RecordingConfig, VideoSize};
use crate::models::error::RecordError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult, StopReason};
use crate::models::sample::EncodedSample;
use crate::models::state::SessionState;
use crate::processing::metadata_track::{realtime_offset_us, TimestampLog};
use crate::session::capture_source::CaptureSource;
use crate::session::stop_signal::StopSignal;
use crate::storage::container_sink::ContainerSink;
use crate::storage::metadata::{file_checksum, write_metadata};
use crate::storage::output_sink::OutputSink;
use crate::storage::raw_sink::{ByteSinkCallback, RawSink};
use crate::traits::capture_surface::CaptureSurfaceProvider;
use crate::traits::clock::{Clock, SystemClock};
use crate::traits::display_source::DisplaySource;
use crate::traits::media_muxer::MuxerFactory;
use crate::traits::session_delegate::SessionDelegate;
use crate::traits::video_encoder::VideoEncoder;

/// Longest a single output poll may block.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(250);

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// What the poll loop accumulated.
#[derive(Debug, Default)]
struct LoopStats {
    frames: u64,
    timestamps: TimestampLog,
}

/// Single-use recording session.
///
/// Owns every handle for the duration of one recording and drives the
/// encoder output loop on the calling thread:
/// ```text
/// [DisplaySource] ─geometry─→ [CaptureSource] ─frames─→ [EncoderSession]
///                                                            │ poll
///                                                            ▼
///                                     [ContainerSink | RawSink] → file / stdout
/// ```
pub struct SessionController<E: VideoEncoder, C: CaptureSurfaceProvider, D: DisplaySource> {
    config: RecordingConfig,
    encoder: EncoderSession<E>,
    capture: CaptureSource<C>,
    display: D,
    muxer_factory: Option<Box<dyn MuxerFactory>>,
    byte_sink: Option<RawSink>,
    clock: Arc<dyn Clock>,
    delegate: Option<Arc<dyn SessionDelegate>>,
    state: SessionState,
    has_run: bool,
}

impl<E: VideoEncoder, C: CaptureSurfaceProvider, D: DisplaySource> SessionController<E, C, D> {
    pub fn new(config: RecordingConfig, encoder: E, capture: C, display: D) -> Self {
        Self {
            config,
            encoder: EncoderSession::new(encoder),
            capture: CaptureSource::new(capture),
            display,
            muxer_factory: None,
            byte_sink: None,
            clock: Arc::new(SystemClock),
            delegate: None,
            state: SessionState::Configuring,
            has_run: false,
        }
    }

    /// Muxer backend used for container formats.
    pub fn with_muxer_factory(mut self, factory: impl MuxerFactory + 'static) -> Self {
        self.muxer_factory = Some(Box::new(factory));
        self
    }

    /// Send raw output to `writer` instead of the configured target.
    pub fn with_byte_sink(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.byte_sink = Some(RawSink::new(writer));
        self
    }

    /// Deliver raw output payloads to `callback` instead of the configured target.
    pub fn with_byte_callback(mut self, callback: ByteSinkCallback) -> Self {
        self.byte_sink = Some(RawSink::from_callback(callback));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SessionDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Record until `stop` is raised, the time limit passes or the encoder
    /// ends the stream. Resources are torn down before this returns, on
    /// success and failure alike.
    pub fn run(&mut self, stop: &StopSignal) -> Result<RecordingResult, RecordError> {
        if self.has_run {
            return Err(RecordError::ConfigValidation("session has already run".into()));
        }
        self.has_run = true;
        self.set_state(SessionState::Configuring);

        let outcome = self.record(stop);
        self.set_state(SessionState::Stopped);

        match &outcome {
            Ok(result) => {
                if let Some(ref delegate) = self.delegate {
                    delegate.on_recording_finished(result);
                }
            }
            Err(e) => {
                log::error!("recording failed: {}", e);
                if let Some(ref delegate) = self.delegate {
                    delegate.on_error(e);
                }
            }
        }
        outcome
    }

    fn record(&mut self, stop: &StopSignal) -> Result<RecordingResult, RecordError> {
        self.config.validate().map_err(RecordError::ConfigValidation)?;

        let geometry = self
            .display
            .display_geometry()
            .map_err(|e| RecordError::CaptureSetup(format!("unable to get display state: {}", e)))?;
        let frame_rate = match self.config.frame_rate {
            Some(fps) => fps,
            None => self
                .display
                .refresh_rate()
                .map_err(|e| RecordError::CaptureSetup(format!("unable to get display mode: {}", e)))?,
        };
        log::info!(
            "Display is {}x{} @{:.2}fps (orientation={}), layerStack={}",
            geometry.width,
            geometry.height,
            frame_rate,
            geometry.orientation,
            geometry.layer_stack
        );

        let requested = self
            .config
            .video_size
            .unwrap_or_else(|| VideoSize::floor_to_even(geometry.width, geometry.height));
        let (surface, size) = self
            .encoder
            .configure_with_fallback(&self.config, requested, frame_rate)?;

        if let Err(e) = self.capture.start(&surface, geometry, size, self.config.rotate) {
            self.abort_setup();
            return Err(e);
        }

        let mut sink = match self.open_sink() {
            Ok(sink) => sink,
            Err(e) => {
                self.abort_setup();
                return Err(e);
            }
        };

        self.set_state(SessionState::Capturing);
        let started = self.clock.monotonic_nanos();
        let mut stats = LoopStats::default();
        let loop_result = self.drain(&mut *sink, stop, started, &mut stats);
        let duration_secs = (self.clock.monotonic_nanos() - started) as f64 / NANOS_PER_SEC as f64;

        self.set_state(SessionState::Draining);
        let recorded_timestamps = stats.timestamps.len();
        let metadata_result = if sink.records_timestamps() {
            let timestamps = std::mem::take(&mut stats.timestamps);
            sink.write_timestamp_metadata(timestamps, realtime_offset_us(self.clock.as_ref()))
        } else {
            Ok(())
        };
        if let Err(ref e) = metadata_result {
            log::error!("failed to write frame-time metadata: {}", e);
        }
        let teardown_result = self.teardown(&mut *sink);

        let stop_reason = loop_result?;
        metadata_result?;
        teardown_result?;

        log::info!(
            "Stopping ({:?}): {} frames in {:.2}s",
            stop_reason,
            stats.frames,
            duration_secs
        );

        let checksum = sink.output_path().map(file_checksum).transpose()?;
        let has_frame_time_track = sink.records_timestamps() && recorded_timestamps > 0;
        let metadata = RecordingMetadata::new(
            &self.config,
            size,
            frame_rate,
            stats.frames,
            duration_secs,
            stop_reason,
            checksum.clone(),
            has_frame_time_track,
        );

        if self.config.write_metadata_sidecar {
            match sink.output_path() {
                Some(path) => write_metadata(&metadata, path)?,
                None => log::warn!("metadata sidecar requested but output is not a file"),
            }
        }

        Ok(RecordingResult {
            output: self.config.output_target.clone(),
            duration_secs,
            frame_count: stats.frames,
            stop_reason,
            checksum,
            metadata,
        })
    }

    fn open_sink(&mut self) -> Result<Box<dyn OutputSink>, RecordError> {
        if let Some(format) = self.config.output_format.container_format() {
            let path = self.config.output_target.path().ok_or_else(|| {
                RecordError::ConfigValidation(format!(
                    "{} output needs a file",
                    self.config.output_format
                ))
            })?;
            let factory = self.muxer_factory.as_deref().ok_or_else(|| {
                RecordError::ConfigValidation(format!(
                    "no muxer backend for {} output",
                    self.config.output_format
                ))
            })?;
            return Ok(Box::new(ContainerSink::create(
                factory,
                path,
                format,
                self.config.rotate,
            )?));
        }

        match self.byte_sink.take() {
            Some(sink) => Ok(Box::new(sink)),
            None => Ok(Box::new(RawSink::open(&self.config.output_target)?)),
        }
    }

    /// The encoder output loop.
    fn drain(
        &mut self,
        sink: &mut dyn OutputSink,
        stop: &StopSignal,
        started: i64,
        stats: &mut LoopStats,
    ) -> Result<StopReason, RecordError> {
        let deadline = started + self.config.time_limit_secs as i64 * NANOS_PER_SEC;
        let mut end_of_stream = false;

        loop {
            if end_of_stream {
                return Ok(StopReason::EndOfStream);
            }
            if stop.is_stop_requested() {
                return Ok(StopReason::StopRequested);
            }
            if self.clock.monotonic_nanos() > deadline {
                log::info!("Time limit reached");
                return Ok(StopReason::TimeLimit);
            }

            match self.encoder.poll_output(POLL_TIMEOUT)? {
                OutputEvent::Data(mut sample) => {
                    self.handle_sample(sink, &mut sample, stats)?;
                    self.encoder.release_output_buffer(sample.buffer_index)?;
                    if sample.flags.is_end_of_stream() {
                        log::info!("Received end-of-stream");
                        stop.request_stop();
                        end_of_stream = true;
                    }
                }
                OutputEvent::FormatChanged(format) => {
                    log::debug!("Encoder format changed: {}", format.mime);
                    sink.on_format_changed(&format)?;
                }
                OutputEvent::BuffersChanged => {
                    log::debug!("Encoder buffers changed");
                    self.encoder.refresh_output_buffers()?;
                }
                OutputEvent::Retry => {}
                OutputEvent::EndOfStream => {
                    log::info!("Received end-of-stream");
                    stop.request_stop();
                    end_of_stream = true;
                }
                OutputEvent::Error(code) => {
                    return Err(RecordError::Poll(format!(
                        "poll of encoder output failed (status {})",
                        code
                    )));
                }
            }
        }
    }

    fn handle_sample(
        &mut self,
        sink: &mut dyn OutputSink,
        sample: &mut EncodedSample,
        stats: &mut LoopStats,
    ) -> Result<(), RecordError> {
        let is_config = sample.flags.is_config();
        if is_config {
            log::debug!("Got codec config buffer ({} bytes)", sample.size());
            if !sink.forwards_codec_config() {
                return Ok(());
            }
        }
        if sample.is_empty() {
            return Ok(());
        }

        self.check_orientation();

        // encoder pts are on the monotonic clock; keep substitutes there too
        if sample.presentation_time_us == 0 {
            sample.presentation_time_us = self.clock.monotonic_nanos() / 1000;
        }

        sink.write_sample(sample)?;
        if !is_config {
            if sink.records_timestamps() {
                stats.timestamps.push(sample.presentation_time_us);
            }
            stats.frames += 1;
        }
        Ok(())
    }

    /// Re-project when the display orientation changed. Failures only log.
    fn check_orientation(&mut self) {
        match self.display.display_geometry() {
            Ok(geometry) => {
                if let Err(e) = self.capture.update_geometry(geometry) {
                    log::warn!("unable to update display projection: {}", e);
                }
            }
            Err(e) => log::warn!("getDisplayState() failed: {}", e),
        }
    }

    /// Undo a partial setup: capture first, then the encoder.
    fn abort_setup(&mut self) {
        self.capture.close();
        if let Err(e) = self.encoder.stop() {
            log::error!("failed to stop encoder: {}", e);
        }
        self.encoder.release();
    }

    /// Release everything in reverse acquisition order. Every step runs; the
    /// first container error is returned.
    fn teardown(&mut self, sink: &mut dyn OutputSink) -> Result<(), RecordError> {
        self.capture.close();
        if let Err(e) = self.encoder.stop() {
            log::error!("failed to stop encoder: {}", e);
        }
        let closed = sink.close();
        if let Err(ref e) = closed {
            log::error!("failed to finalize output: {}", e);
        }
        self.encoder.release();
        closed
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(state);
        }
    }
}
