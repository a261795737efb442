//! In-memory backends for exercising the session without a device.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::{ContainerFormat, VideoSize};
use crate::models::display::{DisplayGeometry, ProjectionRect};
use crate::models::error::RecordError;
use crate::models::sample::{CodecFormat, SampleFlags};
use crate::traits::capture_surface::{CaptureHandle, CaptureSurfaceProvider};
use crate::traits::clock::Clock;
use crate::traits::display_source::DisplaySource;
use crate::traits::media_muxer::{MediaMuxer, MuxerFactory, SampleInfo};
use crate::traits::video_encoder::{
    BufferInfo, DequeueStatus, EncoderParams, InputSurface, OutputBuffer, VideoEncoder,
};

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    monotonic: AtomicI64,
    boot_offset: AtomicI64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_monotonic_nanos(&self, nanos: i64) {
        self.monotonic.store(nanos, Ordering::SeqCst);
    }

    /// Time spent suspended; added to the monotonic clock for elapsed realtime.
    pub fn set_boot_offset_nanos(&self, nanos: i64) {
        self.boot_offset.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.monotonic.fetch_add(by.as_nanos() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn monotonic_nanos(&self) -> i64 {
        self.monotonic.load(Ordering::SeqCst)
    }

    fn elapsed_realtime_nanos(&self) -> i64 {
        self.monotonic_nanos() + self.boot_offset.load(Ordering::SeqCst)
    }
}

/// A release-side call on one of the fakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    CaptureReleased,
    EncoderStopped,
    MuxerStopped,
    EncoderReleased,
}

/// Call order shared between fakes.
pub type EventLog = Arc<Mutex<Vec<LifecycleEvent>>>;

fn record_event(events: &Option<EventLog>, event: LifecycleEvent) {
    if let Some(events) = events {
        events.lock().push(event);
    }
}

/// One step of a [`FakeEncoder`] script.
#[derive(Debug, Clone)]
pub enum ScriptedOutput {
    TryAgain,
    FormatChanged(CodecFormat),
    BuffersChanged,
    Frame {
        payload: Vec<u8>,
        pts_us: i64,
        flags: SampleFlags,
    },
    /// Empty buffer flagged end of stream.
    EndOfStream,
    /// A buffer index the encoder never handed out.
    BogusBuffer { index: usize },
    Error(i32),
}

impl ScriptedOutput {
    pub fn frame(payload: &[u8], pts_us: i64) -> Self {
        Self::Frame {
            payload: payload.to_vec(),
            pts_us,
            flags: SampleFlags::empty(),
        }
    }

    pub fn config(payload: &[u8]) -> Self {
        Self::Frame {
            payload: payload.to_vec(),
            pts_us: 0,
            flags: SampleFlags::CODEC_CONFIG,
        }
    }
}

/// Everything a [`FakeEncoder`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct EncoderLog {
    pub configured_sizes: Vec<VideoSize>,
    pub params: Vec<EncoderParams>,
    pub starts: usize,
    pub stops: usize,
    pub releases: usize,
    pub released_buffers: Vec<usize>,
}

const FAKE_BUFFER_COUNT: usize = 4;

/// Scripted encoder. Once the script runs out every dequeue times out.
pub struct FakeEncoder {
    script: VecDeque<ScriptedOutput>,
    configure_failures: VecDeque<RecordError>,
    fail_start: bool,
    buffers: Vec<OutputBuffer>,
    next_slot: usize,
    format: CodecFormat,
    clock: Option<(Arc<ManualClock>, Duration)>,
    log: Arc<Mutex<EncoderLog>>,
    events: Option<EventLog>,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            configure_failures: VecDeque::new(),
            fail_start: false,
            buffers: Vec::new(),
            next_slot: 0,
            format: CodecFormat::default(),
            clock: None,
            log: Arc::new(Mutex::new(EncoderLog::default())),
            events: None,
        }
    }

    pub fn with_script(mut self, script: Vec<ScriptedOutput>) -> Self {
        self.script = script.into();
        self
    }

    /// Reject the next `n` configure calls.
    pub fn fail_configure_times(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.configure_failures
                .push_back(RecordError::EncoderInit("codec rejected format".into()));
        }
        self
    }

    pub fn fail_configure_with(mut self, errors: Vec<RecordError>) -> Self {
        self.configure_failures = errors.into();
        self
    }

    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Advance `clock` by `step` on every dequeue.
    pub fn with_clock(mut self, clock: Arc<ManualClock>, step: Duration) -> Self {
        self.clock = Some((clock, step));
        self
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn log(&self) -> EncoderLog {
        self.log.lock().clone()
    }

    /// Shared view of the log that outlives the encoder being moved.
    pub fn log_handle(&self) -> Arc<Mutex<EncoderLog>> {
        Arc::clone(&self.log)
    }

    fn fill_next(&mut self, payload: &[u8]) -> usize {
        let index = self.next_slot % FAKE_BUFFER_COUNT;
        self.next_slot += 1;
        let mut slot = self.buffers[index].lock();
        slot.clear();
        slot.extend_from_slice(payload);
        index
    }
}

impl VideoEncoder for FakeEncoder {
    fn configure(&mut self, params: &EncoderParams) -> Result<(), RecordError> {
        {
            let mut log = self.log.lock();
            log.configured_sizes
                .push(VideoSize::new(params.width, params.height));
            log.params.push(params.clone());
        }
        if let Some(err) = self.configure_failures.pop_front() {
            return Err(err);
        }
        self.buffers = (0..FAKE_BUFFER_COUNT)
            .map(|_| Arc::new(Mutex::new(Vec::new())))
            .collect();
        Ok(())
    }

    fn create_input_surface(&mut self, persistent: bool) -> Result<InputSurface, RecordError> {
        Ok(InputSurface { id: 1, persistent })
    }

    fn start(&mut self) -> Result<(), RecordError> {
        if self.fail_start {
            return Err(RecordError::EncoderInit("start failed".into()));
        }
        self.log.lock().starts += 1;
        Ok(())
    }

    fn dequeue_output_buffer(&mut self, _timeout: Duration) -> DequeueStatus {
        if let Some((clock, step)) = &self.clock {
            clock.advance(*step);
        }
        let Some(next) = self.script.pop_front() else {
            return DequeueStatus::TryAgainLater;
        };
        match next {
            ScriptedOutput::TryAgain => DequeueStatus::TryAgainLater,
            ScriptedOutput::FormatChanged(format) => {
                self.format = format;
                DequeueStatus::OutputFormatChanged
            }
            ScriptedOutput::BuffersChanged => DequeueStatus::OutputBuffersChanged,
            ScriptedOutput::Frame {
                payload,
                pts_us,
                flags,
            } => {
                let index = self.fill_next(&payload);
                DequeueStatus::Buffer(BufferInfo {
                    index,
                    offset: 0,
                    size: payload.len(),
                    presentation_time_us: pts_us,
                    flags,
                })
            }
            ScriptedOutput::EndOfStream => {
                let index = self.fill_next(&[]);
                DequeueStatus::Buffer(BufferInfo {
                    index,
                    offset: 0,
                    size: 0,
                    presentation_time_us: 0,
                    flags: SampleFlags::END_OF_STREAM,
                })
            }
            ScriptedOutput::BogusBuffer { index } => DequeueStatus::Buffer(BufferInfo {
                index,
                offset: 0,
                size: 1,
                presentation_time_us: 0,
                flags: SampleFlags::empty(),
            }),
            ScriptedOutput::Error(code) => DequeueStatus::Error(code),
        }
    }

    fn output_buffers(&mut self) -> Result<Vec<OutputBuffer>, RecordError> {
        Ok(self.buffers.clone())
    }

    fn output_format(&mut self) -> Result<CodecFormat, RecordError> {
        Ok(self.format.clone())
    }

    fn release_output_buffer(&mut self, index: usize) -> Result<(), RecordError> {
        self.log.lock().released_buffers.push(index);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecordError> {
        self.log.lock().stops += 1;
        record_event(&self.events, LifecycleEvent::EncoderStopped);
        Ok(())
    }

    fn release(&mut self) {
        self.buffers.clear();
        self.log.lock().releases += 1;
        record_event(&self.events, LifecycleEvent::EncoderReleased);
    }
}

/// A call made on a [`RecordingMuxer`].
#[derive(Debug, Clone, PartialEq)]
pub enum MuxerCall {
    AddTrack(CodecFormat),
    OrientationHint(u32),
    Start,
    WriteSample {
        track: usize,
        data: Vec<u8>,
        presentation_time_us: i64,
        flags: SampleFlags,
    },
    Stop,
}

pub type MuxerCallLog = Arc<Mutex<Vec<MuxerCall>>>;

/// Muxer that records every call and appends sample bytes to its file.
pub struct RecordingMuxer {
    calls: MuxerCallLog,
    file: Option<File>,
    tracks: usize,
    events: Option<EventLog>,
}

impl RecordingMuxer {
    pub fn new(calls: MuxerCallLog) -> Self {
        Self {
            calls,
            file: None,
            tracks: 0,
            events: None,
        }
    }
}

impl MediaMuxer for RecordingMuxer {
    fn add_track(&mut self, format: &CodecFormat) -> Result<usize, RecordError> {
        self.calls.lock().push(MuxerCall::AddTrack(format.clone()));
        self.tracks += 1;
        Ok(self.tracks - 1)
    }

    fn set_orientation_hint(&mut self, degrees: u32) -> Result<(), RecordError> {
        self.calls.lock().push(MuxerCall::OrientationHint(degrees));
        Ok(())
    }

    fn start(&mut self) -> Result<(), RecordError> {
        self.calls.lock().push(MuxerCall::Start);
        Ok(())
    }

    fn write_sample_data(
        &mut self,
        track_index: usize,
        data: &[u8],
        info: &SampleInfo,
    ) -> Result<(), RecordError> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(data)
                .map_err(|e| RecordError::MuxerWrite(e.to_string()))?;
        }
        self.calls.lock().push(MuxerCall::WriteSample {
            track: track_index,
            data: data.to_vec(),
            presentation_time_us: info.presentation_time_us,
            flags: info.flags,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecordError> {
        self.calls.lock().push(MuxerCall::Stop);
        record_event(&self.events, LifecycleEvent::MuxerStopped);
        Ok(())
    }
}

/// Hands out [`RecordingMuxer`]s sharing one call log.
#[derive(Clone, Default)]
pub struct RecordingMuxerFactory {
    pub calls: MuxerCallLog,
    pub created: Arc<Mutex<Vec<(PathBuf, ContainerFormat)>>>,
    events: Option<EventLog>,
}

impl RecordingMuxerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn calls(&self) -> Vec<MuxerCall> {
        self.calls.lock().clone()
    }
}

impl MuxerFactory for RecordingMuxerFactory {
    fn create_muxer(
        &self,
        path: &Path,
        format: ContainerFormat,
    ) -> Result<Box<dyn MediaMuxer>, RecordError> {
        let file = File::create(path).map_err(|e| RecordError::Storage(e.to_string()))?;
        self.created.lock().push((path.to_path_buf(), format));
        let mut muxer = RecordingMuxer::new(Arc::clone(&self.calls));
        muxer.file = Some(file);
        muxer.events = self.events.clone();
        Ok(Box::new(muxer))
    }
}

/// Display whose geometry walks through a list, one entry per query, and
/// then stays on the last entry.
#[derive(Clone)]
pub struct FakeDisplay {
    geometries: Arc<Mutex<VecDeque<DisplayGeometry>>>,
    refresh_rate: f32,
    fail: bool,
}

impl FakeDisplay {
    pub fn new(width: u32, height: u32) -> Self {
        Self::sequence(vec![DisplayGeometry {
            width,
            height,
            ..Default::default()
        }])
    }

    pub fn sequence(geometries: Vec<DisplayGeometry>) -> Self {
        Self {
            geometries: Arc::new(Mutex::new(geometries.into())),
            refresh_rate: 60.0,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0, 0)
        }
    }
}

impl DisplaySource for FakeDisplay {
    fn display_geometry(&self) -> Result<DisplayGeometry, RecordError> {
        if self.fail {
            return Err(RecordError::CaptureSetup("display unavailable".into()));
        }
        let mut geometries = self.geometries.lock();
        if geometries.len() > 1 {
            if let Some(g) = geometries.pop_front() {
                return Ok(g);
            }
        }
        geometries
            .front()
            .copied()
            .ok_or_else(|| RecordError::CaptureSetup("no display geometry".into()))
    }

    fn refresh_rate(&self) -> Result<f32, RecordError> {
        Ok(self.refresh_rate)
    }
}

/// Everything a [`FakeCapture`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct CaptureLog {
    pub binds: Vec<(InputSurface, u32)>,
    pub projections: Vec<ProjectionRect>,
    pub releases: Vec<CaptureHandle>,
}

#[derive(Clone, Default)]
pub struct FakeCapture {
    log: Arc<Mutex<CaptureLog>>,
    fail_bind: bool,
    events: Option<EventLog>,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_bind: true,
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn log(&self) -> CaptureLog {
        self.log.lock().clone()
    }
}

impl CaptureSurfaceProvider for FakeCapture {
    fn bind_to_input_surface(
        &mut self,
        surface: &InputSurface,
        layer_stack: u32,
    ) -> Result<CaptureHandle, RecordError> {
        if self.fail_bind {
            return Err(RecordError::CaptureSetup("virtual display refused".into()));
        }
        let mut log = self.log.lock();
        log.binds.push((surface.clone(), layer_stack));
        Ok(CaptureHandle(log.binds.len() as u64))
    }

    fn apply_projection(
        &mut self,
        _handle: CaptureHandle,
        projection: &ProjectionRect,
    ) -> Result<(), RecordError> {
        self.log.lock().projections.push(*projection);
        Ok(())
    }

    fn release(&mut self, handle: CaptureHandle) {
        self.log.lock().releases.push(handle);
        record_event(&self.events, LifecycleEvent::CaptureReleased);
    }
}
