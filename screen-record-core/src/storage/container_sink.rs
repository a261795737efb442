use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::models::config::ContainerFormat;
use crate::models::error::RecordError;
use crate::models::sample::{CodecFormat, EncodedSample, SampleFlags};
use crate::processing::metadata_track::TimestampLog;
use crate::storage::output_sink::OutputSink;
use crate::traits::media_muxer::{MediaMuxer, MuxerFactory, SampleInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MuxerState {
    Idle,
    Started,
    Stopped,
}

/// Container output through a platform muxer.
///
/// Tracks are added once, on the first format change, and the muxer is
/// started right after. Samples are rejected outside `start()..stop()`.
pub struct ContainerSink {
    muxer: Box<dyn MediaMuxer>,
    path: PathBuf,
    format: ContainerFormat,
    state: MuxerState,
    video_track: Option<usize>,
    metadata_track: Option<usize>,
    with_metadata_track: bool,
}

impl ContainerSink {
    /// Wrap an already created muxer. With `rotate`, the file is tagged
    /// with a 90 degree orientation hint.
    pub fn new(
        mut muxer: Box<dyn MediaMuxer>,
        path: PathBuf,
        format: ContainerFormat,
        rotate: bool,
    ) -> Result<Self, RecordError> {
        if rotate {
            muxer.set_orientation_hint(90)?;
        }
        Ok(Self {
            muxer,
            path,
            format,
            state: MuxerState::Idle,
            video_track: None,
            metadata_track: None,
            with_metadata_track: format == ContainerFormat::Mpeg4,
        })
    }

    /// Remove whatever is at `path` and create a fresh muxer there.
    pub fn create(
        factory: &dyn MuxerFactory,
        path: &Path,
        format: ContainerFormat,
        rotate: bool,
    ) -> Result<Self, RecordError> {
        match fs::remove_file(path) {
            Ok(()) => log::debug!("Removed existing {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RecordError::Storage(format!(
                    "failed to remove {}: {}",
                    path.display(),
                    e
                )))
            }
        }
        let muxer = factory.create_muxer(path, format)?;
        Self::new(muxer, path.to_path_buf(), format, rotate)
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn is_started(&self) -> bool {
        self.state == MuxerState::Started
    }

    pub fn video_track(&self) -> Option<usize> {
        self.video_track
    }

    pub fn metadata_track(&self) -> Option<usize> {
        self.metadata_track
    }

    pub fn add_track(&mut self, format: &CodecFormat) -> Result<usize, RecordError> {
        if self.state != MuxerState::Idle {
            return Err(RecordError::MuxerWrite(format!(
                "cannot add {} track to a {:?} muxer",
                format.mime, self.state
            )));
        }
        self.muxer.add_track(format)
    }

    /// Start the muxer once its tracks exist. A repeated call is ignored.
    pub fn start(&mut self) -> Result<(), RecordError> {
        match self.state {
            MuxerState::Idle => {
                if self.video_track.is_none() {
                    return Err(RecordError::MuxerWrite("cannot start muxer without a video track".into()));
                }
                if self.with_metadata_track && self.metadata_track.is_none() {
                    return Err(RecordError::MuxerWrite("cannot start muxer without a metadata track".into()));
                }
                self.muxer.start()?;
                self.state = MuxerState::Started;
                Ok(())
            }
            MuxerState::Started => {
                log::warn!("muxer already started");
                Ok(())
            }
            MuxerState::Stopped => Err(RecordError::MuxerWrite("muxer already stopped".into())),
        }
    }

    pub fn write(&mut self, track: usize, data: &[u8], info: &SampleInfo) -> Result<(), RecordError> {
        match self.state {
            MuxerState::Started => self.muxer.write_sample_data(track, data, info),
            MuxerState::Idle => Err(RecordError::MuxerWrite(format!(
                "sample for track {} arrived before the muxer started",
                track
            ))),
            MuxerState::Stopped => Err(RecordError::MuxerWrite(format!(
                "sample for track {} arrived after the muxer stopped",
                track
            ))),
        }
    }

    /// Finalize the file. Idempotent.
    pub fn stop(&mut self) -> Result<(), RecordError> {
        let previous = std::mem::replace(&mut self.state, MuxerState::Stopped);
        match previous {
            MuxerState::Started => self.muxer.stop(),
            MuxerState::Idle => {
                log::debug!("muxer never started; nothing to finalize");
                Ok(())
            }
            MuxerState::Stopped => Ok(()),
        }
    }
}

impl OutputSink for ContainerSink {
    fn on_format_changed(&mut self, format: &CodecFormat) -> Result<(), RecordError> {
        if self.video_track.is_some() {
            log::warn!("encoder format changed again; keeping existing tracks");
            return Ok(());
        }

        self.video_track = Some(self.add_track(format)?);
        if self.with_metadata_track {
            self.metadata_track = Some(self.add_track(&CodecFormat::octet_stream())?);
        }
        self.start()
    }

    fn write_sample(&mut self, sample: &EncodedSample) -> Result<(), RecordError> {
        let track = self
            .video_track
            .ok_or_else(|| RecordError::MuxerWrite("got data before the encoder output format".into()))?;
        self.write(
            track,
            &sample.payload,
            &SampleInfo {
                presentation_time_us: sample.presentation_time_us,
                flags: sample.flags,
            },
        )
    }

    fn forwards_codec_config(&self) -> bool {
        false
    }

    fn records_timestamps(&self) -> bool {
        self.with_metadata_track
    }

    fn write_timestamp_metadata(
        &mut self,
        timestamps: TimestampLog,
        realtime_offset_us: i64,
    ) -> Result<(), RecordError> {
        let (Some(track), Some(first)) = (self.metadata_track, timestamps.first()) else {
            return Ok(());
        };
        log::debug!("Writing frame-time record for {} frames", timestamps.len());
        let record = timestamps.into_record(realtime_offset_us);
        self.write(
            track,
            &record,
            &SampleInfo {
                presentation_time_us: first,
                flags: SampleFlags::empty(),
            },
        )
    }

    fn close(&mut self) -> Result<(), RecordError> {
        self.stop()
    }

    fn output_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample::MIME_TYPE_AVC;
    use crate::processing::metadata_track::decode_frame_times;
    use crate::testing::{MuxerCall, RecordingMuxerFactory};

    fn sample(payload: &[u8], pts: i64) -> EncodedSample {
        EncodedSample {
            buffer_index: 0,
            payload: payload.to_vec(),
            presentation_time_us: pts,
            flags: SampleFlags::empty(),
        }
    }

    fn sink(factory: &RecordingMuxerFactory, format: ContainerFormat, rotate: bool) -> (tempfile::TempDir, ContainerSink) {
        let dir = tempfile::tempdir().unwrap();
        let sink = ContainerSink::create(factory, &dir.path().join("out.mp4"), format, rotate).unwrap();
        (dir, sink)
    }

    #[test]
    fn write_before_start_fails() {
        let factory = RecordingMuxerFactory::new();
        let (_dir, mut sink) = sink(&factory, ContainerFormat::Mpeg4, false);

        let err = sink.write_sample(&sample(b"x", 1)).unwrap_err();
        assert!(matches!(err, RecordError::MuxerWrite(_)));

        let err = sink.write(0, b"x", &SampleInfo { presentation_time_us: 1, flags: SampleFlags::empty() });
        assert!(matches!(err, Err(RecordError::MuxerWrite(_))));
        assert!(factory.calls().is_empty());
    }

    #[test]
    fn start_without_tracks_fails() {
        let factory = RecordingMuxerFactory::new();
        let (_dir, mut sink) = sink(&factory, ContainerFormat::Mpeg4, false);

        assert!(matches!(sink.start(), Err(RecordError::MuxerWrite(_))));

        sink.video_track = Some(sink.add_track(&CodecFormat::video(MIME_TYPE_AVC, 1280, 720)).unwrap());
        assert!(matches!(sink.start(), Err(RecordError::MuxerWrite(_))));
        assert!(!sink.is_started());
        assert!(!factory.calls().contains(&MuxerCall::Start));
    }

    #[test]
    fn mp4_format_change_adds_both_tracks_and_starts() {
        let factory = RecordingMuxerFactory::new();
        let (_dir, mut sink) = sink(&factory, ContainerFormat::Mpeg4, false);
        let video = CodecFormat::video(MIME_TYPE_AVC, 1280, 720);

        sink.on_format_changed(&video).unwrap();

        assert_eq!(sink.video_track(), Some(0));
        assert_eq!(sink.metadata_track(), Some(1));
        assert!(sink.is_started());
        assert_eq!(
            factory.calls(),
            vec![
                MuxerCall::AddTrack(video),
                MuxerCall::AddTrack(CodecFormat::octet_stream()),
                MuxerCall::Start,
            ]
        );
    }

    #[test]
    fn webm_has_no_metadata_track() {
        let factory = RecordingMuxerFactory::new();
        let (_dir, mut sink) = sink(&factory, ContainerFormat::Webm, false);

        sink.on_format_changed(&CodecFormat::video(MIME_TYPE_AVC, 640, 480)).unwrap();

        assert!(!sink.records_timestamps());
        assert_eq!(sink.metadata_track(), None);
        assert_eq!(factory.calls().len(), 2);
    }

    #[test]
    fn double_start_does_not_duplicate_tracks() {
        let factory = RecordingMuxerFactory::new();
        let (_dir, mut sink) = sink(&factory, ContainerFormat::Mpeg4, false);
        let video = CodecFormat::video(MIME_TYPE_AVC, 1280, 720);

        sink.on_format_changed(&video).unwrap();
        sink.on_format_changed(&video).unwrap();
        sink.start().unwrap();

        let calls = factory.calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, MuxerCall::Start)).count(), 1);
        assert_eq!(calls.iter().filter(|c| matches!(c, MuxerCall::AddTrack(_))).count(), 2);
        assert!(sink.add_track(&video).is_err());
    }

    #[test]
    fn write_after_stop_fails() {
        let factory = RecordingMuxerFactory::new();
        let (_dir, mut sink) = sink(&factory, ContainerFormat::Mpeg4, false);
        sink.on_format_changed(&CodecFormat::video(MIME_TYPE_AVC, 1280, 720)).unwrap();
        sink.write_sample(&sample(b"frame", 10)).unwrap();

        sink.close().unwrap();
        sink.close().unwrap();

        assert!(matches!(sink.write_sample(&sample(b"late", 20)), Err(RecordError::MuxerWrite(_))));
        assert!(sink.start().is_err());
        let calls = factory.calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, MuxerCall::Stop)).count(), 1);
    }

    #[test]
    fn rotate_sets_orientation_hint() {
        let factory = RecordingMuxerFactory::new();
        let (_dir, _sink) = sink(&factory, ContainerFormat::Mpeg4, true);
        assert_eq!(factory.calls(), vec![MuxerCall::OrientationHint(90)]);
    }

    #[test]
    fn create_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        fs::write(&path, b"stale recording").unwrap();

        let factory = RecordingMuxerFactory::new();
        let sink = ContainerSink::create(&factory, &path, ContainerFormat::Mpeg4, false).unwrap();

        assert_eq!(fs::read(&path).unwrap(), Vec::<u8>::new());
        assert_eq!(sink.output_path(), Some(path.as_path()));
        assert_eq!(factory.created.lock()[0], (path, ContainerFormat::Mpeg4));
    }

    #[test]
    fn timestamp_record_written_at_first_pts() {
        let factory = RecordingMuxerFactory::new();
        let (_dir, mut sink) = sink(&factory, ContainerFormat::Mpeg4, false);
        sink.on_format_changed(&CodecFormat::video(MIME_TYPE_AVC, 1280, 720)).unwrap();

        let mut log = TimestampLog::new();
        log.push(5_000);
        log.push(21_000);
        sink.write_timestamp_metadata(log, 100).unwrap();

        match factory.calls().last().unwrap() {
            MuxerCall::WriteSample { track, data, presentation_time_us, .. } => {
                assert_eq!(*track, 1);
                assert_eq!(*presentation_time_us, 5_000);
                assert_eq!(decode_frame_times(data).unwrap(), vec![5_100, 21_100]);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn empty_timestamp_log_writes_nothing() {
        let factory = RecordingMuxerFactory::new();
        let (_dir, mut sink) = sink(&factory, ContainerFormat::Mpeg4, false);
        sink.on_format_changed(&CodecFormat::video(MIME_TYPE_AVC, 1280, 720)).unwrap();
        let before = factory.calls().len();

        sink.write_timestamp_metadata(TimestampLog::new(), 0).unwrap();

        assert_eq!(factory.calls().len(), before);
    }
}
