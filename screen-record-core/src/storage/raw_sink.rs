use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::config::OutputTarget;
use crate::models::error::RecordError;
use crate::models::sample::{CodecFormat, EncodedSample};
use crate::storage::output_sink::OutputSink;

/// Receives raw output payloads in place of a writer.
pub type ByteSinkCallback = Box<dyn FnMut(&[u8]) -> io::Result<()> + Send>;

enum RawOutput {
    Writer(Box<dyn Write + Send>),
    Callback(ByteSinkCallback),
}

/// Elementary-stream output: every encoder payload, byte for byte.
///
/// Codec-config buffers are written too, so the stream is decodable on its
/// own. The writer is flushed after every frame but not after config-only
/// writes.
pub struct RawSink {
    output: RawOutput,
    path: Option<PathBuf>,
    bytes_written: u64,
    closed: bool,
    _raw_tty: Option<tty::RawModeGuard>,
}

impl RawSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self::with_output(RawOutput::Writer(writer), None)
    }

    pub fn from_callback(callback: ByteSinkCallback) -> Self {
        Self::with_output(RawOutput::Callback(callback), None)
    }

    /// Open `target` for writing. A file is truncated; standard output is
    /// switched to raw mode when it is a terminal.
    pub fn open(target: &OutputTarget) -> Result<Self, RecordError> {
        match target {
            OutputTarget::File(path) => {
                let file = File::create(path).map_err(|e| {
                    RecordError::Storage(format!("unable to open '{}': {}", path.display(), e))
                })?;
                Ok(Self::with_output(
                    RawOutput::Writer(Box::new(BufWriter::new(file))),
                    Some(path.clone()),
                ))
            }
            OutputTarget::Stdout => {
                let mut sink = Self::new(Box::new(io::stdout()));
                sink._raw_tty = tty::RawModeGuard::enable_for_stdout();
                Ok(sink)
            }
        }
    }

    fn with_output(output: RawOutput, path: Option<PathBuf>) -> Self {
        Self {
            output,
            path,
            bytes_written: 0,
            closed: false,
            _raw_tty: None,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn write_bytes(&mut self, data: &[u8], flush: bool) -> io::Result<()> {
        match &mut self.output {
            RawOutput::Writer(writer) => {
                writer.write_all(data)?;
                if flush {
                    writer.flush()?;
                }
                Ok(())
            }
            RawOutput::Callback(callback) => callback(data),
        }
    }
}

impl OutputSink for RawSink {
    fn on_format_changed(&mut self, _format: &CodecFormat) -> Result<(), RecordError> {
        Ok(())
    }

    fn write_sample(&mut self, sample: &EncodedSample) -> Result<(), RecordError> {
        if self.closed {
            return Err(RecordError::Storage("raw output already closed".into()));
        }
        if sample.is_empty() {
            return Ok(());
        }
        self.write_bytes(&sample.payload, !sample.flags.is_config())
            .map_err(|e| RecordError::Storage(format!("failed writing data to output: {}", e)))?;
        self.bytes_written += sample.size() as u64;
        Ok(())
    }

    fn forwards_codec_config(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<(), RecordError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let RawOutput::Writer(writer) = &mut self.output {
            writer
                .flush()
                .map_err(|e| RecordError::Storage(format!("failed to flush output: {}", e)))?;
        }
        Ok(())
    }

    fn output_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(unix)]
mod tty {
    /// Keeps a terminal in raw mode and restores it on drop.
    pub struct RawModeGuard {
        fd: libc::c_int,
        original: libc::termios,
    }

    impl RawModeGuard {
        pub fn enable_for_stdout() -> Option<Self> {
            let fd = libc::STDOUT_FILENO;
            // SAFETY: termios is plain data filled in by tcgetattr; fd is stdout.
            unsafe {
                if libc::isatty(fd) == 0 {
                    return None;
                }
                let mut original: libc::termios = std::mem::zeroed();
                if libc::tcgetattr(fd, &mut original) != 0 {
                    log::warn!("unable to read terminal attributes; leaving tty as is");
                    return None;
                }
                let mut raw = original;
                libc::cfmakeraw(&mut raw);
                if libc::tcsetattr(fd, libc::TCSANOW, &raw) != 0 {
                    log::warn!("unable to switch tty to raw mode");
                    return None;
                }
                log::debug!("stdout switched to raw mode");
                Some(Self { fd, original })
            }
        }
    }

    impl Drop for RawModeGuard {
        fn drop(&mut self) {
            // SAFETY: restores attributes previously read from the same fd.
            if unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, &self.original) } != 0 {
                log::warn!("unable to restore terminal attributes");
            }
        }
    }
}

#[cfg(not(unix))]
mod tty {
    pub struct RawModeGuard;

    impl RawModeGuard {
        pub fn enable_for_stdout() -> Option<Self> {
            None
        }
    }
}
