use std::ops::BitOr;

/// MIME type of the H.264/AVC video stream.
pub const MIME_TYPE_AVC: &str = "video/avc";
/// MIME type of the frame-time metadata track.
pub const MIME_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Codec buffer flags, bit-compatible with MediaCodec's `BUFFER_FLAG_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SampleFlags(u32);

impl SampleFlags {
    pub const KEY_FRAME: Self = Self(1);
    pub const CODEC_CONFIG: Self = Self(2);
    pub const END_OF_STREAM: Self = Self(4);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_config(&self) -> bool {
        self.contains(Self::CODEC_CONFIG)
    }

    pub const fn is_key_frame(&self) -> bool {
        self.contains(Self::KEY_FRAME)
    }

    pub const fn is_end_of_stream(&self) -> bool {
        self.contains(Self::END_OF_STREAM)
    }
}

impl BitOr for SampleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One unit of encoder output.
///
/// `buffer_index` names the codec buffer the payload was copied from; that
/// buffer stays owned by the encoder session until it is released after the
/// sink has consumed the sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSample {
    pub buffer_index: usize,
    pub payload: Vec<u8>,
    pub presentation_time_us: i64,
    pub flags: SampleFlags,
}

impl EncodedSample {
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Track description handed to the container, as renegotiated by the codec.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CodecFormat {
    pub mime: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    /// Codec-specific data (e.g. SPS and PPS for AVC), one entry per blob.
    pub csd: Vec<Vec<u8>>,
}

impl CodecFormat {
    pub fn video(mime: &str, width: u32, height: u32) -> Self {
        Self {
            mime: mime.to_string(),
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    /// Format of the auxiliary frame-time metadata track.
    pub fn octet_stream() -> Self {
        Self {
            mime: MIME_TYPE_OCTET_STREAM.to_string(),
            ..Default::default()
        }
    }

    pub fn with_csd(mut self, csd: Vec<Vec<u8>>) -> Self {
        self.csd = csd;
        self
    }
}
