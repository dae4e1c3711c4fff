//! # sf2pack-codec
//!
//! Audio codec bridge for SoundFont sample payloads.
//! Provides a unified trait for encoding/decoding per-sample audio via:
//! - **PCM** — raw little-endian 16-bit samples (SF2 baseline)
//! - **Ogg Vorbis** — lossy compression (SF3 payloads)
//! - **FLAC** — lossless compression (SF4 payloads)
//!
//! SoundFont samples are mono 16-bit streams; stereo material is stored as
//! two linked mono samples, so every codec here encodes exactly one channel.

pub mod error;
pub mod flac;
pub mod pcm;
pub mod vorbis;

pub use error::CodecError;
pub use flac::FlacCodec;
pub use pcm::PcmCodec;
pub use vorbis::VorbisCodec;

/// Encoding quality selector, spanning low/medium/high for both lossy and
/// lossless codecs.
///
/// The per-codec mappings follow the original converter's calibration:
/// Vorbis VBR qualities 0.2 / 0.6 / 1.0 (≈160 / 256 / 500 kbps mono) and
/// FLAC compression levels 1 / 5 / 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    Low,
    Medium,
    #[default]
    High,
}

impl Quality {
    /// Base VBR quality passed to the Vorbis encoder, in `-0.2..=1.0`.
    pub fn vorbis_quality(self) -> f32 {
        match self {
            Quality::Low => 0.2,
            Quality::Medium => 0.6,
            Quality::High => 1.0,
        }
    }

    /// Approximate Vorbis bitrate in kbps, for logging.
    pub fn vorbis_nominal_kbps(self) -> u32 {
        match self {
            Quality::Low => 160,
            Quality::Medium => 256,
            Quality::High => 500,
        }
    }

    /// Nominal FLAC compression level. FLAC is lossless, so this only
    /// trades encoding speed against output size.
    pub fn flac_level(self) -> u8 {
        match self {
            Quality::Low => 1,
            Quality::Medium => 5,
            Quality::High => 8,
        }
    }
}

/// Unified codec trait over the three sample payload encodings.
///
/// `encode` turns native 16-bit PCM into the on-disk payload bytes;
/// `decode` reverses it. Both operate on a single mono stream.
pub trait SampleCodec: Send + Sync {
    /// Encode mono 16-bit PCM to payload bytes.
    fn encode(&self, pcm: &[i16], sample_rate: u32, quality: Quality) -> Result<Vec<u8>, CodecError>;

    /// Decode payload bytes back to mono 16-bit PCM.
    fn decode(&self, data: &[u8], sample_rate: u32) -> Result<Vec<i16>, CodecError>;

    /// Short codec name for logs and error messages.
    fn name(&self) -> &'static str;
}

/// Scale a float sample in `[-1.0, 1.0]` to i16, rounding and saturating.
pub(crate) fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

/// Scale an i16 sample to a float in `[-1.0, 1.0)`.
pub(crate) fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}
