//! FLAC codec — lossless compression for SF4 payloads.
//!
//! Each SoundFont sample becomes one self-contained mono 16-bit FLAC
//! stream. Encoding uses `flacenc` (pure Rust); decoding uses `claxon`.
//! Round-trips are bit-exact.

use std::io::Cursor;

use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::config::Encoder as EncoderConfig;
use flacenc::encode_with_fixed_block_size;
use flacenc::error::Verify;
use flacenc::source::MemSource;

use crate::{CodecError, Quality, SampleCodec};

/// Samples per FLAC frame.
const BLOCK_SIZE: usize = 4096;

/// FLAC codec backed by `flacenc` (encode) and `claxon` (decode).
///
/// `flacenc` exposes no numbered compression level, so the nominal
/// [`Quality::flac_level`] only shows up in logs; every level uses the
/// encoder's verified default configuration. Lossless output is unaffected.
pub struct FlacCodec;

impl SampleCodec for FlacCodec {
    fn encode(&self, pcm: &[i16], sample_rate: u32, quality: Quality) -> Result<Vec<u8>, CodecError> {
        tracing::debug!(
            samples = pcm.len(),
            sample_rate,
            level = quality.flac_level(),
            "FLAC encode"
        );

        let widened: Vec<i32> = pcm.iter().map(|&s| s as i32).collect();

        let config = EncoderConfig::default()
            .into_verified()
            .map_err(|e| CodecError::encode("flac", format!("invalid encoder config: {e:?}")))?;

        let source = MemSource::from_samples(&widened, 1, 16, sample_rate as usize);
        let stream = encode_with_fixed_block_size(&config, source, BLOCK_SIZE)
            .map_err(|e| CodecError::encode("flac", format!("{e:?}")))?;

        let mut sink = ByteSink::new();
        stream
            .write(&mut sink)
            .map_err(|e| CodecError::encode("flac", format!("{e:?}")))?;
        Ok(sink.into_inner())
    }

    fn decode(&self, data: &[u8], _sample_rate: u32) -> Result<Vec<i16>, CodecError> {
        let mut reader = claxon::FlacReader::new(Cursor::new(data))
            .map_err(|e| CodecError::decode("flac", e))?;

        let info = reader.streaminfo();
        if info.channels != 1 {
            return Err(CodecError::decode(
                "flac",
                format!("expected a mono stream, got {} channels", info.channels),
            ));
        }
        if info.bits_per_sample != 16 {
            return Err(CodecError::decode(
                "flac",
                format!("expected 16 bits per sample, got {}", info.bits_per_sample),
            ));
        }

        let mut pcm = Vec::with_capacity(info.samples.unwrap_or(0) as usize);
        for sample in reader.samples() {
            let value = sample.map_err(|e| CodecError::decode("flac", e))?;
            pcm.push(value as i16);
        }
        Ok(pcm)
    }

    fn name(&self) -> &'static str {
        "flac"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::f32_to_i16;

    fn sine(sample_rate: u32, freq: f32, count: usize) -> Vec<i16> {
        (0..count)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                f32_to_i16(0.7 * (2.0 * std::f32::consts::PI * freq * t).sin())
            })
            .collect()
    }

    #[test]
    fn test_flac_round_trip_is_bit_exact() {
        let codec = FlacCodec;
        let original = sine(44100, 440.0, 4410);

        let encoded = codec.encode(&original, 44100, Quality::High).unwrap();
        assert_eq!(&encoded[..4], b"fLaC");

        let decoded = codec.decode(&encoded, 44100).unwrap();
        assert_eq!(original, decoded, "FLAC round-trip must be bit-exact");
    }

    #[test]
    fn test_flac_compresses_a_sine() {
        let codec = FlacCodec;
        let original = sine(44100, 440.0, 44100);

        let encoded = codec.encode(&original, 44100, Quality::High).unwrap();
        assert!(encoded.len() < original.len() * 2);
    }

    #[test]
    fn test_flac_extreme_values_survive() {
        let codec = FlacCodec;
        let original = vec![i16::MIN, i16::MAX, 0, -1, 1, i16::MIN, i16::MAX];

        let encoded = codec.encode(&original, 22050, Quality::Low).unwrap();
        let decoded = codec.decode(&encoded, 22050).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_flac_decode_rejects_garbage() {
        let codec = FlacCodec;
        assert!(codec.decode(&[0u8; 64], 44100).is_err());
    }
}
