//! Ogg Vorbis codec — lossy compression for SF3 payloads.
//!
//! Each SoundFont sample becomes one self-contained mono Ogg Vorbis stream.
//! The encoder runs libvorbis in pure VBR quality mode; the quality values
//! correspond to roughly 160/256/500 kbps for mono material.

use std::io::Cursor;
use std::num::{NonZeroU8, NonZeroU32};

use vorbis_rs::{VorbisBitrateManagementStrategy, VorbisDecoder, VorbisEncoderBuilder};

use crate::{f32_to_i16, i16_to_f32, CodecError, Quality, SampleCodec};

/// Samples fed to the encoder per analysis block.
const ENCODE_BLOCK: usize = 1024;

/// Ogg Vorbis codec backed by libvorbis (via `vorbis_rs`).
pub struct VorbisCodec;

impl SampleCodec for VorbisCodec {
    fn encode(&self, pcm: &[i16], sample_rate: u32, quality: Quality) -> Result<Vec<u8>, CodecError> {
        let rate = NonZeroU32::new(sample_rate)
            .ok_or_else(|| CodecError::encode("vorbis", "sample rate must be non-zero"))?;

        let mut builder = VorbisEncoderBuilder::new(rate, NonZeroU8::MIN, Vec::new())
            .map_err(|e| CodecError::encode("vorbis", e))?;
        builder.bitrate_management_strategy(VorbisBitrateManagementStrategy::QualityVbr {
            target_quality: quality.vorbis_quality(),
        });
        let mut encoder = builder.build().map_err(|e| CodecError::encode("vorbis", e))?;

        for block in pcm.chunks(ENCODE_BLOCK) {
            let floats: Vec<f32> = block.iter().map(|&s| i16_to_f32(s)).collect();
            encoder
                .encode_audio_block([&floats])
                .map_err(|e| CodecError::encode("vorbis", e))?;
        }

        encoder.finish().map_err(|e| CodecError::encode("vorbis", e))
    }

    fn decode(&self, data: &[u8], _sample_rate: u32) -> Result<Vec<i16>, CodecError> {
        let mut decoder =
            VorbisDecoder::new(Cursor::new(data)).map_err(|e| CodecError::decode("vorbis", e))?;

        if decoder.channels().get() != 1 {
            return Err(CodecError::decode(
                "vorbis",
                format!("expected a mono stream, got {} channels", decoder.channels()),
            ));
        }

        let mut pcm = Vec::new();
        while let Some(block) = decoder
            .decode_audio_block()
            .map_err(|e| CodecError::decode("vorbis", e))?
        {
            for &sample in block.samples()[0].iter() {
                pcm.push(f32_to_i16(sample));
            }
        }
        Ok(pcm)
    }

    fn name(&self) -> &'static str {
        "vorbis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(sample_rate: u32, freq: f32, count: usize) -> Vec<i16> {
        (0..count)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                f32_to_i16(0.7 * (2.0 * std::f32::consts::PI * freq * t).sin())
            })
            .collect()
    }

    fn rms(samples: &[i16]) -> f64 {
        let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum / samples.len() as f64).sqrt()
    }

    #[test]
    fn test_vorbis_round_trip_preserves_length() {
        let codec = VorbisCodec;
        let original = sine(44100, 440.0, 4410);

        let encoded = codec.encode(&original, 44100, Quality::High).unwrap();
        assert!(!encoded.is_empty());
        // Ogg capture pattern
        assert_eq!(&encoded[..4], b"OggS");

        let decoded = codec.decode(&encoded, 44100).unwrap();
        assert_eq!(decoded.len(), original.len());
    }

    #[test]
    fn test_vorbis_high_quality_is_close() {
        let codec = VorbisCodec;
        let original = sine(44100, 440.0, 4410);

        let encoded = codec.encode(&original, 44100, Quality::High).unwrap();
        let decoded = codec.decode(&encoded, 44100).unwrap();
        assert_eq!(decoded.len(), original.len());

        let err: Vec<i16> = original
            .iter()
            .zip(decoded.iter())
            .map(|(&a, &b)| a.saturating_sub(b))
            .collect();
        let rel = rms(&err) / rms(&original);
        assert!(rel < 0.05, "relative RMS error too large: {rel}");
    }

    #[test]
    fn test_vorbis_lower_quality_is_smaller() {
        let codec = VorbisCodec;
        let original = sine(44100, 440.0, 44100);

        let low = codec.encode(&original, 44100, Quality::Low).unwrap();
        let high = codec.encode(&original, 44100, Quality::High).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_vorbis_decode_rejects_garbage() {
        let codec = VorbisCodec;
        assert!(codec.decode(&[0u8; 64], 44100).is_err());
    }

    #[test]
    fn test_vorbis_encode_rejects_zero_rate() {
        let codec = VorbisCodec;
        assert!(codec.encode(&[0i16; 16], 0, Quality::High).is_err());
    }
}
