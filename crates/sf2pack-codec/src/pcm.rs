//! PCM codec — raw uncompressed audio. Stores i16 samples as little-endian
//! bytes, exactly as the SF2 `smpl` chunk expects them.

use byteorder::{ByteOrder, LittleEndian};

use crate::{CodecError, Quality, SampleCodec};

/// Raw PCM codec — the identity encoding used by SF2 banks.
///
/// Each sample occupies exactly 2 bytes in little-endian order, so the
/// output length is always `pcm.len() * 2`.
pub struct PcmCodec;

impl SampleCodec for PcmCodec {
    fn encode(&self, pcm: &[i16], _sample_rate: u32, _quality: Quality) -> Result<Vec<u8>, CodecError> {
        let mut buf = vec![0u8; pcm.len() * 2];
        LittleEndian::write_i16_into(pcm, &mut buf);
        Ok(buf)
    }

    fn decode(&self, data: &[u8], _sample_rate: u32) -> Result<Vec<i16>, CodecError> {
        if data.len() % 2 != 0 {
            return Err(CodecError::decode(
                "pcm",
                format!("data length {} is not a multiple of 2 bytes", data.len()),
            ));
        }
        let mut samples = vec![0i16; data.len() / 2];
        LittleEndian::read_i16_into(data, &mut samples);
        Ok(samples)
    }

    fn name(&self) -> &'static str {
        "pcm"
    }
}
