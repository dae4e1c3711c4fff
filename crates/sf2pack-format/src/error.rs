//! Error types for the SoundFont format crate.

use thiserror::Error;

use crate::riff::FourCC;
use sf2pack_codec::CodecError;

/// Errors that can occur when reading or writing SoundFont files.
#[derive(Error, Debug)]
pub enum SoundFontError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of file")]
    Eof,

    #[error("bad signature: expected {expected}, got {got}")]
    BadSignature { expected: FourCC, got: FourCC },

    #[error("{chunk} size is not a multiple of {record_size}")]
    BadSize { chunk: &'static str, record_size: u32 },

    #[error("chunk overruns its enclosing {list} list")]
    TruncatedChunk { list: FourCC },

    #[error("{chunk} indices not monotonic")]
    NonMonotonicIndex { chunk: &'static str },

    #[error("{chunk} size mismatch: {remaining} bytes left over")]
    SizeMismatch { chunk: &'static str, remaining: i64 },

    #[error("unknown chunk {0}")]
    UnknownChunk(FourCC),

    #[error("{codec} decode failed for sample {sample}")]
    Decode {
        codec: &'static str,
        sample: usize,
        #[source]
        source: CodecError,
    },

    #[error("{codec} encode failed for sample {sample}")]
    Encode {
        codec: &'static str,
        sample: usize,
        #[source]
        source: CodecError,
    },

    #[error("sample {sample} does not match its verification metadata")]
    MetaMismatch { sample: usize },
}

pub type Result<T> = std::result::Result<T, SoundFontError>;

/// Translate short reads into [`SoundFontError::Eof`]; everything else
/// stays an I/O error.
pub(crate) fn map_eof(e: std::io::Error) -> SoundFontError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        SoundFontError::Eof
    } else {
        SoundFontError::Io(e)
    }
}
