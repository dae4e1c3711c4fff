//! Error types for the codec crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("{codec} encoding failed: {detail}")]
    Encode { codec: &'static str, detail: String },

    #[error("{codec} decoding failed: {detail}")]
    Decode { codec: &'static str, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn encode(codec: &'static str, detail: impl ToString) -> Self {
        Self::Encode {
            codec,
            detail: detail.to_string(),
        }
    }

    pub(crate) fn decode(codec: &'static str, detail: impl ToString) -> Self {
        Self::Decode {
            codec,
            detail: detail.to_string(),
        }
    }
}
