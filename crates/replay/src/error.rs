use thiserror::Error;

pub type CodecResult<T> = Result<T, CodecError>;

/// Replay encoding and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("bit stream truncated: wanted {wanted} bits, {available} left")]
    Truncated { wanted: u32, available: usize },

    #[error("{field} value {value} does not fit in {bits} bits")]
    ValueOutOfRange {
        field: &'static str,
        value: i64,
        bits: u32,
    },

    #[error("invalid {what} code {code}")]
    InvalidCode { what: &'static str, code: u32 },

    #[error("action at {t} ms is earlier than the previous one at {previous} ms")]
    TimeReversed { t: u32, previous: u32 },

    #[error("invalid frame at {timestamp} ms: {reason}")]
    InvalidFrame { timestamp: u32, reason: &'static str },

    #[error("encoder state drifted from decoded state at {timestamp} ms")]
    Drift { timestamp: u32 },

    #[error("invalid base64 payload: {0}")]
    Base64(String),

    #[error("invalid replay metadata: {0}")]
    Meta(String),
}

impl From<base64::DecodeError> for CodecError {
    fn from(err: base64::DecodeError) -> Self {
        CodecError::Base64(err.to_string())
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Meta(err.to_string())
    }
}
