use std::io;

/// Errors that can occur while encoding or decoding a wire record.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("i/o error decoding record: {0}")]
    Io(#[from] io::Error),

    #[error("record declared length {declared} exceeds maximum {max}")]
    RecordTooLarge { declared: u32, max: u32 },

    #[error("string field is not valid utf-8")]
    InvalidUtf8,

    #[error("unknown discriminant {value} for field {field}")]
    UnknownDiscriminant { field: &'static str, value: u8 },

    #[error("trigger property key/value arrays differ in length ({keys} keys, {values} values)")]
    MismatchedTriggerArrays { keys: usize, values: usize },

    #[error("extra payload of {len} bytes exceeds the {max}-byte limit")]
    ExtraTooLarge { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
