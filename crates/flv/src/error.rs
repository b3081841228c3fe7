use thiserror::Error;

use crate::tag::FlvTagType;

#[derive(Error, Debug)]
pub enum FlvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("AMF0 read error: {0}")]
    Amf0Read(#[from] amf0::Amf0ReadError),

    #[error("AMF0 write error: {0}")]
    Amf0Write(#[from] amf0::Amf0WriteError),

    /// The tag body does not fit the 24-bit `DataSize` field.
    #[error("tag body of {size} bytes exceeds the 24-bit size limit")]
    TagTooLarge { size: usize },

    /// A composition time outside the signed 24-bit range.
    #[error("composition time {0} ms out of SI24 range")]
    CompositionTimeOutOfRange(i32),

    #[error("expected a {expected} tag, got {got}")]
    UnexpectedTagType {
        expected: FlvTagType,
        got: FlvTagType,
    },

    #[error("invalid script data: {0}")]
    InvalidScriptData(String),
}
