use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::context::MuxerState;

/// Errors returned by [`FormatContext`](crate::FormatContext).
///
/// `InvalidState`, `UnsupportedFormat` and `MalformedAccessUnit` are caller
/// errors: nothing is written and the context keeps its state. `SinkIo` is
/// fatal and is returned again by every later call.
#[derive(Error, Debug, Clone)]
pub enum MuxError {
    #[error("{operation} not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: MuxerState,
    },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("malformed access unit: {0}")]
    MalformedAccessUnit(String),

    #[error("output sink I/O error: {0}")]
    SinkIo(Arc<io::Error>),
}

impl MuxError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedAccessUnit(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SinkIo(_))
    }
}

impl From<io::Error> for MuxError {
    fn from(err: io::Error) -> Self {
        Self::SinkIo(Arc::new(err))
    }
}

impl From<h264::H264Error> for MuxError {
    fn from(err: h264::H264Error) -> Self {
        Self::MalformedAccessUnit(err.to_string())
    }
}

impl From<flv::FlvError> for MuxError {
    fn from(err: flv::FlvError) -> Self {
        Self::MalformedAccessUnit(err.to_string())
    }
}

impl From<aac::AacError> for MuxError {
    fn from(err: aac::AacError) -> Self {
        use aac::AacError;
        match err {
            AacError::UnsupportedSampleRate(_)
            | AacError::UnsupportedChannels(_)
            | AacError::UnsupportedObjectType(_)
            | AacError::InvalidSamplingIndex(_)
            | AacError::MultipleRawDataBlocks { .. } => Self::UnsupportedFormat(err.to_string()),
            _ => Self::MalformedAccessUnit(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
