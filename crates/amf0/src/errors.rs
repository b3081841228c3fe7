use std::io;
use std::str::Utf8Error;

use thiserror::Error;

use super::Amf0Marker;

/// Errors raised while reading AMF0 data.
#[derive(Debug, Error)]
pub enum Amf0ReadError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unknown marker: 0x{0:02x}")]
    UnknownMarker(u8),
    #[error("unsupported type: {0:?}")]
    UnsupportedType(Amf0Marker),
    #[error("string is not valid utf-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),
    #[error("wrong type: expected {expected:?}, got {got:?}")]
    WrongType {
        expected: Amf0Marker,
        got: Amf0Marker,
    },
}

/// Errors raised while writing AMF0 data.
#[derive(Debug, Error)]
pub enum Amf0WriteError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("object key is too long: {0} bytes")]
    KeyTooLong(usize),
    #[error("array is too long: {0} entries")]
    ArrayTooLong(usize),
}
