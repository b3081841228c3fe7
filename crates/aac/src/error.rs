//! Error types for AAC framing.

use thiserror::Error;

/// Errors that can occur while parsing ADTS or building an `AudioSpecificConfig`.
#[derive(Error, Debug)]
pub enum AacError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The data does not start with the ADTS sync word.
    #[error("ADTS sync word not found at offset {offset}")]
    MissingSyncWord {
        /// Offset in the input buffer.
        offset: usize,
    },

    /// Fewer bytes remain than the ADTS header needs.
    #[error("truncated ADTS header: {available} of {needed} bytes")]
    TruncatedHeader {
        /// Header size implied by `protection_absent`.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// The frame length field runs past the end of the buffer.
    #[error("truncated ADTS frame: frame length {frame_length}, {available} bytes available")]
    TruncatedFrame {
        /// `aac_frame_length` from the header.
        frame_length: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// The frame length field is smaller than the header itself.
    #[error("invalid ADTS frame length: {0}")]
    InvalidFrameLength(usize),

    /// The sampling frequency index is reserved or escaped.
    #[error("invalid sampling frequency index: {0}")]
    InvalidSamplingIndex(u8),

    /// The sample rate has no entry in the sampling frequency table.
    #[error("unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    /// The channel configuration is outside 1..=7.
    #[error("unsupported channel configuration: {0}")]
    UnsupportedChannels(u8),

    /// The audio object type cannot be signalled in a two-byte config.
    #[error("unsupported audio object type: {0}")]
    UnsupportedObjectType(u8),

    /// The ADTS frame packs more than one raw data block.
    #[error("ADTS frame at offset {offset} carries {blocks} raw data blocks")]
    MultipleRawDataBlocks {
        /// Offset of the frame in the input buffer.
        offset: usize,
        /// Number of raw data blocks in the frame.
        blocks: u8,
    },

    /// An `AudioSpecificConfig` shorter than two bytes.
    #[error("audio specific config too short: {0} bytes")]
    ConfigTooShort(usize),
}
