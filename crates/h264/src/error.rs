//! Error types for H.264 bitstream handling.

use thiserror::Error;

/// Errors that can occur while splitting or describing an H.264 stream.
#[derive(Error, Debug)]
pub enum H264Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The buffer does not begin with an Annex-B start code.
    #[error("no Annex-B start code found")]
    MissingStartCode,

    /// A start code is followed by no NAL header byte.
    #[error("truncated NAL unit header at offset {offset}")]
    TruncatedNalHeader {
        /// Offset of the start code in the input buffer.
        offset: usize,
    },

    /// The NAL header has `forbidden_zero_bit` set.
    #[error("forbidden_zero_bit set in NAL unit at offset {offset}")]
    ForbiddenBit {
        /// Offset of the NAL header byte in the input buffer.
        offset: usize,
    },

    /// An SPS is too short to carry profile and level.
    #[error("sequence parameter set too short: {0} bytes")]
    TruncatedSps(usize),

    /// A configuration record needs at least one SPS and one PPS.
    #[error("missing parameter sets: {sps} SPS, {pps} PPS")]
    MissingParameterSets {
        /// Number of SPS provided.
        sps: usize,
        /// Number of PPS provided.
        pps: usize,
    },

    /// A parameter set does not fit the 16-bit length field of the record.
    #[error("parameter set too large: {0} bytes")]
    ParameterSetTooLarge(usize),

    /// More parameter sets than the record can count.
    #[error("too many parameter sets: {0}")]
    TooManyParameterSets(usize),
}
