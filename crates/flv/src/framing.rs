//! Byte layout of the fixed-size FLV fields: file header, tag header and
//! `PreviousTagSize`.

use std::io;

use crate::header::FlvHeader;
use crate::tag::FlvTagType;

pub const FLV_HEADER_SIZE: usize = 9;
pub const PREV_TAG_SIZE_FIELD_SIZE: usize = 4;
pub const TAG_HEADER_SIZE: usize = 11;

/// Largest body a tag can declare in its UI24 `DataSize`.
pub const MAX_TAG_DATA_SIZE: u32 = 0xFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTagHeader {
    pub tag_type: FlvTagType,
    pub is_filtered: bool,
    pub data_size: u32,
    pub timestamp_ms: u32,
    pub stream_id: u32,
}

/// The 9-byte file header followed by `PreviousTagSize0`.
pub fn encode_header_bytes(header: &FlvHeader) -> [u8; FLV_HEADER_SIZE + PREV_TAG_SIZE_FIELD_SIZE] {
    let mut out = [0u8; FLV_HEADER_SIZE + PREV_TAG_SIZE_FIELD_SIZE];

    out[..3].copy_from_slice(b"FLV");
    out[3] = header.version;
    out[4] = header.flags();
    // only the standard header length is ever written
    out[5..9].copy_from_slice(&(FLV_HEADER_SIZE as u32).to_be_bytes());
    out[9..13].copy_from_slice(&0u32.to_be_bytes());

    out
}

pub fn encode_prev_tag_size_bytes(prev_tag_size: u32) -> [u8; PREV_TAG_SIZE_FIELD_SIZE] {
    prev_tag_size.to_be_bytes()
}

/// Encodes an 11-byte tag header.
///
/// Timestamps wrap into the extension byte, so the full `u32` millisecond
/// range is representable.
pub fn encode_tag_header_bytes(
    tag_type: FlvTagType,
    data_size: u32,
    timestamp_ms: u32,
) -> io::Result<[u8; TAG_HEADER_SIZE]> {
    if data_size > MAX_TAG_DATA_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("FLV tag data size ({data_size}) exceeds 24-bit limit ({MAX_TAG_DATA_SIZE})"),
        ));
    }

    let mut out = [0u8; TAG_HEADER_SIZE];
    out[0] = u8::from(tag_type) & 0x1F;

    out[1] = (data_size >> 16) as u8;
    out[2] = (data_size >> 8) as u8;
    out[3] = data_size as u8;

    // lower 24 bits, then the extension byte
    out[4] = (timestamp_ms >> 16) as u8;
    out[5] = (timestamp_ms >> 8) as u8;
    out[6] = timestamp_ms as u8;
    out[7] = (timestamp_ms >> 24) as u8;

    // StreamID, always 0
    Ok(out)
}

pub fn parse_prev_tag_size(bytes: [u8; PREV_TAG_SIZE_FIELD_SIZE]) -> u32 {
    u32::from_be_bytes(bytes)
}

pub fn parse_tag_header_bytes(bytes: [u8; TAG_HEADER_SIZE]) -> ParsedTagHeader {
    let tag_type = FlvTagType::from(bytes[0] & 0x1F);
    let is_filtered = (bytes[0] & 0x20) != 0;

    let data_size = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]);
    let timestamp_ms = u32::from_be_bytes([bytes[7], bytes[4], bytes[5], bytes[6]]);
    let stream_id = u32::from_be_bytes([0, bytes[8], bytes[9], bytes[10]]);

    ParsedTagHeader {
        tag_type,
        is_filtered,
        data_size,
        timestamp_ms,
        stream_id,
    }
}
