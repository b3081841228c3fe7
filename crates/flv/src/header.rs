use std::fmt::Display;
use std::io;
use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};

use crate::framing::FLV_HEADER_SIZE;

const FLV_SIGNATURE: u32 = 0x464C56;
// Bound on DataOffset so a bogus header cannot make us skip unbounded data.
const MAX_DATA_OFFSET: u32 = 64 * 1024;

const FLAG_AUDIO: u8 = 0b0000_0100;
const FLAG_VIDEO: u8 = 0b0000_0001;

/// The FLV file header, 9 bytes in total.
#[derive(Debug, Clone, PartialEq)]
pub struct FlvHeader {
    /// "FLV" as a 24-bit big-endian value.
    pub signature: u32,
    pub version: u8,
    pub has_audio: bool,
    pub has_video: bool,
    /// Length of the header, 9 for every file this crate writes.
    pub data_offset: u32,
}

impl Display for FlvHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FLV v{} audio={} video={} data_offset={}",
            self.version, self.has_audio, self.has_video, self.data_offset
        )
    }
}

impl FlvHeader {
    /// A version 1 header announcing the given tracks.
    pub fn new(has_audio: bool, has_video: bool) -> Self {
        FlvHeader {
            signature: FLV_SIGNATURE,
            version: 0x01,
            has_audio,
            has_video,
            data_offset: FLV_HEADER_SIZE as u32,
        }
    }

    /// The `TypeFlags` byte: bit 2 audio, bit 0 video.
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.has_audio {
            flags |= FLAG_AUDIO;
        }
        if self.has_video {
            flags |= FLAG_VIDEO;
        }
        flags
    }

    /// Parses the header and advances `reader` to `data_offset`.
    ///
    /// Fails on a wrong signature, a version other than 1, reserved flag bits,
    /// or an implausible `DataOffset`.
    pub fn parse<R: Read>(reader: &mut R) -> io::Result<Self> {
        let signature = reader.read_u24::<BigEndian>()?;
        if signature != FLV_SIGNATURE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid FLV signature",
            ));
        }

        let version = reader.read_u8()?;
        if version != 0x01 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported FLV version: {version}"),
            ));
        }

        let flags = reader.read_u8()?;
        if (flags & !(FLAG_AUDIO | FLAG_VIDEO)) != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid FLV header flags (reserved bits set): 0x{flags:02X}"),
            ));
        }

        let data_offset = reader.read_u32::<BigEndian>()?;
        if data_offset < FLV_HEADER_SIZE as u32 || data_offset > MAX_DATA_OFFSET {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid FLV DataOffset: {data_offset}"),
            ));
        }

        let extra = data_offset as u64 - FLV_HEADER_SIZE as u64;
        if extra > 0 {
            let skipped = io::copy(&mut reader.by_ref().take(extra), &mut io::sink())?;
            if skipped != extra {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Unexpected EOF while skipping extended FLV header bytes",
                ));
            }
        }

        Ok(FlvHeader {
            signature,
            version,
            has_audio: flags & FLAG_AUDIO != 0,
            has_video: flags & FLAG_VIDEO != 0,
            data_offset,
        })
    }
}
