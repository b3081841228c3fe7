use std::fmt;
use std::io::{self, Read};

use bytes::{Buf, Bytes};
use bytes_util::BytesCursorExt;

use crate::audio::{AacPacketType, AudioData, SoundFormat};
use crate::error::FlvError;
use crate::framing;
use crate::script::ScriptData;
use crate::video::{AvcPacketType, VideoData, VideoFrameType};

/// An FLV Tag with a `Bytes` payload buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FlvTag {
    /// A timestamp in milliseconds
    pub timestamp_ms: u32,
    /// A stream id, always 0 in valid files
    pub stream_id: u32,
    /// The type of the tag
    pub tag_type: FlvTagType,
    /// Filter bit of the tag header (encrypted payload).
    pub is_filtered: bool,
    /// Copy free buffer
    pub data: Bytes,
}

impl FlvTag {
    /// Reads one tag (header and body, no `PreviousTagSize`) from `reader`.
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> io::Result<FlvTag> {
        let mut header_bytes = [0u8; framing::TAG_HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;
        let header = framing::parse_tag_header_bytes(header_bytes);

        if reader.remaining() < header.data_size as usize {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Not enough bytes to read for tag type {}. Expected {} bytes, got {} bytes",
                    header.tag_type,
                    header.data_size,
                    reader.remaining()
                ),
            ));
        }

        let data = reader.extract_bytes(header.data_size as usize)?;

        Ok(FlvTag {
            timestamp_ms: header.timestamp_ms,
            stream_id: header.stream_id,
            tag_type: header.tag_type,
            is_filtered: header.is_filtered,
            data,
        })
    }

    /// Size of the tag on disk, header included, `PreviousTagSize` excluded.
    pub fn size(&self) -> usize {
        self.data.len() + framing::TAG_HEADER_SIZE
    }

    pub fn is_script_tag(&self) -> bool {
        matches!(self.tag_type, FlvTagType::ScriptData)
    }

    pub fn is_audio_tag(&self) -> bool {
        matches!(self.tag_type, FlvTagType::Audio)
    }

    pub fn is_video_tag(&self) -> bool {
        matches!(self.tag_type, FlvTagType::Video)
    }

    pub fn is_key_frame(&self) -> bool {
        !self.is_filtered
            && self.is_video_tag()
            && self
                .data
                .first()
                .is_some_and(|b| b >> 4 == VideoFrameType::KeyFrame as u8)
    }

    /// AVC sequence header: codec id 7, packet type 0.
    pub fn is_video_sequence_header(&self) -> bool {
        !self.is_filtered
            && self.is_video_tag()
            && self.data.len() >= 2
            && self.data[0] & 0x0F == 7
            && self.data[1] == AvcPacketType::SequenceHeader as u8
    }

    /// AAC sequence header: sound format 10, packet type 0.
    pub fn is_audio_sequence_header(&self) -> bool {
        !self.is_filtered
            && self.is_audio_tag()
            && self.data.len() >= 2
            && self.data[0] >> 4 == SoundFormat::Aac as u8
            && self.data[1] == AacPacketType::SequenceHeader as u8
    }

    fn check_type(&self, expected: FlvTagType) -> Result<(), FlvError> {
        if self.is_filtered {
            return Err(FlvError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "cannot decode filtered/encrypted FLV tag payload",
            )));
        }
        if self.tag_type != expected {
            return Err(FlvError::UnexpectedTagType {
                expected,
                got: self.tag_type,
            });
        }
        Ok(())
    }

    pub fn decode_audio(&self) -> Result<AudioData, FlvError> {
        self.check_type(FlvTagType::Audio)?;
        Ok(AudioData::demux(&mut io::Cursor::new(self.data.clone()))?)
    }

    pub fn decode_video(&self) -> Result<VideoData, FlvError> {
        self.check_type(FlvTagType::Video)?;
        Ok(VideoData::demux(&mut io::Cursor::new(self.data.clone()))?)
    }

    pub fn decode_script(&self) -> Result<ScriptData, FlvError> {
        self.check_type(FlvTagType::ScriptData)?;
        ScriptData::demux(&mut io::Cursor::new(self.data.clone()))
    }
}

/// FLV Tag Type
///
/// Defined by:
/// - video_file_format_spec_v10.pdf (Chapter 1 - The FLV File Format - FLV tags)
/// - video_file_format_spec_v10_1.pdf (Annex E.4.1 - FLV Tag)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    Audio,
    Video,
    ScriptData,
    Unknown(u8),
}

impl From<u8> for FlvTagType {
    fn from(value: u8) -> Self {
        match value {
            8 => FlvTagType::Audio,
            9 => FlvTagType::Video,
            18 => FlvTagType::ScriptData,
            _ => FlvTagType::Unknown(value),
        }
    }
}

impl From<FlvTagType> for u8 {
    fn from(value: FlvTagType) -> Self {
        match value {
            FlvTagType::Audio => 8,
            FlvTagType::Video => 9,
            FlvTagType::ScriptData => 18,
            FlvTagType::Unknown(val) => val,
        }
    }
}

impl fmt::Display for FlvTagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlvTagType::Audio => write!(f, "Audio"),
            FlvTagType::Video => write!(f, "Video"),
            FlvTagType::ScriptData => write!(f, "Script"),
            FlvTagType::Unknown(value) => write!(f, "Unknown({value})"),
        }
    }
}
