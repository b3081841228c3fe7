//! VIDEODATA tag bodies, legacy (non-enhanced) layout.
//!
//! video_file_format_spec_v10_1.pdf - Annex E.4.3.1

use std::io;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes};
use bytes_util::BytesCursorExt;

use crate::error::FlvError;

const MAX_COMPOSITION_TIME: i32 = (1 << 23) - 1;
const MIN_COMPOSITION_TIME: i32 = -(1 << 23);

/// `FrameType`, the upper nibble of the first body byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VideoFrameType {
    KeyFrame = 1,
    InterFrame = 2,
    DisposableInterFrame = 3,
    GeneratedKeyFrame = 4,
    CommandFrame = 5,
}

impl TryFrom<u8> for VideoFrameType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            1 => Self::KeyFrame,
            2 => Self::InterFrame,
            3 => Self::DisposableInterFrame,
            4 => Self::GeneratedKeyFrame,
            5 => Self::CommandFrame,
            other => return Err(other),
        })
    }
}

/// `CodecID`, the lower nibble of the first body byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VideoCodecId {
    SorensonH263 = 2,
    ScreenVideo = 3,
    On2VP6 = 4,
    On2VP6WithAlpha = 5,
    ScreenVideoVersion2 = 6,
    Avc = 7,
}

impl TryFrom<u8> for VideoCodecId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            2 => Self::SorensonH263,
            3 => Self::ScreenVideo,
            4 => Self::On2VP6,
            5 => Self::On2VP6WithAlpha,
            6 => Self::ScreenVideoVersion2,
            7 => Self::Avc,
            other => return Err(other),
        })
    }
}

/// `AVCPacketType`, the second body byte of AVC tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AvcPacketType {
    /// The body is an `AVCDecoderConfigurationRecord`.
    SequenceHeader = 0,
    /// The body is one access unit of length-prefixed NAL units.
    Nalu = 1,
    /// Empty body marking the end of the stream.
    EndOfSequence = 2,
}

impl TryFrom<u8> for AvcPacketType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(Self::SequenceHeader),
            1 => Ok(Self::Nalu),
            2 => Ok(Self::EndOfSequence),
            other => Err(other),
        }
    }
}

/// The fixed fields in front of a video payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoTagHeader {
    pub frame_type: VideoFrameType,
    pub codec_id: VideoCodecId,
    /// Present only for AVC.
    pub avc_packet_type: Option<AvcPacketType>,
    /// Composition time offset in milliseconds (pts - dts), AVC only.
    pub composition_time: i32,
}

impl VideoTagHeader {
    /// Header of an AVC tag.
    ///
    /// Sequence headers are always keyframes with a zero composition time.
    pub fn avc(
        frame_type: VideoFrameType,
        packet_type: AvcPacketType,
        composition_time: i32,
    ) -> Result<Self, FlvError> {
        if !(MIN_COMPOSITION_TIME..=MAX_COMPOSITION_TIME).contains(&composition_time) {
            return Err(FlvError::CompositionTimeOutOfRange(composition_time));
        }
        Ok(Self {
            frame_type,
            codec_id: VideoCodecId::Avc,
            avc_packet_type: Some(packet_type),
            composition_time,
        })
    }

    pub fn size(&self) -> usize {
        if self.avc_packet_type.is_some() { 5 } else { 1 }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(((self.frame_type as u8) << 4) | self.codec_id as u8);
        if let Some(packet_type) = self.avc_packet_type {
            buf.put_u8(packet_type as u8);
            // SI24, two's complement
            let cts = self.composition_time as u32;
            buf.put_u8((cts >> 16) as u8);
            buf.put_u8((cts >> 8) as u8);
            buf.put_u8(cts as u8);
        }
    }

    pub fn demux(reader: &mut io::Cursor<Bytes>) -> io::Result<Self> {
        let byte = reader.read_u8()?;
        let frame_type = VideoFrameType::try_from(byte >> 4).map_err(|value| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown video frame type: {value}"),
            )
        })?;
        let codec_id = VideoCodecId::try_from(byte & 0x0F).map_err(|value| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported video codec id: {value}"),
            )
        })?;

        let (avc_packet_type, composition_time) = if codec_id == VideoCodecId::Avc {
            let packet_type = AvcPacketType::try_from(reader.read_u8()?).map_err(|value| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown AVC packet type: {value}"),
                )
            })?;
            // sign-extend the SI24
            let cts = (reader.read_u24::<BigEndian>()? << 8) as i32 >> 8;
            (Some(packet_type), cts)
        } else {
            (None, 0)
        };

        Ok(Self {
            frame_type,
            codec_id,
            avc_packet_type,
            composition_time,
        })
    }
}

/// A demuxed video tag body.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoData {
    pub header: VideoTagHeader,
    pub body: Bytes,
}

impl VideoData {
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> io::Result<Self> {
        let header = VideoTagHeader::demux(reader)?;
        Ok(Self {
            header,
            body: reader.extract_remaining(),
        })
    }

    pub fn is_sequence_header(&self) -> bool {
        self.header.avc_packet_type == Some(AvcPacketType::SequenceHeader)
    }

    pub fn is_key_frame(&self) -> bool {
        self.header.frame_type == VideoFrameType::KeyFrame
    }
}
