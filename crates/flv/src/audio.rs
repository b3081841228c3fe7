//! AUDIODATA tag bodies.
//!
//! video_file_format_spec_v10_1.pdf - Annex E.4.2.1

use std::io;

use byteorder::ReadBytesExt;
use bytes::{BufMut, Bytes};
use bytes_util::BytesCursorExt;

/// `SoundFormat`, the upper nibble of the first body byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundFormat {
    LinearPcmPlatformEndian = 0,
    Adpcm = 1,
    Mp3 = 2,
    LinearPcmLittleEndian = 3,
    Nellymoser16KhzMono = 4,
    Nellymoser8KhzMono = 5,
    Nellymoser = 6,
    G711ALaw = 7,
    G711MuLaw = 8,
    Aac = 10,
    Speex = 11,
    Mp3_8Khz = 14,
    DeviceSpecific = 15,
}

impl TryFrom<u8> for SoundFormat {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            0 => Self::LinearPcmPlatformEndian,
            1 => Self::Adpcm,
            2 => Self::Mp3,
            3 => Self::LinearPcmLittleEndian,
            4 => Self::Nellymoser16KhzMono,
            5 => Self::Nellymoser8KhzMono,
            6 => Self::Nellymoser,
            7 => Self::G711ALaw,
            8 => Self::G711MuLaw,
            10 => Self::Aac,
            11 => Self::Speex,
            14 => Self::Mp3_8Khz,
            15 => Self::DeviceSpecific,
            other => return Err(other),
        })
    }
}

/// `SoundRate`, two bits. AAC streams always signal `Hz44000`; the real
/// rate is in the `AudioSpecificConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundRate {
    Hz5500 = 0,
    Hz11000 = 1,
    Hz22000 = 2,
    Hz44000 = 3,
}

impl From<u8> for SoundRate {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Hz5500,
            1 => Self::Hz11000,
            2 => Self::Hz22000,
            _ => Self::Hz44000,
        }
    }
}

/// `SoundSize`: 8 or 16 bits per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundSize {
    Bits8 = 0,
    Bits16 = 1,
}

/// `SoundType`: mono or stereo. AAC streams always signal `Stereo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundType {
    Mono = 0,
    Stereo = 1,
}

/// `AACPacketType`, the second body byte of AAC tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AacPacketType {
    /// The body is an `AudioSpecificConfig`.
    SequenceHeader = 0,
    /// The body is one raw AAC frame.
    Raw = 1,
}

impl TryFrom<u8> for AacPacketType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(Self::SequenceHeader),
            1 => Ok(Self::Raw),
            other => Err(other),
        }
    }
}

/// The fixed fields in front of an audio payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTagHeader {
    pub sound_format: SoundFormat,
    pub sound_rate: SoundRate,
    pub sound_size: SoundSize,
    pub sound_type: SoundType,
    /// Present only for AAC.
    pub aac_packet_type: Option<AacPacketType>,
}

impl AudioTagHeader {
    /// Header of an AAC tag: 44 kHz, 16-bit, stereo, whatever the stream is.
    pub fn aac(packet_type: AacPacketType) -> Self {
        Self {
            sound_format: SoundFormat::Aac,
            sound_rate: SoundRate::Hz44000,
            sound_size: SoundSize::Bits16,
            sound_type: SoundType::Stereo,
            aac_packet_type: Some(packet_type),
        }
    }

    pub fn size(&self) -> usize {
        if self.aac_packet_type.is_some() { 2 } else { 1 }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(
            ((self.sound_format as u8) << 4)
                | ((self.sound_rate as u8) << 2)
                | ((self.sound_size as u8) << 1)
                | self.sound_type as u8,
        );
        if let Some(packet_type) = self.aac_packet_type {
            buf.put_u8(packet_type as u8);
        }
    }

    pub fn demux(reader: &mut io::Cursor<Bytes>) -> io::Result<Self> {
        let byte = reader.read_u8()?;
        let sound_format = SoundFormat::try_from(byte >> 4).map_err(|format| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown sound format: {format}"),
            )
        })?;

        let aac_packet_type = if sound_format == SoundFormat::Aac {
            let value = reader.read_u8()?;
            Some(AacPacketType::try_from(value).map_err(|value| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown AAC packet type: {value}"),
                )
            })?)
        } else {
            None
        };

        Ok(Self {
            sound_format,
            sound_rate: SoundRate::from(byte >> 2),
            sound_size: if byte & 0x02 != 0 {
                SoundSize::Bits16
            } else {
                SoundSize::Bits8
            },
            sound_type: if byte & 0x01 != 0 {
                SoundType::Stereo
            } else {
                SoundType::Mono
            },
            aac_packet_type,
        })
    }
}

/// A demuxed audio tag body.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub header: AudioTagHeader,
    pub body: Bytes,
}

impl AudioData {
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> io::Result<Self> {
        let header = AudioTagHeader::demux(reader)?;
        Ok(Self {
            header,
            body: reader.extract_remaining(),
        })
    }

    pub fn is_sequence_header(&self) -> bool {
        self.header.aac_packet_type == Some(AacPacketType::SequenceHeader)
    }
}
