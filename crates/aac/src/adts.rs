use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::config::{AudioObjectType, AudioSpecificConfig, SAMPLE_RATES};
use crate::error::AacError;

/// The 12-bit syncword that opens every ADTS header.
pub const ADTS_SYNC_WORD: u16 = 0xFFF;

const HEADER_LEN: usize = 7;
const CRC_LEN: usize = 2;
const MAX_FRAME_LENGTH: usize = (1 << 13) - 1;

/// ADTS fixed and variable header.
///
/// ISO/IEC 13818-7 - 6.2.1 / ISO/IEC 14496-3 - 1.A.2.2
///
/// ```text
/// syncword                  12 bits
/// ID                         1 bit   (0 = MPEG-4, 1 = MPEG-2)
/// layer                      2 bits  (always 0)
/// protection_absent          1 bit
/// profile_ObjectType         2 bits
/// sampling_frequency_index   4 bits
/// private_bit                1 bit
/// channel_configuration      3 bits
/// original_copy              1 bit
/// home                       1 bit
/// copyright_id_bit           1 bit
/// copyright_id_start         1 bit
/// aac_frame_length          13 bits  (header included)
/// adts_buffer_fullness      11 bits
/// number_of_raw_data_blocks  2 bits
/// crc_check                 16 bits  (only when protection_absent == 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// `ID` bit: `true` for MPEG-2 AAC.
    pub mpeg2: bool,
    /// `true` when no CRC follows the fixed header.
    pub protection_absent: bool,
    /// `profile_ObjectType`, the audio object type minus one.
    pub profile: u8,
    /// Index into [`SAMPLE_RATES`].
    pub sampling_frequency_index: u8,
    /// Channel configuration.
    pub channel_configuration: u8,
    /// Length of the whole frame, header included.
    pub frame_length: u16,
    /// `adts_buffer_fullness`; `0x7FF` signals a variable bitrate stream.
    pub buffer_fullness: u16,
    /// Number of raw data blocks in the frame, minus one.
    pub raw_data_blocks: u8,
}

impl AdtsHeader {
    /// Returns `true` when `data` starts with the ADTS syncword.
    pub fn is_adts(data: &[u8]) -> bool {
        data.len() >= 2 && data[0] == 0xFF && data[1] & 0xF0 == 0xF0
    }

    /// A header for an MPEG-4, CRC-less frame carrying `payload_len` bytes.
    pub fn for_payload(config: &AudioSpecificConfig, payload_len: usize) -> Result<Self, AacError> {
        let frame_length = HEADER_LEN + payload_len;
        if frame_length > MAX_FRAME_LENGTH {
            return Err(AacError::InvalidFrameLength(frame_length));
        }
        let object_type = u8::from(config.audio_object_type);
        if !(1..=4).contains(&object_type) {
            return Err(AacError::UnsupportedObjectType(object_type));
        }

        Ok(Self {
            mpeg2: false,
            protection_absent: true,
            profile: object_type - 1,
            sampling_frequency_index: config.sampling_frequency_index,
            channel_configuration: config.channel_configuration,
            frame_length: frame_length as u16,
            buffer_fullness: 0x7FF,
            raw_data_blocks: 0,
        })
    }

    /// Parses the header at the start of `data`.
    ///
    /// The frame length is checked against the header size but not against
    /// `data`; [`AdtsFrameIter`] does that.
    pub fn parse(data: &[u8]) -> Result<Self, AacError> {
        if !Self::is_adts(data) {
            return Err(AacError::MissingSyncWord { offset: 0 });
        }

        let protection_absent = data[1] & 0x01 != 0;
        let needed = if protection_absent {
            HEADER_LEN
        } else {
            HEADER_LEN + CRC_LEN
        };
        if data.len() < needed {
            return Err(AacError::TruncatedHeader {
                needed,
                available: data.len(),
            });
        }

        let frame_length = ((data[3] as u16 & 0x03) << 11)
            | ((data[4] as u16) << 3)
            | ((data[5] as u16) >> 5);
        if (frame_length as usize) < needed {
            return Err(AacError::InvalidFrameLength(frame_length as usize));
        }

        Ok(Self {
            mpeg2: data[1] & 0x08 != 0,
            protection_absent,
            profile: data[2] >> 6,
            sampling_frequency_index: (data[2] >> 2) & 0x0F,
            channel_configuration: ((data[2] & 0x01) << 2) | (data[3] >> 6),
            frame_length,
            buffer_fullness: ((data[5] as u16 & 0x1F) << 6) | ((data[6] as u16) >> 2),
            raw_data_blocks: data[6] & 0x03,
        })
    }

    /// Size of the header, CRC included.
    pub fn header_len(&self) -> usize {
        if self.protection_absent {
            HEADER_LEN
        } else {
            HEADER_LEN + CRC_LEN
        }
    }

    /// Size of the raw frame after the header.
    pub fn payload_len(&self) -> usize {
        self.frame_length as usize - self.header_len()
    }

    /// The MPEG-4 audio object type signalled by `profile`.
    pub fn audio_object_type(&self) -> AudioObjectType {
        AudioObjectType::from(self.profile + 1)
    }

    /// The sample rate, if the index is not reserved.
    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLE_RATES.get(self.sampling_frequency_index as usize).copied()
    }

    /// The equivalent `AudioSpecificConfig`.
    pub fn audio_specific_config(&self) -> Result<AudioSpecificConfig, AacError> {
        AudioSpecificConfig::from_indices(
            self.audio_object_type(),
            self.sampling_frequency_index,
            self.channel_configuration,
        )
    }

    /// Writes the header. A zero CRC is written when protection is present.
    pub fn build<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        let frame_length = self.frame_length & 0x1FFF;
        let buffer_fullness = self.buffer_fullness & 0x7FF;
        let header = [
            0xFF,
            0xF0 | ((self.mpeg2 as u8) << 3) | self.protection_absent as u8,
            ((self.profile & 0x03) << 6)
                | ((self.sampling_frequency_index & 0x0F) << 2)
                | ((self.channel_configuration >> 2) & 0x01),
            ((self.channel_configuration & 0x03) << 6) | (frame_length >> 11) as u8,
            (frame_length >> 3) as u8,
            (((frame_length & 0x07) as u8) << 5) | (buffer_fullness >> 6) as u8,
            (((buffer_fullness & 0x3F) as u8) << 2) | (self.raw_data_blocks & 0x03),
        ];
        writer.write_all(&header)?;
        if !self.protection_absent {
            writer.write_u16::<BigEndian>(0)?;
        }
        Ok(())
    }
}

/// One ADTS frame split into its header and raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsFrame<'a> {
    /// The parsed header.
    pub header: AdtsHeader,
    /// Offset of the header in the scanned buffer.
    pub offset: usize,
    /// The raw AAC frame, header and CRC stripped.
    pub payload: &'a [u8],
}

/// Iterator over the consecutive ADTS frames of a buffer.
///
/// Frames must be back to back; the iterator stops after the first error.
pub struct AdtsFrameIter<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> AdtsFrameIter<'a> {
    /// Creates an iterator over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            failed: false,
        }
    }

    fn next_frame(&self) -> Result<AdtsFrame<'a>, AacError> {
        let remaining = &self.data[self.offset..];
        let header = AdtsHeader::parse(remaining).map_err(|err| match err {
            AacError::MissingSyncWord { .. } => AacError::MissingSyncWord {
                offset: self.offset,
            },
            other => other,
        })?;

        let frame_length = header.frame_length as usize;
        if frame_length > remaining.len() {
            return Err(AacError::TruncatedFrame {
                frame_length,
                available: remaining.len(),
            });
        }
        if header.raw_data_blocks != 0 {
            return Err(AacError::MultipleRawDataBlocks {
                offset: self.offset,
                blocks: header.raw_data_blocks + 1,
            });
        }

        Ok(AdtsFrame {
            header,
            offset: self.offset,
            payload: &remaining[header.header_len()..frame_length],
        })
    }
}

impl<'a> Iterator for AdtsFrameIter<'a> {
    type Item = Result<AdtsFrame<'a>, AacError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        match self.next_frame() {
            Ok(frame) => {
                self.offset += frame.header.frame_length as usize;
                Some(Ok(frame))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
