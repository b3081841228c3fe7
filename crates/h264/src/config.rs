use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use bytes_util::BytesCursorExt;

use crate::error::H264Error;

/// AVC (H.264) Decoder Configuration Record
///
/// ISO/IEC 14496-15:2022(E) - 5.3.2.1.2
///
/// The record FLV carries in the `AVCPacketType = 0` (sequence header) video
/// tag. Parameter sets are stored without start codes, each prefixed by a
/// 16-bit length.
#[derive(Debug, Clone, PartialEq)]
pub struct AVCDecoderConfigurationRecord {
    /// Always 1.
    pub configuration_version: u8,
    /// `profile_idc` of the SPS.
    pub profile_indication: u8,
    /// The constraint flags byte of the SPS.
    pub profile_compatibility: u8,
    /// `level_idc` of the SPS.
    pub level_indication: u8,
    /// Size of the NAL length prefix in samples, minus one.
    pub length_size_minus_one: u8,
    /// Sequence parameter sets, NAL header included.
    pub sps: Vec<Bytes>,
    /// Picture parameter sets, NAL header included.
    pub pps: Vec<Bytes>,
}

impl AVCDecoderConfigurationRecord {
    /// Builds a record from captured parameter sets.
    ///
    /// Profile, compatibility and level are read from bytes 1 to 3 of the
    /// first SPS. The NAL length size is 4 bytes.
    pub fn from_parameter_sets(sps: Vec<Bytes>, pps: Vec<Bytes>) -> Result<Self, H264Error> {
        if sps.is_empty() || pps.is_empty() {
            return Err(H264Error::MissingParameterSets {
                sps: sps.len(),
                pps: pps.len(),
            });
        }

        if sps.len() > 0x1F {
            return Err(H264Error::TooManyParameterSets(sps.len()));
        }
        if pps.len() > 0xFF {
            return Err(H264Error::TooManyParameterSets(pps.len()));
        }

        if let Some(ps) = sps.iter().chain(pps.iter()).find(|ps| ps.len() > u16::MAX as usize) {
            return Err(H264Error::ParameterSetTooLarge(ps.len()));
        }

        let first = &sps[0];
        if first.len() < 4 {
            return Err(H264Error::TruncatedSps(first.len()));
        }

        Ok(Self {
            configuration_version: 1,
            profile_indication: first[1],
            profile_compatibility: first[2],
            level_indication: first[3],
            length_size_minus_one: 3,
            sps,
            pps,
        })
    }

    /// Parses a record.
    ///
    /// Trailing bytes (the chroma/bit-depth extension of high profiles) are
    /// left unread.
    pub fn parse(reader: &mut io::Cursor<Bytes>) -> io::Result<Self> {
        let configuration_version = reader.read_u8()?;
        if configuration_version != 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported AVC configuration version: {configuration_version}"),
            ));
        }

        let profile_indication = reader.read_u8()?;
        let profile_compatibility = reader.read_u8()?;
        let level_indication = reader.read_u8()?;
        let length_size_minus_one = reader.read_u8()? & 0b0000_0011;

        let num_of_sps = reader.read_u8()? & 0b0001_1111;
        let mut sps = Vec::with_capacity(num_of_sps as usize);
        for _ in 0..num_of_sps {
            let len = reader.read_u16::<BigEndian>()?;
            sps.push(reader.extract_bytes(len as usize)?);
        }

        let num_of_pps = reader.read_u8()?;
        let mut pps = Vec::with_capacity(num_of_pps as usize);
        for _ in 0..num_of_pps {
            let len = reader.read_u16::<BigEndian>()?;
            pps.push(reader.extract_bytes(len as usize)?);
        }

        Ok(Self {
            configuration_version,
            profile_indication,
            profile_compatibility,
            level_indication,
            length_size_minus_one,
            sps,
            pps,
        })
    }

    /// Size of the serialized record in bytes.
    pub fn size(&self) -> u64 {
        7 + self
            .sps
            .iter()
            .chain(self.pps.iter())
            .map(|ps| 2 + ps.len() as u64)
            .sum::<u64>()
    }

    /// Serializes the record.
    pub fn build<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(self.configuration_version)?;
        writer.write_u8(self.profile_indication)?;
        writer.write_u8(self.profile_compatibility)?;
        writer.write_u8(self.level_indication)?;
        // 6 reserved bits set to 1
        writer.write_u8(0b1111_1100 | (self.length_size_minus_one & 0b11))?;

        // 3 reserved bits set to 1
        writer.write_u8(0b1110_0000 | (self.sps.len() as u8 & 0b1_1111))?;
        for sps in &self.sps {
            writer.write_u16::<BigEndian>(sps.len() as u16)?;
            writer.write_all(sps)?;
        }

        writer.write_u8(self.pps.len() as u8)?;
        for pps in &self.pps {
            writer.write_u16::<BigEndian>(pps.len() as u16)?;
            writer.write_all(pps)?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    const SPS: &[u8] = &[
        0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9, 0x40, 0x50, 0x05, 0xBB, 0x01, 0x10,
    ];
    const PPS: &[u8] = &[0x68, 0xEB, 0xE3, 0xCB, 0x22, 0xC0];

    fn record() -> AVCDecoderConfigurationRecord {
        AVCDecoderConfigurationRecord::from_parameter_sets(
            vec![Bytes::from_static(SPS)],
            vec![Bytes::from_static(PPS)],
        )
        .unwrap()
    }

    #[test]
    fn test_from_parameter_sets() {
        let config = record();
        assert_eq!(config.configuration_version, 1);
        assert_eq!(config.profile_indication, 100);
        assert_eq!(config.profile_compatibility, 0);
        assert_eq!(config.level_indication, 31);
        assert_eq!(config.length_size_minus_one, 3);
    }

    #[test]
    fn test_build_layout() {
        let config = record();
        let mut buf = Vec::new();
        config.build(&mut buf).unwrap();

        assert_eq!(buf.len() as u64, config.size());
        assert_eq!(&buf[..6], &[0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1]);
        assert_eq!(&buf[6..8], &(SPS.len() as u16).to_be_bytes());
        assert_eq!(&buf[8..8 + SPS.len()], SPS);
        let pps_start = 8 + SPS.len();
        assert_eq!(buf[pps_start], 0x01);
        assert_eq!(&buf[pps_start + 3..], PPS);
    }

    #[test]
    fn test_parameter_sets_survive_build_and_parse() {
        let config = record();
        let mut buf = Vec::new();
        config.build(&mut buf).unwrap();

        let parsed = AVCDecoderConfigurationRecord::parse(&mut io::Cursor::new(buf.into())).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.sps[0].as_ref(), SPS);
        assert_eq!(parsed.pps[0].as_ref(), PPS);
    }

    #[test]
    fn test_parse_ignores_high_profile_extension() {
        let mut buf = Vec::new();
        record().build(&mut buf).unwrap();
        buf.extend_from_slice(&[0xFD, 0xF8, 0xF8, 0x00]);

        let parsed = AVCDecoderConfigurationRecord::parse(&mut io::Cursor::new(buf.into())).unwrap();
        assert_eq!(parsed, record());
    }

    #[test]
    fn test_parse_rejects_truncated_record() {
        let mut buf = Vec::new();
        record().build(&mut buf).unwrap();
        buf.truncate(10);

        let err = AVCDecoderConfigurationRecord::parse(&mut io::Cursor::new(buf.into())).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_missing_and_invalid_parameter_sets() {
        let err = AVCDecoderConfigurationRecord::from_parameter_sets(
            vec![Bytes::from_static(SPS)],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, H264Error::MissingParameterSets { sps: 1, pps: 0 }));

        let err = AVCDecoderConfigurationRecord::from_parameter_sets(
            vec![Bytes::from_static(&[0x67, 0x42])],
            vec![Bytes::from_static(PPS)],
        )
        .unwrap_err();
        assert!(matches!(err, H264Error::TruncatedSps(2)));
    }
}
