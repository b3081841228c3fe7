use std::fmt;

use bytes::{BufMut, Bytes};

use crate::error::H264Error;

/// NAL unit type, ITU-T H.264 Table 7-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalUnitType {
    /// Coded slice of a non-IDR picture.
    NonIdrSlice,
    /// Coded slice data partition A.
    SlicePartitionA,
    /// Coded slice data partition B.
    SlicePartitionB,
    /// Coded slice data partition C.
    SlicePartitionC,
    /// Coded slice of an IDR picture.
    IdrSlice,
    /// Supplemental enhancement information.
    Sei,
    /// Sequence parameter set.
    Sps,
    /// Picture parameter set.
    Pps,
    /// Access unit delimiter.
    AccessUnitDelimiter,
    /// End of sequence.
    EndOfSequence,
    /// End of stream.
    EndOfStream,
    /// Filler data.
    FillerData,
    /// Sequence parameter set extension.
    SpsExtension,
    /// Any other value (unspecified, reserved or extension types).
    Other(u8),
}

impl From<u8> for NalUnitType {
    fn from(value: u8) -> Self {
        match value & 0x1F {
            1 => Self::NonIdrSlice,
            2 => Self::SlicePartitionA,
            3 => Self::SlicePartitionB,
            4 => Self::SlicePartitionC,
            5 => Self::IdrSlice,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::AccessUnitDelimiter,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SpsExtension,
            other => Self::Other(other),
        }
    }
}

impl From<NalUnitType> for u8 {
    fn from(value: NalUnitType) -> Self {
        match value {
            NalUnitType::NonIdrSlice => 1,
            NalUnitType::SlicePartitionA => 2,
            NalUnitType::SlicePartitionB => 3,
            NalUnitType::SlicePartitionC => 4,
            NalUnitType::IdrSlice => 5,
            NalUnitType::Sei => 6,
            NalUnitType::Sps => 7,
            NalUnitType::Pps => 8,
            NalUnitType::AccessUnitDelimiter => 9,
            NalUnitType::EndOfSequence => 10,
            NalUnitType::EndOfStream => 11,
            NalUnitType::FillerData => 12,
            NalUnitType::SpsExtension => 13,
            NalUnitType::Other(value) => value,
        }
    }
}

impl NalUnitType {
    /// SPS or PPS.
    pub fn is_parameter_set(self) -> bool {
        matches!(self, Self::Sps | Self::Pps)
    }

    /// Coded slice data (VCL NAL unit types 1 to 5).
    pub fn is_slice(self) -> bool {
        matches!(
            self,
            Self::NonIdrSlice
                | Self::SlicePartitionA
                | Self::SlicePartitionB
                | Self::SlicePartitionC
                | Self::IdrSlice
        )
    }

    /// An IDR slice, i.e. a keyframe.
    pub fn is_keyframe(self) -> bool {
        self == Self::IdrSlice
    }
}

impl fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(value) => write!(f, "Other({value})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A NAL unit borrowed from an Annex-B buffer, header byte included, start
/// code and trailing zero bytes excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    offset: usize,
    data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// Offset of the NAL header byte in the scanned buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The NAL unit bytes, starting with the header byte.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The type from the low five bits of the header byte.
    pub fn nal_type(&self) -> NalUnitType {
        NalUnitType::from(self.data[0])
    }

    /// `nal_ref_idc` from bits 5 and 6 of the header byte.
    pub fn nal_ref_idc(&self) -> u8 {
        (self.data[0] >> 5) & 0x03
    }

    /// Copies the unit into an owned buffer.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.data)
    }
}

/// Iterator over the NAL units of an Annex-B byte stream.
///
/// Both 3-byte (`00 00 01`) and 4-byte (`00 00 00 01`) start codes are
/// accepted; zero bytes before the first start code and after each unit are
/// skipped. Any other byte before the first start code is an error. The
/// iterator stops after the first error.
pub struct AnnexBNalIter<'a> {
    data: &'a [u8],
    state: ScanState,
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    Start,
    /// Position just past the next start code.
    Unit(usize),
    Done,
}

impl<'a> AnnexBNalIter<'a> {
    /// Creates an iterator over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            state: ScanState::Start,
        }
    }

    /// Returns `true` when `data` begins with a start code, after optional leading zeros.
    pub fn is_annex_b(data: &[u8]) -> bool {
        first_unit_start(data).is_some()
    }
}

impl<'a> Iterator for AnnexBNalIter<'a> {
    type Item = Result<NalUnit<'a>, H264Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = match self.state {
            ScanState::Done => return None,
            ScanState::Unit(start) => start,
            ScanState::Start => match first_unit_start(self.data) {
                Some(start) => start,
                None => {
                    self.state = ScanState::Done;
                    return Some(Err(H264Error::MissingStartCode));
                }
            },
        };

        let end = match find_start_code(self.data, start) {
            Some(pos) => {
                self.state = ScanState::Unit(pos + 3);
                pos
            }
            None => {
                self.state = ScanState::Done;
                self.data.len()
            }
        };

        let mut unit_end = end;
        while unit_end > start && self.data[unit_end - 1] == 0 {
            unit_end -= 1;
        }

        if unit_end == start {
            self.state = ScanState::Done;
            return Some(Err(H264Error::TruncatedNalHeader { offset: start - 3 }));
        }

        let data = &self.data[start..unit_end];
        if data[0] & 0x80 != 0 {
            self.state = ScanState::Done;
            return Some(Err(H264Error::ForbiddenBit { offset: start }));
        }

        Some(Ok(NalUnit {
            offset: start,
            data,
        }))
    }
}

/// Position just past the first start code, if only zeros precede it.
fn first_unit_start(data: &[u8]) -> Option<usize> {
    let pos = find_start_code(data, 0)?;
    data[..pos].iter().all(|b| *b == 0).then_some(pos + 3)
}

/// Position of the first `00 00 01` at or after `from`.
fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < 3 || from > data.len() - 3 {
        return None;
    }
    data[from..]
        .windows(3)
        .position(|w| w == [0, 0, 1])
        .map(|pos| from + pos)
}

/// Writes each unit prefixed by its length as a 32-bit big-endian integer,
/// the layout of AVC video tag payloads and ISO BMFF samples.
///
/// Returns the number of bytes written.
pub fn write_length_prefixed<'a>(
    units: impl IntoIterator<Item = &'a NalUnit<'a>>,
    out: &mut impl BufMut,
) -> usize {
    let mut written = 0;
    for unit in units {
        out.put_u32(unit.data.len() as u32);
        out.put_slice(unit.data);
        written += 4 + unit.data.len();
    }
    written
}
