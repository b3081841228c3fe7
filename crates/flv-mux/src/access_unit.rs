use std::fmt;
use std::ops::BitOr;

use crate::error::{MuxError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Buffer flags as reported by the encoder.
///
/// The bit values are those of Android's `MediaCodec.BufferInfo.flags`, so
/// the flags can be passed through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AccessUnitFlags(u32);

impl AccessUnitFlags {
    pub const NONE: Self = Self(0);
    pub const KEY_FRAME: Self = Self(1);
    /// The buffer holds codec configuration (SPS/PPS or an AudioSpecificConfig), not media.
    pub const CODEC_CONFIG: Self = Self(2);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AccessUnitFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One encoded access unit, borrowed from the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessUnit<'a> {
    pub data: &'a [u8],
    pub track: TrackKind,
    pub flags: AccessUnitFlags,
    /// Presentation timestamp in the configured [`TimestampUnit`](crate::TimestampUnit).
    pub pts: u64,
    /// Decode timestamp; equal to `pts` when absent.
    pub dts: Option<u64>,
}

impl<'a> AccessUnit<'a> {
    pub fn video(data: &'a [u8], pts: u64) -> Self {
        Self {
            data,
            track: TrackKind::Video,
            flags: AccessUnitFlags::NONE,
            pts,
            dts: None,
        }
    }

    pub fn audio(data: &'a [u8], pts: u64) -> Self {
        Self {
            data,
            track: TrackKind::Audio,
            flags: AccessUnitFlags::NONE,
            pts,
            dts: None,
        }
    }

    /// Views `size` bytes at `offset` of an encoder output buffer.
    pub fn from_buffer(
        buffer: &'a [u8],
        offset: usize,
        size: usize,
        track: TrackKind,
        flags: AccessUnitFlags,
        pts: u64,
    ) -> Result<Self> {
        let data = offset
            .checked_add(size)
            .and_then(|end| buffer.get(offset..end))
            .ok_or_else(|| {
                MuxError::malformed(format!(
                    "window {offset}+{size} outside buffer of {} bytes",
                    buffer.len()
                ))
            })?;

        Ok(Self {
            data,
            track,
            flags,
            pts,
            dts: None,
        })
    }

    pub fn with_flags(mut self, flags: AccessUnitFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_dts(mut self, dts: u64) -> Self {
        self.dts = Some(dts);
        self
    }

    pub fn is_codec_config(&self) -> bool {
        self.flags.contains(AccessUnitFlags::CODEC_CONFIG)
    }
}
