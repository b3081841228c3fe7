use std::io;

use byteorder::WriteBytesExt;

use crate::error::AacError;

/// Sampling frequencies indexed by `sampling_frequency_index`.
///
/// ISO/IEC 14496-3 - Table 1.18. Indices 13 and 14 are reserved, 15 escapes
/// to an explicit 24-bit frequency.
pub const SAMPLE_RATES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

/// PCM samples per channel carried by one AAC frame.
pub const SAMPLES_PER_FRAME: u32 = 1024;

/// Looks up the table index of a sample rate.
pub fn sampling_frequency_index(sample_rate: u32) -> Option<u8> {
    SAMPLE_RATES
        .iter()
        .position(|rate| *rate == sample_rate)
        .map(|index| index as u8)
}

/// MPEG-4 audio object type.
///
/// ISO/IEC 14496-3 - Table 1.17. Only the types a two-byte config can carry
/// are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioObjectType {
    /// AAC Main.
    AacMain,
    /// AAC Low Complexity, what hardware encoders produce.
    AacLowComplexity,
    /// AAC Scalable Sample Rate.
    AacScalableSampleRate,
    /// AAC Long Term Prediction.
    AacLongTermPrediction,
    /// Any other type below 31.
    Other(u8),
}

impl From<u8> for AudioObjectType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::AacMain,
            2 => Self::AacLowComplexity,
            3 => Self::AacScalableSampleRate,
            4 => Self::AacLongTermPrediction,
            other => Self::Other(other),
        }
    }
}

impl From<AudioObjectType> for u8 {
    fn from(value: AudioObjectType) -> Self {
        match value {
            AudioObjectType::AacMain => 1,
            AudioObjectType::AacLowComplexity => 2,
            AudioObjectType::AacScalableSampleRate => 3,
            AudioObjectType::AacLongTermPrediction => 4,
            AudioObjectType::Other(value) => value,
        }
    }
}

/// The two-byte `AudioSpecificConfig` carried by the AAC sequence header tag.
///
/// ISO/IEC 14496-3 - 1.6.2.1
///
/// ```text
/// audioObjectType         5 bits
/// samplingFrequencyIndex  4 bits
/// channelConfiguration    4 bits
/// GASpecificConfig        3 bits (all zero)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    /// The audio object type.
    pub audio_object_type: AudioObjectType,
    /// Index into [`SAMPLE_RATES`].
    pub sampling_frequency_index: u8,
    /// Channel configuration, 1 to 7.
    pub channel_configuration: u8,
}

impl AudioSpecificConfig {
    /// Describes a stream from its sample rate and channel count.
    pub fn new(
        audio_object_type: AudioObjectType,
        sample_rate: u32,
        channels: u8,
    ) -> Result<Self, AacError> {
        let sampling_frequency_index =
            sampling_frequency_index(sample_rate).ok_or(AacError::UnsupportedSampleRate(sample_rate))?;
        Self::from_indices(audio_object_type, sampling_frequency_index, channels)
    }

    /// Builds a config from raw field values, validating each.
    pub fn from_indices(
        audio_object_type: AudioObjectType,
        sampling_frequency_index: u8,
        channel_configuration: u8,
    ) -> Result<Self, AacError> {
        let object_type = u8::from(audio_object_type);
        if object_type == 0 || object_type >= 31 {
            return Err(AacError::UnsupportedObjectType(object_type));
        }
        if sampling_frequency_index as usize >= SAMPLE_RATES.len() {
            return Err(AacError::InvalidSamplingIndex(sampling_frequency_index));
        }
        if !(1..=7).contains(&channel_configuration) {
            return Err(AacError::UnsupportedChannels(channel_configuration));
        }

        Ok(Self {
            audio_object_type,
            sampling_frequency_index,
            channel_configuration,
        })
    }

    /// Parses the leading two bytes of a config.
    ///
    /// Extension data after the `GASpecificConfig` bits (SBR/PS signalling)
    /// is ignored.
    pub fn parse(data: &[u8]) -> Result<Self, AacError> {
        let &[first, second, ..] = data else {
            return Err(AacError::ConfigTooShort(data.len()));
        };

        let object_type = first >> 3;
        let sampling_frequency_index = ((first & 0x07) << 1) | (second >> 7);
        let channel_configuration = (second >> 3) & 0x0F;

        Self::from_indices(
            AudioObjectType::from(object_type),
            sampling_frequency_index,
            channel_configuration,
        )
    }

    /// The sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.sampling_frequency_index as usize]
    }

    /// Duration of one frame in milliseconds, rounded down.
    pub fn frame_duration_ms(&self) -> u32 {
        SAMPLES_PER_FRAME * 1000 / self.sample_rate()
    }

    /// The serialized config.
    pub fn to_bytes(&self) -> [u8; 2] {
        let object_type = u8::from(self.audio_object_type);
        [
            (object_type << 3) | (self.sampling_frequency_index >> 1),
            ((self.sampling_frequency_index & 0x01) << 7) | (self.channel_configuration << 3),
        ]
    }

    /// Writes the serialized config.
    pub fn build<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        for byte in self.to_bytes() {
            writer.write_u8(byte)?;
        }
        Ok(())
    }
}
