//! Muxer configuration.
//!
//! [`MuxerOptions`] is a flat, camelCase structure in which every field has a
//! default. Both historical configuration shapes deserialize into it: the
//! minimal one (`videoWidth`, `videoHeight`, `audioSampleRate`,
//! `audioNumChannels`) and the extended one that adds frame rate, bit rates
//! and the output format name.

use std::fmt;

use aac::{AudioObjectType, sampling_frequency_index};
use serde::{Deserialize, Serialize};

use crate::error::{MuxError, Result};

/// Container profile selecting the tag layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Flv,
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flv => write!(f, "flv"),
        }
    }
}

/// Unit of the timestamps passed with access units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    #[default]
    Milliseconds,
    /// Device encoders such as Android's `MediaCodec` stamp buffers in µs.
    Microseconds,
}

impl TimestampUnit {
    pub(crate) fn to_millis(self, value: u64) -> u64 {
        match self {
            Self::Milliseconds => value,
            Self::Microseconds => value / 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MuxerOptions {
    #[serde(alias = "outputFormatName")]
    pub container_format_name: ContainerFormat,

    pub video_enabled: bool,
    pub video_width: u32,
    pub video_height: u32,
    #[serde(alias = "videoFps")]
    pub video_frame_rate: u32,
    pub video_bit_rate: u32,

    pub audio_enabled: bool,
    pub audio_sample_rate: u32,
    #[serde(alias = "audioNumChannels")]
    pub audio_channel_count: u8,
    pub audio_bit_rate: u32,
    /// MPEG-4 audio object type, 2 for AAC-LC.
    pub audio_object_type: u8,

    pub timestamp_unit: TimestampUnit,
}

impl Default for MuxerOptions {
    fn default() -> Self {
        Self {
            container_format_name: ContainerFormat::Flv,
            video_enabled: true,
            video_width: 720,
            video_height: 1280,
            video_frame_rate: 30,
            video_bit_rate: 1_500_000,
            audio_enabled: true,
            audio_sample_rate: 44_100,
            audio_channel_count: 1,
            audio_bit_rate: 128_000,
            audio_object_type: 2,
            timestamp_unit: TimestampUnit::Milliseconds,
        }
    }
}

/// Video track parameters, resolved from [`MuxerOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoTrackConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub bit_rate: u32,
}

/// Audio track parameters, resolved from [`MuxerOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTrackConfig {
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_rate: u32,
    pub object_type: AudioObjectType,
}

impl MuxerOptions {
    /// Options with only the video track enabled.
    pub fn video_only() -> Self {
        Self {
            audio_enabled: false,
            ..Self::default()
        }
    }

    /// Options with only the audio track enabled.
    pub fn audio_only() -> Self {
        Self {
            video_enabled: false,
            ..Self::default()
        }
    }

    pub fn video(&self) -> Option<VideoTrackConfig> {
        self.video_enabled.then_some(VideoTrackConfig {
            width: self.video_width,
            height: self.video_height,
            frame_rate: self.video_frame_rate,
            bit_rate: self.video_bit_rate,
        })
    }

    pub fn audio(&self) -> Option<AudioTrackConfig> {
        self.audio_enabled.then_some(AudioTrackConfig {
            sample_rate: self.audio_sample_rate,
            channels: self.audio_channel_count,
            bit_rate: self.audio_bit_rate,
            object_type: AudioObjectType::from(self.audio_object_type),
        })
    }

    /// Checks the values the container and codec records depend on.
    ///
    /// Bit rates are informational and may be zero.
    pub fn validate(&self) -> Result<()> {
        if !self.video_enabled && !self.audio_enabled {
            return Err(MuxError::unsupported("at least one track must be enabled"));
        }

        if self.video_enabled {
            if self.video_width == 0 || self.video_height == 0 {
                return Err(MuxError::unsupported(format!(
                    "invalid video dimensions {}x{}",
                    self.video_width, self.video_height
                )));
            }
            if self.video_frame_rate == 0 {
                return Err(MuxError::unsupported("video frame rate must be positive"));
            }
        }

        if self.audio_enabled {
            if sampling_frequency_index(self.audio_sample_rate).is_none() {
                return Err(MuxError::unsupported(format!(
                    "unsupported audio sample rate {} Hz",
                    self.audio_sample_rate
                )));
            }
            if !(1..=7).contains(&self.audio_channel_count) {
                return Err(MuxError::unsupported(format!(
                    "unsupported audio channel count {}",
                    self.audio_channel_count
                )));
            }
            if !(1..=4).contains(&self.audio_object_type) {
                return Err(MuxError::unsupported(format!(
                    "unsupported audio object type {}",
                    self.audio_object_type
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = MuxerOptions::default();
        assert!(options.validate().is_ok());

        let video = options.video().unwrap();
        assert_eq!((video.width, video.height), (720, 1280));
        assert_eq!(video.frame_rate, 30);
        assert_eq!(video.bit_rate, 1_500_000);

        let audio = options.audio().unwrap();
        assert_eq!(audio.sample_rate, 44_100);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.bit_rate, 128_000);
        assert_eq!(audio.object_type, AudioObjectType::AacLowComplexity);
    }

    #[test]
    fn test_single_track_presets() {
        assert!(MuxerOptions::video_only().audio().is_none());
        assert!(MuxerOptions::audio_only().video().is_none());
        assert!(MuxerOptions::audio_only().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        let cases = [
            MuxerOptions {
                video_width: 0,
                ..MuxerOptions::default()
            },
            MuxerOptions {
                video_frame_rate: 0,
                ..MuxerOptions::default()
            },
            MuxerOptions {
                audio_sample_rate: 44_000,
                ..MuxerOptions::default()
            },
            MuxerOptions {
                audio_channel_count: 8,
                ..MuxerOptions::default()
            },
            MuxerOptions {
                audio_object_type: 5,
                ..MuxerOptions::default()
            },
            MuxerOptions {
                video_enabled: false,
                audio_enabled: false,
                ..MuxerOptions::default()
            },
        ];

        for options in cases {
            assert!(
                matches!(options.validate(), Err(MuxError::UnsupportedFormat(_))),
                "{options:?}"
            );
        }

        // disabled tracks are not validated
        let options = MuxerOptions {
            audio_enabled: false,
            audio_sample_rate: 0,
            ..MuxerOptions::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_timestamp_unit() {
        assert_eq!(TimestampUnit::Milliseconds.to_millis(40), 40);
        assert_eq!(TimestampUnit::Microseconds.to_millis(33_366), 33);
    }
}
