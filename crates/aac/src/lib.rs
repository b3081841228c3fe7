//! AAC framing helpers for muxing.
//!
//! - parsing ADTS headers and splitting ADTS streams into raw frames ([`AdtsFrameIter`])
//! - the MPEG-4 sampling frequency table ([`SAMPLE_RATES`])
//! - building and parsing the two-byte [`AudioSpecificConfig`]
//!
//! ## Example
//!
//! ```rust
//! use aac::{AdtsFrameIter, AudioObjectType, AudioSpecificConfig};
//!
//! // one ADTS frame: AAC-LC, 44.1 kHz, stereo, 2 payload bytes
//! let frame = [0xFF, 0xF1, 0x50, 0x80, 0x01, 0x3F, 0xFC, 0x21, 0x00];
//! let frames = AdtsFrameIter::new(&frame).collect::<Result<Vec<_>, _>>().unwrap();
//! assert_eq!(frames[0].payload, &[0x21, 0x00]);
//!
//! let config = frames[0].header.audio_specific_config().unwrap();
//! assert_eq!(config, AudioSpecificConfig::new(AudioObjectType::AacLowComplexity, 44_100, 2).unwrap());
//! assert_eq!(config.to_bytes(), [0x12, 0x10]);
//! ```
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or
//! [Apache-2.0](./LICENSE.Apache-2.0) license. You can choose between one of
//! them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(unsafe_code)]

mod adts;
mod config;
mod error;

pub use adts::{ADTS_SYNC_WORD, AdtsFrame, AdtsFrameIter, AdtsHeader};
pub use config::{
    AudioObjectType, AudioSpecificConfig, SAMPLE_RATES, SAMPLES_PER_FRAME, sampling_frequency_index,
};
pub use error::AacError;
