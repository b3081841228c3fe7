//! Streaming FLV muxer for encoder-produced H.264 and AAC.
//!
//! [`FormatContext`] takes access units as a hardware encoder hands them out
//! (Annex-B video, raw or ADTS audio), derives the codec configuration
//! records, and writes a playable FLV stream to an [`OutputSink`] one call at
//! a time.
//!
//! ## Example
//!
//! ```rust
//! use flv_mux::{AccessUnit, FormatContext, MuxerOptions, MuxerState};
//!
//! let mut muxer: FormatContext<Vec<u8>> =
//!     FormatContext::with_options(MuxerOptions::video_only()).unwrap();
//! muxer.prepare(Vec::new()).unwrap();
//!
//! // SPS, PPS and an IDR slice in one access unit
//! let unit = [
//!     0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1E, 0x95, //
//!     0, 0, 0, 1, 0x68, 0xCE, 0x38, 0x80, //
//!     0, 0, 0, 1, 0x65, 0x88, 0x84, 0x00,
//! ];
//! muxer.write_access_unit(AccessUnit::video(&unit, 0)).unwrap();
//! muxer.finalize().unwrap();
//!
//! assert_eq!(muxer.state(), MuxerState::Finalized);
//! let output = muxer.into_sink().unwrap();
//! assert_eq!(&output[..3], b"FLV");
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
#![deny(unsafe_code)]

mod access_unit;
mod audio;
mod context;
mod error;
mod metadata;
mod options;
mod sink;
mod video;

pub use access_unit::{AccessUnit, AccessUnitFlags, TrackKind};
pub use context::{FormatContext, MuxerState, MuxerStats, TrackStats};
pub use error::{MuxError, Result};
pub use options::{AudioTrackConfig, ContainerFormat, MuxerOptions, TimestampUnit, VideoTrackConfig};
pub use sink::{FileSink, OutputSink, SeekableSink, WriteSink};
