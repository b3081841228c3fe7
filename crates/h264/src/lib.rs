//! H.264 bitstream helpers for muxing.
//!
//! This crate covers what a container writer needs from an H.264 elementary
//! stream, without decoding pictures:
//!
//! - splitting Annex-B byte streams into NAL units ([`AnnexBNalIter`])
//! - classifying NAL units (parameter sets, IDR slices, other slices)
//! - rewriting NAL units with 4-byte length prefixes ([`write_length_prefixed`])
//! - building and parsing the [`AVCDecoderConfigurationRecord`]
//!
//! ## Example
//!
//! ```rust
//! use h264::{AVCDecoderConfigurationRecord, AnnexBNalIter, NalUnitType};
//!
//! let stream = [
//!     0, 0, 0, 1, 0x67, 0x42, 0xc0, 0x1f, 0xda, // SPS
//!     0, 0, 1, 0x68, 0xce, 0x3c, 0x80, // PPS
//!     0, 0, 1, 0x65, 0x88, 0x84, // IDR slice
//! ];
//!
//! let nals = AnnexBNalIter::new(&stream).collect::<Result<Vec<_>, _>>().unwrap();
//! assert_eq!(nals[2].nal_type(), NalUnitType::IdrSlice);
//!
//! let record = AVCDecoderConfigurationRecord::from_parameter_sets(
//!     vec![nals[0].to_bytes()],
//!     vec![nals[1].to_bytes()],
//! )
//! .unwrap();
//! assert_eq!(record.profile_indication, 0x42);
//! assert_eq!(record.level_indication, 0x1f);
//! ```
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or [Apache-2.0](./LICENSE.Apache-2.0) license.
//! You can choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(unsafe_code)]

mod config;
mod error;
mod nal;

pub use config::AVCDecoderConfigurationRecord;
pub use error::H264Error;
pub use nal::{AnnexBNalIter, NalUnit, NalUnitType, write_length_prefixed};
