//! FLV container primitives for writing live streams.
//!
//! The crate frames codec payloads into FLV tags and reads them back:
//!
//! - [`header`]: the 9-byte file header
//! - [`framing`]: tag header and `PreviousTagSize` encoding/decoding
//! - [`audio`], [`video`], [`script`]: tag body layouts for AAC, AVC and `onMetaData`
//! - [`writer`]: [`FlvTagWriter`], which frames complete tags into one buffer
//! - [`parser`]: [`FlvParser`], used to verify written files
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

pub mod audio;
pub mod error;
pub mod framing;
pub mod header;
pub mod parser;
pub mod script;
pub mod tag;
pub mod video;
pub mod writer;

pub use error::FlvError;
pub use header::FlvHeader;
pub use parser::{FlvParser, PrevTagSizeMode};
pub use tag::{FlvTag, FlvTagType};
pub use writer::FlvTagWriter;
