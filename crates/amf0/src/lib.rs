//! AMF0 values, as carried by FLV script data tags.
//!
//! Only the subset of AMF0 that appears in FLV `onMetaData` payloads is
//! modelled: numbers, booleans, strings, objects, ECMA arrays, strict arrays,
//! null and undefined.
//!
//! ## Example
//!
//! ```rust
//! use amf0::{Amf0Decoder, Amf0Encoder, Amf0Value};
//!
//! let mut buf = Vec::new();
//! Amf0Encoder::encode_string(&mut buf, "onMetaData").unwrap();
//! Amf0Encoder::encode_ecma_array(&mut buf, &[("width".into(), Amf0Value::Number(1280.0))]).unwrap();
//!
//! let mut decoder = Amf0Decoder::new(&buf);
//! assert_eq!(decoder.decode().unwrap().as_str(), Some("onMetaData"));
//! let meta = decoder.decode().unwrap();
//! assert_eq!(meta.get("width").and_then(Amf0Value::as_number), Some(1280.0));
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

mod decode;
mod define;
mod encode;
mod errors;

pub use decode::Amf0Decoder;
pub use define::{Amf0Marker, Amf0Property, Amf0Value};
pub use encode::Amf0Encoder;
pub use errors::{Amf0ReadError, Amf0WriteError};
