//! SCRIPTDATA tag bodies.
//!
//! A script body is an AMF0 string naming the handler (`onMetaData`) followed
//! by its arguments, in practice a single ECMA array.

use std::io;

use amf0::{Amf0Decoder, Amf0Encoder, Amf0Marker, Amf0Property, Amf0Value};
use bytes::Bytes;

use crate::error::FlvError;

pub const ON_METADATA: &str = "onMetaData";

/// A demuxed script tag body.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptData {
    pub name: String,
    pub data: Vec<Amf0Value<'static>>,
}

impl ScriptData {
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        let start = reader.position() as usize;
        let buf = reader.get_ref().clone();
        let mut decoder = Amf0Decoder::new(buf.get(start..).unwrap_or_default());

        let name = decoder
            .decode_with_type(Amf0Marker::String)?
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| FlvError::InvalidScriptData("missing handler name".into()))?;

        let mut data = Vec::new();
        while !decoder.is_empty() {
            data.push(decoder.decode()?.into_owned());
        }

        reader.set_position((start + decoder.offset()) as u64);
        Ok(Self { name, data })
    }

    /// The first argument when it is an object or ECMA array.
    pub fn properties(&self) -> Option<&[Amf0Property<'static>]> {
        self.data.first().and_then(Amf0Value::properties)
    }

    /// Looks up a numeric property of the first argument.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.data.first()?.get(key)?.as_number()
    }
}

/// An encoded `onMetaData` body and where each property value landed in it.
#[derive(Debug, Clone)]
pub struct EncodedMetadata {
    pub body: Vec<u8>,
    /// Offset of each value's AMF0 marker in `body`, in property order.
    pub value_offsets: Vec<usize>,
}

impl EncodedMetadata {
    /// Offset of the 8-byte payload of the number stored under `key`.
    ///
    /// Returns `None` when the key is absent or its value is not a number.
    pub fn number_offset(&self, properties: &[Amf0Property<'_>], key: &str) -> Option<usize> {
        let index = properties.iter().position(|(k, _)| k == key)?;
        matches!(properties[index].1, Amf0Value::Number(_)).then(|| self.value_offsets[index] + 1)
    }
}

/// Encodes `onMetaData` followed by an ECMA array of `properties`.
pub fn encode_metadata(properties: &[Amf0Property<'_>]) -> Result<EncodedMetadata, FlvError> {
    let mut body = Vec::new();
    let mut value_offsets = Vec::with_capacity(properties.len());

    Amf0Encoder::encode_string(&mut body, ON_METADATA)?;
    Amf0Encoder::encode_ecma_array_start(&mut body, properties.len())?;
    for (key, value) in properties {
        Amf0Encoder::encode_key(&mut body, key)?;
        value_offsets.push(body.len());
        Amf0Encoder::encode(&mut body, value)?;
    }
    Amf0Encoder::encode_object_end(&mut body)?;

    Ok(EncodedMetadata {
        body,
        value_offsets,
    })
}

/// The 8 bytes replacing an AMF0 number payload in place.
pub fn number_patch(value: f64) -> [u8; 8] {
    value.to_be_bytes()
}
