use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use super::{Amf0Marker, Amf0Property, Amf0Value, Amf0WriteError};

/// AMF0 encoder.
///
/// Every function writes one complete value (marker included) unless noted
/// otherwise, and returns the number of bytes written so callers can track
/// offsets of individual fields inside a larger payload.
pub struct Amf0Encoder;

impl Amf0Encoder {
    pub fn encode_number(writer: &mut impl io::Write, value: f64) -> Result<usize, Amf0WriteError> {
        writer.write_u8(Amf0Marker::Number as u8)?;
        writer.write_f64::<BigEndian>(value)?;
        Ok(9)
    }

    pub fn encode_bool(writer: &mut impl io::Write, value: bool) -> Result<usize, Amf0WriteError> {
        writer.write_u8(Amf0Marker::Boolean as u8)?;
        writer.write_u8(value as u8)?;
        Ok(2)
    }

    /// Writes a string, switching to the long-string form above 65535 bytes.
    pub fn encode_string(writer: &mut impl io::Write, value: &str) -> Result<usize, Amf0WriteError> {
        let bytes = value.as_bytes();
        if bytes.len() <= u16::MAX as usize {
            writer.write_u8(Amf0Marker::String as u8)?;
            writer.write_u16::<BigEndian>(bytes.len() as u16)?;
            writer.write_all(bytes)?;
            Ok(3 + bytes.len())
        } else {
            let len = u32::try_from(bytes.len()).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "string exceeds u32 length")
            })?;
            writer.write_u8(Amf0Marker::LongString as u8)?;
            writer.write_u32::<BigEndian>(len)?;
            writer.write_all(bytes)?;
            Ok(5 + bytes.len())
        }
    }

    pub fn encode_null(writer: &mut impl io::Write) -> Result<usize, Amf0WriteError> {
        writer.write_u8(Amf0Marker::Null as u8)?;
        Ok(1)
    }

    pub fn encode_undefined(writer: &mut impl io::Write) -> Result<usize, Amf0WriteError> {
        writer.write_u8(Amf0Marker::Undefined as u8)?;
        Ok(1)
    }

    /// Writes a property key (UTF-8 string without marker).
    pub fn encode_key(writer: &mut impl io::Write, key: &str) -> Result<usize, Amf0WriteError> {
        let bytes = key.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(Amf0WriteError::KeyTooLong(bytes.len()));
        }
        writer.write_u16::<BigEndian>(bytes.len() as u16)?;
        writer.write_all(bytes)?;
        Ok(2 + bytes.len())
    }

    /// Writes the `0x00 0x00 0x09` terminator of objects and ECMA arrays.
    pub fn encode_object_end(writer: &mut impl io::Write) -> Result<usize, Amf0WriteError> {
        writer.write_u16::<BigEndian>(0)?;
        writer.write_u8(Amf0Marker::ObjectEnd as u8)?;
        Ok(3)
    }

    /// Writes the marker and entry count that open an ECMA array.
    ///
    /// The caller then writes `count` key/value pairs and [`Self::encode_object_end`].
    pub fn encode_ecma_array_start(
        writer: &mut impl io::Write,
        count: usize,
    ) -> Result<usize, Amf0WriteError> {
        let count = u32::try_from(count).map_err(|_| Amf0WriteError::ArrayTooLong(count))?;
        writer.write_u8(Amf0Marker::EcmaArray as u8)?;
        writer.write_u32::<BigEndian>(count)?;
        Ok(5)
    }

    pub fn encode_object(
        writer: &mut impl io::Write,
        properties: &[Amf0Property<'_>],
    ) -> Result<usize, Amf0WriteError> {
        writer.write_u8(Amf0Marker::Object as u8)?;
        let mut written = 1;
        written += Self::encode_properties(writer, properties)?;
        written += Self::encode_object_end(writer)?;
        Ok(written)
    }

    pub fn encode_ecma_array(
        writer: &mut impl io::Write,
        properties: &[Amf0Property<'_>],
    ) -> Result<usize, Amf0WriteError> {
        let mut written = Self::encode_ecma_array_start(writer, properties.len())?;
        written += Self::encode_properties(writer, properties)?;
        written += Self::encode_object_end(writer)?;
        Ok(written)
    }

    pub fn encode_strict_array(
        writer: &mut impl io::Write,
        values: &[Amf0Value<'_>],
    ) -> Result<usize, Amf0WriteError> {
        let count =
            u32::try_from(values.len()).map_err(|_| Amf0WriteError::ArrayTooLong(values.len()))?;
        writer.write_u8(Amf0Marker::StrictArray as u8)?;
        writer.write_u32::<BigEndian>(count)?;
        let mut written = 5;
        for value in values {
            written += Self::encode(writer, value)?;
        }
        Ok(written)
    }

    /// Writes any supported value.
    pub fn encode(writer: &mut impl io::Write, value: &Amf0Value<'_>) -> Result<usize, Amf0WriteError> {
        match value {
            Amf0Value::Number(n) => Self::encode_number(writer, *n),
            Amf0Value::Boolean(b) => Self::encode_bool(writer, *b),
            Amf0Value::String(s) => Self::encode_string(writer, s),
            Amf0Value::Object(props) => Self::encode_object(writer, props),
            Amf0Value::Null => Self::encode_null(writer),
            Amf0Value::Undefined => Self::encode_undefined(writer),
            Amf0Value::EcmaArray(props) => Self::encode_ecma_array(writer, props),
            Amf0Value::StrictArray(values) => Self::encode_strict_array(writer, values),
        }
    }

    fn encode_properties(
        writer: &mut impl io::Write,
        properties: &[Amf0Property<'_>],
    ) -> Result<usize, Amf0WriteError> {
        let mut written = 0;
        for (key, value) in properties {
            written += Self::encode_key(writer, key)?;
            written += Self::encode(writer, value)?;
        }
        Ok(written)
    }
}
