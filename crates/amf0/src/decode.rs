use std::borrow::Cow;
use std::io::{self, Cursor};

use byteorder::{BigEndian, ReadBytesExt};

use super::{Amf0Marker, Amf0Property, Amf0ReadError, Amf0Value};

/// AMF0 decoder over a borrowed buffer.
///
/// Strings are returned as borrows of the input.
pub struct Amf0Decoder<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.position() as usize >= self.cursor.get_ref().len()
    }

    /// Current read offset in the input buffer.
    pub fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Decodes the next value.
    pub fn decode(&mut self) -> Result<Amf0Value<'a>, Amf0ReadError> {
        let byte = self.cursor.read_u8()?;
        let marker = Amf0Marker::try_from(byte).map_err(Amf0ReadError::UnknownMarker)?;

        match marker {
            Amf0Marker::Number => Ok(Amf0Value::Number(self.cursor.read_f64::<BigEndian>()?)),
            Amf0Marker::Boolean => Ok(Amf0Value::Boolean(self.cursor.read_u8()? != 0)),
            Amf0Marker::String => {
                let len = self.cursor.read_u16::<BigEndian>()? as usize;
                Ok(Amf0Value::String(self.read_utf8(len)?))
            }
            Amf0Marker::LongString => {
                let len = self.cursor.read_u32::<BigEndian>()? as usize;
                Ok(Amf0Value::String(self.read_utf8(len)?))
            }
            Amf0Marker::Object => Ok(Amf0Value::Object(self.read_properties(None)?)),
            Amf0Marker::EcmaArray => {
                let count = self.cursor.read_u32::<BigEndian>()?;
                Ok(Amf0Value::EcmaArray(self.read_properties(Some(count))?))
            }
            Amf0Marker::StrictArray => {
                let count = self.cursor.read_u32::<BigEndian>()?;
                let mut values = Vec::new();
                for _ in 0..count {
                    values.push(self.decode()?);
                }
                Ok(Amf0Value::StrictArray(values))
            }
            Amf0Marker::Null => Ok(Amf0Value::Null),
            Amf0Marker::Undefined => Ok(Amf0Value::Undefined),
            other => Err(Amf0ReadError::UnsupportedType(other)),
        }
    }

    /// Decodes the next value, failing if it is not of the expected type.
    pub fn decode_with_type(
        &mut self,
        expected: Amf0Marker,
    ) -> Result<Amf0Value<'a>, Amf0ReadError> {
        let value = self.decode()?;
        let got = value.marker();
        // long strings decode into `String`
        let matches = got == expected
            || (expected == Amf0Marker::LongString && got == Amf0Marker::String);
        if matches {
            Ok(value)
        } else {
            Err(Amf0ReadError::WrongType { expected, got })
        }
    }

    fn read_utf8(&mut self, len: usize) -> Result<Cow<'a, str>, Amf0ReadError> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.offset();
        let end = start
            .checked_add(len)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "string runs past end of data")
            })?;
        self.cursor.set_position(end as u64);
        Ok(Cow::Borrowed(std::str::from_utf8(&data[start..end])?))
    }

    /// Reads key/value pairs until the object-end marker.
    ///
    /// ECMA arrays declare a count, but writers disagree on whether the
    /// terminator follows, so the count only bounds the loop and a trailing
    /// terminator is consumed when present.
    fn read_properties(
        &mut self,
        count: Option<u32>,
    ) -> Result<Vec<Amf0Property<'a>>, Amf0ReadError> {
        let mut properties = Vec::new();
        loop {
            if self.consume_object_end() {
                break;
            }
            if let Some(count) = count
                && properties.len() as u32 >= count
            {
                break;
            }
            let len = self.cursor.read_u16::<BigEndian>()? as usize;
            let key = self.read_utf8(len)?;
            let value = self.decode()?;
            properties.push((key, value));
        }
        Ok(properties)
    }

    fn consume_object_end(&mut self) -> bool {
        let data = self.cursor.get_ref();
        let pos = self.offset();
        if data.get(pos..pos + 3) == Some(&[0x00, 0x00, Amf0Marker::ObjectEnd as u8][..]) {
            self.cursor.set_position(pos as u64 + 3);
            true
        } else {
            false
        }
    }
}

impl<'a> Iterator for Amf0Decoder<'a> {
    type Item = Result<Amf0Value<'a>, Amf0ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            None
        } else {
            Some(self.decode())
        }
    }
}
