use std::borrow::Cow;

/// AMF0 type markers, amf0_spec_121207.pdf section 2.1.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum Amf0Marker {
    Number = 0x00,
    Boolean = 0x01,
    String = 0x02,
    Object = 0x03,
    /// Reserved.
    MovieClip = 0x04,
    Null = 0x05,
    Undefined = 0x06,
    Reference = 0x07,
    EcmaArray = 0x08,
    ObjectEnd = 0x09,
    StrictArray = 0x0a,
    Date = 0x0b,
    LongString = 0x0c,
    Unsupported = 0x0d,
    /// Reserved.
    Recordset = 0x0e,
    XmlDocument = 0x0f,
    TypedObject = 0x10,
    /// Switch to AMF3.
    AvmPlusObject = 0x11,
}

impl TryFrom<u8> for Amf0Marker {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            0x00 => Self::Number,
            0x01 => Self::Boolean,
            0x02 => Self::String,
            0x03 => Self::Object,
            0x04 => Self::MovieClip,
            0x05 => Self::Null,
            0x06 => Self::Undefined,
            0x07 => Self::Reference,
            0x08 => Self::EcmaArray,
            0x09 => Self::ObjectEnd,
            0x0a => Self::StrictArray,
            0x0b => Self::Date,
            0x0c => Self::LongString,
            0x0d => Self::Unsupported,
            0x0e => Self::Recordset,
            0x0f => Self::XmlDocument,
            0x10 => Self::TypedObject,
            0x11 => Self::AvmPlusObject,
            other => return Err(other),
        })
    }
}

/// A key/value pair of an AMF0 object or ECMA array.
pub type Amf0Property<'a> = (Cow<'a, str>, Amf0Value<'a>);

/// An AMF0 value. Strings borrow from the decoded buffer where possible.
#[derive(PartialEq, Clone, Debug)]
pub enum Amf0Value<'a> {
    Number(f64),
    Boolean(bool),
    /// String or long string; the encoder picks the wire form by length.
    String(Cow<'a, str>),
    Object(Vec<Amf0Property<'a>>),
    Null,
    Undefined,
    EcmaArray(Vec<Amf0Property<'a>>),
    StrictArray(Vec<Amf0Value<'a>>),
}

impl<'a> Amf0Value<'a> {
    /// The marker this value is written with.
    pub fn marker(&self) -> Amf0Marker {
        match self {
            Self::Number(_) => Amf0Marker::Number,
            Self::Boolean(_) => Amf0Marker::Boolean,
            Self::String(s) if s.len() > u16::MAX as usize => Amf0Marker::LongString,
            Self::String(_) => Amf0Marker::String,
            Self::Object(_) => Amf0Marker::Object,
            Self::Null => Amf0Marker::Null,
            Self::Undefined => Amf0Marker::Undefined,
            Self::EcmaArray(_) => Amf0Marker::EcmaArray,
            Self::StrictArray(_) => Amf0Marker::StrictArray,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Properties of an `Object` or `EcmaArray`.
    pub fn properties(&self) -> Option<&[Amf0Property<'a>]> {
        match self {
            Self::Object(props) | Self::EcmaArray(props) => Some(props),
            _ => None,
        }
    }

    /// Looks up a property by key in an `Object` or `EcmaArray`.
    pub fn get(&self, key: &str) -> Option<&Amf0Value<'a>> {
        self.properties()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Detaches the value from the buffer it was decoded from.
    pub fn into_owned(self) -> Amf0Value<'static> {
        fn own_props(props: Vec<Amf0Property<'_>>) -> Vec<Amf0Property<'static>> {
            props
                .into_iter()
                .map(|(k, v)| (Cow::Owned(k.into_owned()), v.into_owned()))
                .collect()
        }

        match self {
            Self::Number(n) => Amf0Value::Number(n),
            Self::Boolean(b) => Amf0Value::Boolean(b),
            Self::String(s) => Amf0Value::String(Cow::Owned(s.into_owned())),
            Self::Object(props) => Amf0Value::Object(own_props(props)),
            Self::EcmaArray(props) => Amf0Value::EcmaArray(own_props(props)),
            Self::StrictArray(values) => {
                Amf0Value::StrictArray(values.into_iter().map(Amf0Value::into_owned).collect())
            }
            Self::Null => Amf0Value::Null,
            Self::Undefined => Amf0Value::Undefined,
        }
    }
}

impl From<f64> for Amf0Value<'_> {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Amf0Value<'_> {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl<'a> From<&'a str> for Amf0Value<'a> {
    fn from(value: &'a str) -> Self {
        Self::String(Cow::Borrowed(value))
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_marker_try_from() {
        for byte in 0x00..=0x11u8 {
            let marker = Amf0Marker::try_from(byte).unwrap();
            assert_eq!(marker as u8, byte);
        }
        assert_eq!(Amf0Marker::try_from(0x12), Err(0x12));
    }

    #[test]
    fn test_long_string_marker() {
        let long = "x".repeat(u16::MAX as usize + 1);
        assert_eq!(Amf0Value::from(long.as_str()).marker(), Amf0Marker::LongString);
        assert_eq!(Amf0Value::from("short").marker(), Amf0Marker::String);
    }

    #[test]
    fn test_get_and_into_owned() {
        let key = String::from("stereo");
        let value = Amf0Value::EcmaArray(vec![
            (Cow::Borrowed(key.as_str()), Amf0Value::Boolean(false)),
            ("duration".into(), Amf0Value::Number(12.5)),
        ]);
        let owned = value.into_owned();
        drop(key);

        assert_eq!(owned.get("stereo").and_then(Amf0Value::as_bool), Some(false));
        assert_eq!(owned.get("duration").and_then(Amf0Value::as_number), Some(12.5));
        assert!(owned.get("width").is_none());
        assert!(Amf0Value::Null.get("width").is_none());
    }
}
