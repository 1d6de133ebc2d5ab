//! Parameter and column values.

use crate::cursor::CursorHandle;
use crate::error::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::NaiveDateTime;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// A single parameter or column value.
///
/// Input parameters, output parameter results and row cells all share this
/// type. `Stream` and `Cursor` only ever appear as output parameter values
/// (or as stream inputs), never inside fetched rows.
#[derive(Debug, Default)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,
    /// Character data (VARCHAR2, CHAR, LONG, intervals, ...).
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Decimal number kept as text to preserve precision.
    Decimal(String),
    /// Binary floating point value.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
    /// Binary data (RAW, BLOB, ...).
    Bytes(Vec<u8>),
    /// Date/time value without time zone.
    Timestamp(NaiveDateTime),
    /// Character or binary stream (CLOB output, stream input).
    Stream(LobStream),
    /// Live reference cursor returned as an output parameter.
    Cursor(CursorHandle),
}

impl Value {
    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get the value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to i64.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Decimal(s) | Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to convert to f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(s) | Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to get the value as a NaiveDateTime.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Try to get the value as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Check if the value is a reference cursor.
    pub fn is_cursor(&self) -> bool {
        matches!(self, Value::Cursor(_))
    }

    /// JSON representation.
    ///
    /// Numbers stay numbers (decimals at full precision), binary data is
    /// Base64 text and timestamps use the display format.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Text(s) => Json::String(s.clone()),
            Value::Integer(i) => Json::from(*i),
            Value::Decimal(s) => serde_json::Number::from_str(s.trim())
                .map(Json::Number)
                .unwrap_or_else(|_| Json::String(s.clone())),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or_else(|| Json::String(f.to_string())),
            Value::Boolean(b) => Json::Bool(*b),
            other => Json::String(other.to_string()),
        }
    }

    /// Build a value from a JSON document value (task configuration input).
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Decimal(n.to_string())
                }
            }
            Json::String(s) => Value::Text(s),
            Json::Array(items) => {
                // Arrays of small integers are byte sequences.
                let bytes: Option<Vec<u8>> = items
                    .iter()
                    .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect();
                match bytes {
                    Some(b) => Value::Bytes(b),
                    None => Value::Text(Json::Array(items).to_string()),
                }
            }
            obj @ Json::Object(_) => Value::Text(obj.to_string()),
        }
    }
}

/// Coerced string form: NULL becomes an empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) | Value::Decimal(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Bytes(b) => f.write_str(&general_purpose::STANDARD.encode(b)),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Stream(_) => f.write_str("<STREAM>"),
            Value::Cursor(_) => f.write_str("<REF CURSOR>"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Character encoding of a character stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobEncoding {
    Utf8,
    /// UTF-16 little endian, the legacy convention for CLOB output streams.
    Utf16,
}

/// A readable large-object stream.
///
/// Streams are drained exactly once; the encoder reads character streams
/// to completion rather than formatting them.
pub struct LobStream {
    reader: Box<dyn Read + Send>,
    encoding: LobEncoding,
}

impl LobStream {
    /// Wrap a UTF-8 encoded reader.
    pub fn utf8(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            encoding: LobEncoding::Utf8,
        }
    }

    /// Wrap a UTF-16 (little endian) encoded reader.
    pub fn utf16(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            encoding: LobEncoding::Utf16,
        }
    }

    /// Stream over an in-memory string.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::utf8(std::io::Cursor::new(text.into().into_bytes()))
    }

    /// Stream over in-memory bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::utf8(std::io::Cursor::new(bytes))
    }

    /// Encoding of the character data.
    pub fn encoding(&self) -> LobEncoding {
        self.encoding
    }

    /// Read the remaining raw bytes.
    pub fn read_to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Drain the stream and decode it as text.
    pub fn read_to_string(&mut self) -> Result<String> {
        let bytes = self.read_to_bytes()?;
        match self.encoding {
            LobEncoding::Utf8 => String::from_utf8(bytes).map_err(Error::encoding),
            LobEncoding::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(Error::encoding("UTF-16 stream has an odd number of bytes"));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(Error::encoding)
            }
        }
    }
}

impl fmt::Debug for LobStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobStream")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}
