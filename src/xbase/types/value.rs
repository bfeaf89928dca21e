//! Decoded field values.

use std::borrow::Cow;
use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};

use super::models::ValueKind;

/// A decoded field value.
///
/// Text and binary values may borrow from the reader's record buffer, so a `Value<'r>`
/// is only valid until the next call to `read()`. Use [`Value::into_owned`] to keep it longer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'r> {
    Null,
    Text(Cow<'r, str>),
    Binary(Cow<'r, [u8]>),
    Decimal(BigDecimal),
    Double(f64),
    Int32(i32),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl<'r> Value<'r> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The kind of the value, or `None` for null.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Text(_) => Some(ValueKind::Text),
            Value::Binary(_) => Some(ValueKind::Binary),
            Value::Decimal(_) => Some(ValueKind::Decimal),
            Value::Double(_) => Some(ValueKind::Double),
            Value::Int32(_) => Some(ValueKind::Int32),
            Value::Boolean(_) => Some(ValueKind::Boolean),
            Value::Date(_) => Some(ValueKind::Date),
            Value::DateTime(_) => Some(ValueKind::DateTime),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Detaches the value from the record buffer.
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Null => Value::Null,
            Value::Text(text) => Value::Text(Cow::Owned(text.into_owned())),
            Value::Binary(bytes) => Value::Binary(Cow::Owned(bytes.into_owned())),
            Value::Decimal(d) => Value::Decimal(d),
            Value::Double(v) => Value::Double(v),
            Value::Int32(v) => Value::Int32(v),
            Value::Boolean(v) => Value::Boolean(v),
            Value::Date(v) => Value::Date(v),
            Value::DateTime(v) => Value::DateTime(v),
        }
    }
}

impl Default for Value<'_> {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Text(text) => f.write_str(text),
            Value::Binary(bytes) => {
                for b in bytes.iter() {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Double(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
        }
    }
}
