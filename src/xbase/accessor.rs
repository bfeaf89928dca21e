//! # Column Accessors
//!
//! Each column gets one [`Accessor`], chosen once from its semantic type. An accessor
//! turns the column's byte range in the current record into a [`Value`], or into a
//! memo block reference that the reader resolves against the memo stream.
//!
//! Nullable columns are wrapped in [`Accessor::Nullable`], which consults the
//! record's `_NullFlags` bitmask before the inner decoder ever sees the bytes.
//!
//! ## Field Encodings
//! - Character: fixed-width text, trailing spaces trimmed
//! - VarChar/VarBinary: when the var-flag bit is set, the last byte holds the used length
//! - Numeric/Float: ASCII decimal digits, blank means null
//! - Currency: i64 LE scaled by 10^4
//! - Double: f64 LE; Integer: i32 LE
//! - Logical: `T`/`Y`, `F`/`N`, `?`/blank
//! - Date: `YYYYMMDD` ASCII, blank means null
//! - DateTime: i32 LE Julian day + i32 LE milliseconds since midnight
//! - Memo/General/Picture/Blob: block reference into the memo file

use std::borrow::Cow;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use byteorder::{ByteOrder, LittleEndian};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::xbase::codec::encoding::TextEncoding;
use crate::xbase::types::error::{Result, XBaseError};
use crate::xbase::types::models::ColumnDescriptor;
use crate::xbase::types::value::Value;

/// Julian day number of 0001-01-01 (CE day 1) minus one.
const JULIAN_DAY_CE_OFFSET: i32 = 1_721_425;
const MILLIS_PER_DAY: i32 = 86_400_000;

/// The current record as seen by accessors.
pub(crate) struct RowContext<'r> {
    pub record: &'r [u8],
    /// Bytes of the `_NullFlags` column; empty when the file has none.
    pub null_flags: &'r [u8],
    pub encoding: TextEncoding,
}

impl<'r> RowContext<'r> {
    pub fn field(&self, column: &ColumnDescriptor) -> &'r [u8] {
        &self.record[column.offset..column.end()]
    }

    /// Tests a null/var flag bit. Bits are numbered LSB-first within each byte.
    pub fn flag(&self, bit: usize) -> bool {
        self.null_flags
            .get(bit / 8)
            .is_some_and(|byte| (byte >> (bit % 8)) & 1 == 1)
    }
}

/// The result of decoding a field.
pub(crate) enum Decoded<'r> {
    Value(Value<'r>),
    /// A non-null memo reference still to be resolved.
    Memo { block: u64, text: bool },
}

/// One decoding strategy per xBase type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoder {
    /// Zero-width column; always null.
    Null,
    Character,
    VarChar { flag_bit: Option<usize> },
    VarBinary { flag_bit: Option<usize> },
    Numeric { scale: u8 },
    Currency,
    Double,
    Integer,
    Logical,
    Date,
    DateTime,
    Memo { text: bool },
    /// Memo-backed column with no memo stream supplied.
    MissingMemo,
    /// Raw bytes: the `_NullFlags` column and tolerated unknown types.
    Raw,
}

impl Decoder {
    pub fn for_column(column: &ColumnDescriptor, memo_available: bool) -> Self {
        use crate::xbase::types::models::XBaseType as T;

        if column.is_placeholder() {
            return Decoder::Null;
        }
        match column.data_type {
            T::Character => Decoder::Character,
            T::VarChar => Decoder::VarChar { flag_bit: column.var_bit },
            T::VarBinary => Decoder::VarBinary { flag_bit: column.var_bit },
            T::Numeric | T::Float => Decoder::Numeric { scale: column.decimal_count },
            T::Currency => Decoder::Currency,
            T::Double => Decoder::Double,
            T::Integer => Decoder::Integer,
            T::Logical => Decoder::Logical,
            T::Date => Decoder::Date,
            T::DateTime => Decoder::DateTime,
            T::Memo | T::General | T::Picture | T::Blob if !memo_available => Decoder::MissingMemo,
            T::Memo => Decoder::Memo { text: !column.flags.binary },
            T::General | T::Picture | T::Blob => Decoder::Memo { text: false },
            T::NullFlags | T::Unknown(_) => Decoder::Raw,
        }
    }

    fn is_null(&self, field: &[u8]) -> Result<bool> {
        Ok(match self {
            Decoder::Null => true,
            Decoder::Numeric { .. } => numeric_text(field)?.is_none(),
            Decoder::Logical => parse_logical(field)?.is_none(),
            Decoder::Date => is_blank_date(field),
            Decoder::DateTime => julian_parts(field)?.is_none(),
            Decoder::Memo { .. } | Decoder::MissingMemo => memo_reference(field)?.is_none(),
            Decoder::Character
            | Decoder::VarChar { .. }
            | Decoder::VarBinary { .. }
            | Decoder::Currency
            | Decoder::Double
            | Decoder::Integer
            | Decoder::Raw => false,
        })
    }

    fn decode<'r>(&self, ctx: &RowContext<'r>, column: &ColumnDescriptor) -> Result<Decoded<'r>> {
        let field = ctx.field(column);
        let value = match self {
            Decoder::Null => Value::Null,
            Decoder::Character => Value::Text(ctx.encoding.decode(trim_text(field))),
            Decoder::VarChar { flag_bit } => {
                Value::Text(ctx.encoding.decode(var_field(ctx, field, *flag_bit)?))
            }
            Decoder::VarBinary { flag_bit } => {
                Value::Binary(Cow::Borrowed(var_field(ctx, field, *flag_bit)?))
            }
            Decoder::Numeric { scale } => match parse_numeric(field, *scale)? {
                Some(d) => Value::Decimal(d),
                None => Value::Null,
            },
            Decoder::Currency => Value::Decimal(parse_currency(field)?),
            Decoder::Double => Value::Double(LittleEndian::read_f64(fixed(field, 8, "double")?)),
            Decoder::Integer => Value::Int32(LittleEndian::read_i32(fixed(field, 4, "integer")?)),
            Decoder::Logical => match parse_logical(field)? {
                Some(b) => Value::Boolean(b),
                None => Value::Null,
            },
            Decoder::Date => match parse_date(field)? {
                Some(d) => Value::Date(d),
                None => Value::Null,
            },
            Decoder::DateTime => match parse_datetime(field)? {
                Some(dt) => Value::DateTime(dt),
                None => Value::Null,
            },
            Decoder::Memo { text } => {
                return Ok(match memo_reference(field)? {
                    Some(block) => Decoded::Memo { block, text: *text },
                    None => Decoded::Value(Value::Null),
                });
            }
            Decoder::MissingMemo => match memo_reference(field)? {
                Some(_) => {
                    return Err(XBaseError::MissingMemo {
                        ordinal: column.ordinal,
                        name: column.name.clone(),
                    });
                }
                None => Value::Null,
            },
            Decoder::Raw => Value::Binary(Cow::Borrowed(field)),
        };
        Ok(Decoded::Value(value))
    }
}

/// A column's decoder, optionally wrapped with a null-bit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Accessor {
    Plain(Decoder),
    Nullable { bit: usize, inner: Decoder },
}

impl Accessor {
    pub fn for_column(column: &ColumnDescriptor, memo_available: bool) -> Self {
        let decoder = Decoder::for_column(column, memo_available);
        match column.null_bit {
            Some(bit) if decoder != Decoder::Null => Accessor::Nullable { bit, inner: decoder },
            _ => Accessor::Plain(decoder),
        }
    }

    pub fn decoder(&self) -> Decoder {
        match self {
            Accessor::Plain(decoder) | Accessor::Nullable { inner: decoder, .. } => *decoder,
        }
    }

    pub fn is_null(&self, ctx: &RowContext<'_>, column: &ColumnDescriptor) -> Result<bool> {
        match self {
            Accessor::Nullable { bit, .. } if ctx.flag(*bit) => Ok(true),
            _ => self.decoder().is_null(ctx.field(column)),
        }
    }

    pub fn decode<'r>(&self, ctx: &RowContext<'r>, column: &ColumnDescriptor) -> Result<Decoded<'r>> {
        match self {
            Accessor::Nullable { bit, .. } if ctx.flag(*bit) => Ok(Decoded::Value(Value::Null)),
            _ => self.decoder().decode(ctx, column),
        }
    }
}

fn fixed<'f>(field: &'f [u8], width: usize, what: &str) -> Result<&'f [u8]> {
    field.get(..width).ok_or_else(|| {
        XBaseError::malformed(format!("{} field is {} bytes wide, expected {}", what, field.len(), width))
    })
}

fn trim_text(field: &[u8]) -> &[u8] {
    let end = field
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    &field[..end]
}

fn trim_ascii_padding(field: &[u8]) -> &[u8] {
    let start = field.iter().position(|&b| b != b' ' && b != 0).unwrap_or(field.len());
    let rest = &field[start..];
    trim_text(rest)
}

/// The used portion of a VarChar/VarBinary field.
fn var_field<'r>(ctx: &RowContext<'r>, field: &'r [u8], flag_bit: Option<usize>) -> Result<&'r [u8]> {
    match (flag_bit, field.split_last()) {
        (Some(bit), Some((&used, data))) if ctx.flag(bit) => {
            let used = used as usize;
            data.get(..used).ok_or_else(|| {
                XBaseError::malformed(format!(
                    "variable-length field declares {} bytes but holds at most {}",
                    used,
                    data.len()
                ))
            })
        }
        _ => Ok(field),
    }
}

/// Returns the trimmed numeric text, or `None` for a blank or overflow (`***`) field.
pub(crate) fn numeric_text(field: &[u8]) -> Result<Option<&str>> {
    let trimmed = trim_ascii_padding(field);
    if trimmed.is_empty() || trimmed.iter().all(|&b| b == b'*') {
        return Ok(None);
    }
    std::str::from_utf8(trimmed)
        .map(Some)
        .map_err(|_| XBaseError::malformed("numeric field contains non-ASCII bytes"))
}

/// Parses an ASCII numeric field into a fixed-point value with at least `scale` digits.
pub(crate) fn parse_numeric(field: &[u8], scale: u8) -> Result<Option<BigDecimal>> {
    let Some(text) = numeric_text(field)? else {
        return Ok(None);
    };
    let normalized = normalize_numeric(text);
    let value = BigDecimal::from_str(&normalized)
        .map_err(|e| XBaseError::malformed(format!("invalid numeric value {:?}: {}", text, e)))?;
    let (_, exponent) = value.as_bigint_and_exponent();
    let scale = scale as i64;
    Ok(Some(if exponent < scale { value.with_scale(scale) } else { value }))
}

/// Rewrites forms some writers emit (`"12."`, `".5"`, `"-.5"`, `"1,5"`) into plain decimal text.
fn normalize_numeric(text: &str) -> Cow<'_, str> {
    let text = text.strip_prefix('+').unwrap_or(text);
    let text = text.strip_suffix('.').unwrap_or(text);
    if !text.contains(',') && !text.starts_with('.') && !text.starts_with("-.") {
        return Cow::Borrowed(text);
    }
    let mut owned = text.replace(',', ".");
    if owned.starts_with('.') {
        owned.insert(0, '0');
    } else if owned.starts_with("-.") {
        owned.insert(1, '0');
    }
    Cow::Owned(owned)
}

fn parse_currency(field: &[u8]) -> Result<BigDecimal> {
    let raw = LittleEndian::read_i64(fixed(field, 8, "currency")?);
    Ok(BigDecimal::new(raw.into(), 4))
}

pub(crate) fn parse_logical(field: &[u8]) -> Result<Option<bool>> {
    match field.first().copied().unwrap_or(b' ') {
        b'T' | b't' | b'Y' | b'y' => Ok(Some(true)),
        b'F' | b'f' | b'N' | b'n' => Ok(Some(false)),
        b'?' | b' ' | 0 => Ok(None),
        other => Err(XBaseError::malformed(format!("invalid logical value {:#04x}", other))),
    }
}

fn is_blank_date(field: &[u8]) -> bool {
    field.iter().all(|&b| b == b' ' || b == b'0' || b == 0)
}

pub(crate) fn parse_date(field: &[u8]) -> Result<Option<NaiveDate>> {
    if is_blank_date(field) {
        return Ok(None);
    }
    let digits = fixed(field, 8, "date")?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(XBaseError::malformed(format!(
            "invalid date {:?}",
            String::from_utf8_lossy(digits)
        )));
    }
    let number = |range: std::ops::Range<usize>| {
        digits[range].iter().fold(0u32, |acc, d| acc * 10 + (d - b'0') as u32)
    };
    let (year, month, day) = (number(0..4), number(4..6), number(6..8));
    NaiveDate::from_ymd_opt(year as i32, month, day)
        .map(Some)
        .ok_or_else(|| XBaseError::malformed(format!("invalid date {:04}-{:02}-{:02}", year, month, day)))
}

/// Returns `(julian_day, millis)`, or `None` for an empty timestamp.
fn julian_parts(field: &[u8]) -> Result<Option<(i32, i32)>> {
    let bytes = fixed(field, 8, "datetime")?;
    if bytes.iter().all(|&b| b == b' ' || b == 0) {
        return Ok(None);
    }
    let day = LittleEndian::read_i32(&bytes[0..4]);
    let millis = LittleEndian::read_i32(&bytes[4..8]);
    Ok((day != 0).then_some((day, millis)))
}

pub(crate) fn parse_datetime(field: &[u8]) -> Result<Option<NaiveDateTime>> {
    let Some((day, millis)) = julian_parts(field)? else {
        return Ok(None);
    };
    let date = day
        .checked_sub(JULIAN_DAY_CE_OFFSET)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| XBaseError::malformed(format!("invalid julian day {}", day)))?;
    if !(0..MILLIS_PER_DAY).contains(&millis) {
        return Err(XBaseError::malformed(format!("invalid time of day {} ms", millis)));
    }
    let time = NaiveTime::from_num_seconds_from_midnight_opt(
        (millis / 1000) as u32,
        (millis % 1000) as u32 * 1_000_000,
    )
    .ok_or_else(|| XBaseError::malformed(format!("invalid time of day {} ms", millis)))?;
    Ok(Some(date.and_time(time)))
}

/// Decodes a memo block reference.
///
/// Four-byte fields hold a little-endian block index (Visual FoxPro); wider fields
/// hold ASCII digits (dBase). Blank or zero means no memo.
pub(crate) fn memo_reference(field: &[u8]) -> Result<Option<u64>> {
    if field.iter().all(|&b| b == b' ' || b == 0) {
        return Ok(None);
    }
    let block = if field.len() == 4 {
        LittleEndian::read_u32(field) as u64
    } else {
        let digits = trim_ascii_padding(field);
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                XBaseError::malformed(format!(
                    "invalid memo reference {:?}",
                    String::from_utf8_lossy(field)
                ))
            })?
    };
    Ok((block != 0).then_some(block))
}
