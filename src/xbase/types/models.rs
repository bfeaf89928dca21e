//! Core data structures for the xBase file format.
//!
//! This module defines the fundamental types used throughout the library:
//! - The fixed file header and its flags
//! - Column descriptors and the visible schema
//! - Type-code and dialect enumerations

use std::fmt;

use chrono::NaiveDate;

/// Dialect tag stored in the first byte of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XBaseVersion {
    FoxBase,
    FoxBasePlusNoMemo,
    VisualFoxPro,
    VisualFoxProAutoIncrement,
    VisualFoxProVarField,
    DBase4SqlTable,
    DBase4SqlSystem,
    FoxBasePlusMemo,
    DBase4Memo,
    DBase4SqlTableMemo,
    FoxProMemo,
    FoxBaseEx,
    Other(u8),
}

impl From<u8> for XBaseVersion {
    fn from(value: u8) -> Self {
        match value {
            0x02 => Self::FoxBase,
            0x03 => Self::FoxBasePlusNoMemo,
            0x30 => Self::VisualFoxPro,
            0x31 => Self::VisualFoxProAutoIncrement,
            0x32 => Self::VisualFoxProVarField,
            0x43 => Self::DBase4SqlTable,
            0x63 => Self::DBase4SqlSystem,
            0x83 => Self::FoxBasePlusMemo,
            0x8b => Self::DBase4Memo,
            0xcb => Self::DBase4SqlTableMemo,
            0xf5 => Self::FoxProMemo,
            0xfb => Self::FoxBaseEx,
            other => Self::Other(other),
        }
    }
}

/// File-level flags from header byte `0x1C`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileFlags {
    pub has_index: bool,
    pub has_memo: bool,
    pub has_database: bool,
}

impl From<u8> for FileFlags {
    fn from(value: u8) -> Self {
        Self {
            has_index: value & 0x01 != 0,
            has_memo: value & 0x02 != 0,
            has_database: value & 0x04 != 0,
        }
    }
}

/// The fixed 32-byte header at the start of every `.dbf` file.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub version: XBaseVersion,
    /// Raw `(years since 1900, month, day)` of the last update.
    pub modified: (u8, u8, u8),
    pub record_count: u32,
    pub header_length: u16,
    pub record_length: u16,
    pub flags: FileFlags,
    pub language_id: u8,
}

impl FileHeader {
    /// Returns the last-modified date, or `None` when the stored components are not a valid date.
    pub fn last_modified(&self) -> Option<NaiveDate> {
        let (year, month, day) = self.modified;
        NaiveDate::from_ymd_opt(1900 + year as i32, month as u32, day as u32)
    }
}

/// Per-column flags from descriptor byte `0x12`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ColumnFlags {
    pub system: bool,
    pub nullable: bool,
    pub binary: bool,
    pub auto_increment: bool,
}

impl From<u8> for ColumnFlags {
    fn from(value: u8) -> Self {
        Self {
            system: value & 0x01 != 0,
            nullable: value & 0x02 != 0,
            binary: value & 0x04 != 0,
            auto_increment: value & 0x0c == 0x0c,
        }
    }
}

/// Auto-increment state stored in the descriptor of an auto-incrementing column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoIncrement {
    pub next_value: i32,
    pub step: u8,
}

/// The semantic type of a column, derived from its one-byte type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XBaseType {
    Character,
    Currency,
    Numeric,
    Float,
    Double,
    Integer,
    Logical,
    Date,
    DateTime,
    Memo,
    General,
    Picture,
    Blob,
    VarBinary,
    VarChar,
    NullFlags,
    Unknown(u8),
}

impl XBaseType {
    /// Maps a descriptor type code to its semantic type.
    ///
    /// `B` is an 8-byte double in Visual FoxPro but a binary memo reference in dBase;
    /// the field width tells them apart.
    pub fn from_code(code: u8, length: usize) -> Self {
        match code {
            b'C' => Self::Character,
            b'Y' => Self::Currency,
            b'N' => Self::Numeric,
            b'F' => Self::Float,
            b'B' if length == 8 => Self::Double,
            b'B' => Self::Blob,
            b'I' => Self::Integer,
            b'L' => Self::Logical,
            b'D' => Self::Date,
            b'T' => Self::DateTime,
            b'M' => Self::Memo,
            b'G' => Self::General,
            b'P' => Self::Picture,
            b'W' => Self::Blob,
            b'Q' => Self::VarBinary,
            b'V' => Self::VarChar,
            b'0' => Self::NullFlags,
            other => Self::Unknown(other),
        }
    }

    /// True for types whose payload lives in the memo file.
    pub fn is_long(&self) -> bool {
        matches!(self, Self::Memo | Self::General | Self::Picture | Self::Blob)
    }

    /// True for types whose effective length is governed by a var-flag bit.
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::VarChar | Self::VarBinary)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for XBaseType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            XBaseType::Unknown(code) => write!(f, "Unknown({:#04x})", code),
            other => write!(f, "{:?}", other),
        }
    }
}

/// The natural value type a column produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Binary,
    Decimal,
    Double,
    Int32,
    Boolean,
    Date,
    DateTime,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ValueKind::Text => "text",
            ValueKind::Binary => "binary",
            ValueKind::Decimal => "decimal",
            ValueKind::Double => "double",
            ValueKind::Int32 => "int32",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
            ValueKind::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

/// A single field descriptor, with its derived byte layout.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    /// Position in the file's descriptor table, hidden columns included.
    pub ordinal: usize,
    pub name: String,
    /// Byte offset within a record. Byte 0 is the deletion marker, so the first column starts at 1.
    pub offset: usize,
    pub length: usize,
    pub decimal_count: u8,
    pub type_code: u8,
    pub flags: ColumnFlags,
    pub data_type: XBaseType,
    pub auto_increment: Option<AutoIncrement>,
    pub(crate) null_bit: Option<usize>,
    pub(crate) var_bit: Option<usize>,
}

impl ColumnDescriptor {
    pub fn is_nullable(&self) -> bool {
        self.flags.nullable
    }

    /// System columns (such as `_NullFlags`) are decoded internally but never exposed.
    pub fn is_hidden(&self) -> bool {
        self.flags.system
    }

    pub fn is_long(&self) -> bool {
        self.data_type.is_long()
    }

    /// Fixed byte size, or `None` for memo-backed columns whose size is unbounded.
    pub fn column_size(&self) -> Option<usize> {
        if self.is_long() { None } else { Some(self.length) }
    }

    /// A zero-width column carries no data and always reads as null.
    pub fn is_placeholder(&self) -> bool {
        self.length == 0
    }

    /// True when the column can produce a null for some row.
    pub fn allows_null(&self) -> bool {
        self.flags.nullable
            || self.is_placeholder()
            || !matches!(
                self.data_type,
                XBaseType::Character
                    | XBaseType::VarChar
                    | XBaseType::VarBinary
                    | XBaseType::Integer
                    | XBaseType::Double
                    | XBaseType::Currency
                    | XBaseType::NullFlags
                    | XBaseType::Unknown(_)
            )
    }

    /// The natural value type of the column.
    pub fn value_kind(&self) -> ValueKind {
        match self.data_type {
            XBaseType::Character | XBaseType::VarChar => ValueKind::Text,
            XBaseType::Memo if !self.flags.binary => ValueKind::Text,
            XBaseType::Currency | XBaseType::Numeric | XBaseType::Float => ValueKind::Decimal,
            XBaseType::Double => ValueKind::Double,
            XBaseType::Integer => ValueKind::Int32,
            XBaseType::Logical => ValueKind::Boolean,
            XBaseType::Date => ValueKind::Date,
            XBaseType::DateTime => ValueKind::DateTime,
            XBaseType::Memo
            | XBaseType::General
            | XBaseType::Picture
            | XBaseType::Blob
            | XBaseType::VarBinary
            | XBaseType::NullFlags
            | XBaseType::Unknown(_) => ValueKind::Binary,
        }
    }

    /// One past the last byte of this column within a record.
    pub(crate) fn end(&self) -> usize {
        self.offset + self.length
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {} {}", self.name, self.length, self.data_type, self.decimal_count)
    }
}

/// The ordered, visible columns of a file. Immutable once the reader is initialized.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<ColumnDescriptor>,
}

impl Schema {
    pub(crate) fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn get(&self, ordinal: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(ordinal)
    }

    /// Finds the ordinal of a column by name, ignoring case.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .or_else(|| {
                let wanted = name.to_lowercase();
                self.columns.iter().position(|c| c.name.to_lowercase() == wanted)
            })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnDescriptor> {
        self.columns.iter()
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a ColumnDescriptor;
    type IntoIter = std::slice::Iter<'a, ColumnDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
