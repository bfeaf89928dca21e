//! Custom error types for the xbase-reader crate.

use thiserror::Error;

use super::models::XBaseType;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum XBaseError {
    /// An error originating from I/O operations on the data or memo stream.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The file is truncated or structurally inconsistent.
    #[error("Malformed xBase data: {0}")]
    MalformedData(String),

    /// The header's language id maps to no available text encoding and no override was given.
    #[error("Unsupported xBase language id {language_id:#04x}{}", code_page_suffix(.code_page))]
    EncodingNotSupported {
        language_id: u8,
        code_page: Option<u16>,
    },

    /// A column declares a type code this reader cannot decode.
    #[error("Column {ordinal} '{name}' has unsupported type code {type_code:#04x}")]
    UnsupportedColumnType {
        ordinal: usize,
        name: String,
        type_code: u8,
    },

    /// A memo-backed column was needed but no memo stream was supplied.
    #[error("Column {ordinal} '{name}' is stored in a memo file, but no memo stream was provided")]
    MissingMemo { ordinal: usize, name: String },

    /// A typed getter was called for a type the column cannot produce.
    #[error("Column {ordinal} of type {actual} cannot be read as {requested}")]
    InvalidCast {
        ordinal: usize,
        actual: XBaseType,
        requested: &'static str,
    },

    /// A field ordinal outside the visible schema.
    #[error("Ordinal {ordinal} is out of range for {field_count} columns")]
    OrdinalOutOfRange { ordinal: usize, field_count: usize },

    /// Field access before the first `read()` or after the reader ran out of rows.
    #[error("The reader is not positioned on a row")]
    NoCurrentRow,

    /// The reader was closed, failed mid-read, or had a read cancelled.
    #[error("The reader is closed")]
    Closed,

    /// A pending asynchronous read was cancelled.
    #[error("The read was cancelled")]
    Cancelled,
}

/// Coarse classification of [`XBaseError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    MalformedData,
    EncodingNotSupported,
    UnsupportedColumnType,
    MissingMemo,
    /// Type-mismatched getter, bad ordinal, or no current row. The reader stays usable.
    InvalidFieldAccess,
    Closed,
}

impl XBaseError {
    /// Returns the error category this failure belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            XBaseError::Io(_) => ErrorKind::Io,
            XBaseError::MalformedData(_) => ErrorKind::MalformedData,
            XBaseError::EncodingNotSupported { .. } => ErrorKind::EncodingNotSupported,
            XBaseError::UnsupportedColumnType { .. } => ErrorKind::UnsupportedColumnType,
            XBaseError::MissingMemo { .. } => ErrorKind::MissingMemo,
            XBaseError::InvalidCast { .. }
            | XBaseError::OrdinalOutOfRange { .. }
            | XBaseError::NoCurrentRow => ErrorKind::InvalidFieldAccess,
            XBaseError::Closed | XBaseError::Cancelled => ErrorKind::Closed,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        XBaseError::MalformedData(message.into())
    }
}

fn code_page_suffix(code_page: &Option<u16>) -> String {
    code_page.map(|cp| format!(" (code page {cp})")).unwrap_or_default()
}

/// A convenience `Result` type alias using the crate's `XBaseError` type.
pub type Result<T> = std::result::Result<T, XBaseError>;
