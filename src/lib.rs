//! # xbase-reader
//!
//! A forward-only reader for xBase tables: dBase III/IV, FoxBase, FoxPro and
//! Visual FoxPro `.dbf` files, with their `.fpt`/`.dbt` memo companions.
//!
//! The data stream is never seeked, so tables can be read straight out of a pipe
//! or a compressed archive entry. Rows are decoded one at a time into a reusable
//! buffer; field values borrow that buffer until the next `read()`.
//!
//! ```no_run
//! use xbase_reader::{ReaderOptions, XBaseReader};
//!
//! let mut reader = XBaseReader::open("parcels.dbf", None, ReaderOptions::default())?;
//! let name = reader.ordinal("NAME").expect("NAME column");
//! while reader.read()? {
//!     println!("{:?}", reader.get_str(name)?);
//! }
//! # Ok::<(), xbase_reader::XBaseError>(())
//! ```
pub mod xbase;

// Re-export the main types for convenience
pub use xbase::{
    XBaseReader,
    codec::encoding::TextEncoding,
    error::{ErrorKind, Result, XBaseError},
    format::memo::MemoSource,
    iter::Rows,
    models::{
        AutoIncrement,
        ColumnDescriptor,
        ColumnFlags,
        FileFlags,
        FileHeader,
        Schema,
        ValueKind,
        XBaseType,
        XBaseVersion,
    },
    options::{ReaderOptions, StringFactory},
    value::Value,
};
