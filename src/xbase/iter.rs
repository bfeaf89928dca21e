//! Row iteration for callers that want materialized rows.
//!
//! # Example
//! ```no_run
//! # use xbase_reader::{ReaderOptions, XBaseReader};
//! let mut reader = XBaseReader::open("parcels.dbf", None, ReaderOptions::default()).unwrap();
//! for row in reader.rows() {
//!     let row = row.unwrap();
//!     println!("{:?}", row);
//! }
//! ```

use std::io::Read;

use super::reader::XBaseReader;
use super::types::error::Result;
use super::types::value::Value;

/// Iterator over the remaining rows of a reader, each detached from the record buffer.
///
/// Yields `Result<Vec<Value<'static>>>` in schema order. Stops after the first error.
///
/// Created by [`XBaseReader::rows()`](crate::XBaseReader::rows).
pub struct Rows<'a, 'm, R> {
    reader: &'a mut XBaseReader<'m, R>,
    done: bool,
}

impl<'a, 'm, R: Read> Rows<'a, 'm, R> {
    pub(super) fn new(reader: &'a mut XBaseReader<'m, R>) -> Self {
        Self { reader, done: false }
    }

    fn current_row(&self) -> Result<Vec<Value<'static>>> {
        (0..self.reader.field_count())
            .map(|ordinal| self.reader.get_value(ordinal).map(Value::into_owned))
            .collect()
    }
}

impl<R: Read> Iterator for Rows<'_, '_, R> {
    type Item = Result<Vec<Value<'static>>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let row = match self.reader.read() {
            Ok(true) => self.current_row(),
            Ok(false) => {
                self.done = true;
                return None;
            }
            Err(e) => Err(e),
        };
        if row.is_err() {
            self.done = true;
        }
        Some(row)
    }
}
