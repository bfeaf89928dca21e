use std::borrow::Cow;
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info, warn};

use super::accessor::{Accessor, Decoded, Decoder, RowContext};
use super::codec::encoding::TextEncoding;
use super::cursor::{CursorState, RecordCursor};
use super::format::header::{self, ParsedHeader};
use super::format::memo::{MemoResolver, MemoSource};
use super::iter::Rows;
use super::types::error::{Result, XBaseError};
use super::types::models::{ColumnDescriptor, FileHeader, Schema};
use super::types::options::ReaderOptions;
use super::types::value::Value;

/// Memo payload and decoded characters of one field of one row.
#[derive(Debug, Default)]
struct FieldCache {
    key: Option<(u32, usize)>,
    bytes: Option<Vec<u8>>,
    chars: Option<Vec<char>>,
}

impl FieldCache {
    /// Returns the cache for `(record, ordinal)`, discarding whatever it held for another field.
    fn at(&mut self, record: u32, ordinal: usize) -> &mut Self {
        if self.key != Some((record, ordinal)) {
            *self = FieldCache {
                key: Some((record, ordinal)),
                ..FieldCache::default()
            };
        }
        self
    }
}

/// A forward-only reader over an xBase (`.dbf`) data stream and its optional memo stream.
///
/// The reader decodes one record at a time into a reusable buffer. Values returned by
/// the getters borrow the reader and must be consumed (or made owned) before the next
/// call to [`read`](Self::read).
///
/// Supports dBase III/IV, FoxBase/FoxPro and Visual FoxPro tables, including
/// nullable and variable-length columns.
#[derive(Debug)]
pub struct XBaseReader<'m, R> {
    header: FileHeader,
    encoding: TextEncoding,
    schema: Arc<Schema>,
    /// One accessor per visible column.
    accessors: Vec<Accessor>,
    /// Byte range of the `_NullFlags` column within a record.
    null_flags: Option<(usize, usize)>,
    cursor: RecordCursor<R>,
    memo: Option<RefCell<MemoResolver<'m>>>,
    cache: RefCell<FieldCache>,
    options: ReaderOptions,
}

impl XBaseReader<'static, BufReader<File>> {
    /// Opens a `.dbf` file from disk, along with its memo file if given.
    ///
    /// The reader owns both files and closes them when dropped or closed.
    pub fn open(path: impl AsRef<Path>, memo_path: Option<&Path>, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening xBase file: {}", path.display());
        let data = BufReader::new(File::open(path)?);
        let memo = match memo_path {
            Some(memo_path) => {
                debug!("Opening memo file: {}", memo_path.display());
                Some(MemoSource::seekable(BufReader::new(File::open(memo_path)?)))
            }
            None => None,
        };
        Self::new(data, memo, options)
    }
}

impl<'m, R: Read> XBaseReader<'m, R> {
    /// Creates a reader over a data stream positioned at the start of a `.dbf` file.
    ///
    /// Reads and validates the header before returning; the stream is left positioned
    /// at the first record. Pass `&mut stream` to keep ownership of the stream.
    ///
    /// # Errors
    /// - `MalformedData` for a truncated or inconsistent header
    /// - `EncodingNotSupported` for an unmapped language id without an override
    /// - `UnsupportedColumnType` for an unknown column type without tolerance
    /// - `MissingMemo` for memo-backed columns without a memo stream, unless
    ///   `ignore_missing_memo` is set
    pub fn new(mut data: R, memo: Option<MemoSource<'m>>, options: ReaderOptions) -> Result<Self> {
        let parsed = header::parse(&mut data, &options)?;
        Self::assemble(parsed, data, memo, options)
    }

    /// Advances to the next row. Returns `false` once no rows remain.
    ///
    /// Deleted rows are skipped unless `read_deleted_records` is set. Any failure
    /// closes the reader.
    pub fn read(&mut self) -> Result<bool> {
        self.cursor.advance()
    }

    /// Returns an iterator of owned rows, starting at the next unread row.
    pub fn rows(&mut self) -> Rows<'_, 'm, R> {
        Rows::new(self)
    }
}

#[cfg(feature = "async")]
impl<'m, R: tokio::io::AsyncRead + Unpin> XBaseReader<'m, R> {
    /// Async counterpart of [`new`](XBaseReader::new).
    ///
    /// The header bytes are fetched asynchronously and parsed by the same header parser.
    /// The memo stream stays synchronous and is read only when memo fields are accessed.
    ///
    /// # Errors
    /// As for [`new`](XBaseReader::new), plus `Cancelled` if `cancel` fires first.
    pub async fn new_async(
        mut data: R,
        memo: Option<MemoSource<'m>>,
        options: ReaderOptions,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<Self> {
        let bytes = super::utils::cancellable(cancel, read_header_async(&mut data)).await?;
        let parsed = header::parse(&mut bytes.as_slice(), &options)?;
        Self::assemble(parsed, data, memo, options)
    }

    /// Async counterpart of [`read`](XBaseReader::read).
    ///
    /// If `cancel` fires, or the returned future is dropped, before the read completes,
    /// the reader is left closed.
    pub async fn read_async(&mut self, cancel: &tokio_util::sync::CancellationToken) -> Result<bool> {
        self.cursor.advance_async(cancel).await
    }
}

/// Fetches exactly the declared header bytes, or fewer if the stream ends early.
#[cfg(feature = "async")]
async fn read_header_async<R>(data: &mut R) -> Result<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use byteorder::{ByteOrder, LittleEndian};

    let mut bytes = vec![0u8; header::FILE_HEADER_LEN];
    let got = super::utils::read_block_async(data, &mut bytes).await?;
    bytes.truncate(got);
    if got == header::FILE_HEADER_LEN {
        let declared = LittleEndian::read_i16(&bytes[8..10]);
        if declared > header::FILE_HEADER_LEN as i16 {
            bytes.resize(declared as usize, 0);
            let got = super::utils::read_block_async(data, &mut bytes[header::FILE_HEADER_LEN..]).await?;
            bytes.truncate(header::FILE_HEADER_LEN + got);
        }
    }
    Ok(bytes)
}

impl<'m, R> XBaseReader<'m, R> {
    fn assemble(parsed: ParsedHeader, data: R, memo: Option<MemoSource<'m>>, options: ReaderOptions) -> Result<Self> {
        let null_flags = parsed.null_flags_column().map(|c| (c.offset, c.end()));
        let ParsedHeader {
            header,
            encoding,
            columns,
            ..
        } = parsed;

        let visible: Vec<ColumnDescriptor> = columns.into_iter().filter(|c| !c.is_hidden()).collect();
        let first_memo_column = visible.iter().position(|c| c.is_long());

        if memo.is_none()
            && let Some(ordinal) = first_memo_column
        {
            let name = visible[ordinal].name.clone();
            if !options.ignore_missing_memo {
                return Err(XBaseError::MissingMemo { ordinal, name });
            }
            warn!(
                "No memo stream supplied; memo column {} '{}' and any others fail on access",
                ordinal, name
            );
        }

        let memo = match memo {
            Some(source) => Some(RefCell::new(MemoResolver::open(source)?)),
            None => None,
        };
        let accessors: Vec<Accessor> = visible
            .iter()
            .map(|c| Accessor::for_column(c, memo.is_some()))
            .collect();

        info!(
            "xBase reader ready: {} visible columns, {} declared records, memo={}",
            visible.len(),
            header.record_count,
            memo.is_some()
        );

        let cursor = RecordCursor::new(
            data,
            header.record_count,
            header.record_length as usize,
            options.read_deleted_records,
        );
        Ok(Self {
            header,
            encoding,
            schema: Arc::new(Schema::new(visible)),
            accessors,
            null_flags,
            cursor,
            memo,
            cache: RefCell::new(FieldCache::default()),
            options,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// The text encoding used for column names and text values.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// The visible columns, shared with every row this reader produces.
    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn field_count(&self) -> usize {
        self.schema.len()
    }

    pub fn column(&self, ordinal: usize) -> Result<&ColumnDescriptor> {
        self.schema.get(ordinal).ok_or(XBaseError::OrdinalOutOfRange {
            ordinal,
            field_count: self.schema.len(),
        })
    }

    /// Finds a column by name, ignoring case.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.schema.ordinal(name)
    }

    pub fn data_type_name(&self, ordinal: usize) -> Result<String> {
        Ok(self.column(ordinal)?.data_type.to_string())
    }

    /// True when the header declares at least one record.
    pub fn has_rows(&self) -> bool {
        self.header.record_count > 0
    }

    /// One-based number of the current row among the rows yielded so far.
    pub fn row_number(&self) -> Option<u64> {
        (self.cursor.state() == CursorState::AtRow).then(|| self.cursor.rows_read())
    }

    /// Physical records consumed from the stream, deleted records included.
    pub fn records_read(&self) -> u32 {
        self.cursor.records_read()
    }

    pub fn is_deleted_row(&self) -> Result<bool> {
        self.cursor.is_deleted()
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.is_closed()
    }

    /// Releases the data and memo streams. Owned streams are dropped; borrowed ones are left open.
    pub fn close(&mut self) {
        if !self.cursor.is_closed() {
            info!("Closing xBase reader after {} rows", self.cursor.rows_read());
        }
        self.cursor.close();
        self.memo = None;
        *self.cache.get_mut() = FieldCache::default();
    }

    /// The current record, the column and its accessor for a visible ordinal.
    fn current(&self, ordinal: usize) -> Result<(RowContext<'_>, &ColumnDescriptor, Accessor)> {
        if self.cursor.is_closed() {
            return Err(XBaseError::Closed);
        }
        let column = self.column(ordinal)?;
        let record = self.cursor.record()?;
        let null_flags = match self.null_flags {
            Some((start, end)) => &record[start..end],
            None => &[],
        };
        let ctx = RowContext {
            record,
            null_flags,
            encoding: self.encoding,
        };
        Ok((ctx, column, self.accessors[ordinal]))
    }

    fn invalid_cast(&self, ordinal: usize, requested: &'static str) -> XBaseError {
        match self.column(ordinal) {
            Ok(column) => XBaseError::InvalidCast {
                ordinal,
                actual: column.data_type,
                requested,
            },
            Err(e) => e,
        }
    }

    /// Runs `f` over the memo payload of `ordinal` in the current row, reading it at most once.
    fn with_memo<T>(&self, ordinal: usize, block: u64, f: impl FnOnce(&[u8]) -> T) -> Result<T> {
        let record = self.cursor.records_read();
        let mut cache = self.cache.borrow_mut();
        let entry = cache.at(record, ordinal);
        let bytes = match entry.bytes.take() {
            Some(bytes) => bytes,
            None => {
                let memo = self.memo.as_ref().ok_or_else(|| XBaseError::MissingMemo {
                    ordinal,
                    name: self.schema.columns()[ordinal].name.clone(),
                })?;
                memo.borrow_mut().read_memo(block)?.to_vec()
            }
        };
        let result = f(&bytes);
        entry.bytes = Some(bytes);
        Ok(result)
    }

    /// True when the field is null in the current row.
    pub fn is_null(&self, ordinal: usize) -> Result<bool> {
        let (ctx, column, accessor) = self.current(ordinal)?;
        accessor.is_null(&ctx, column)
    }

    /// Returns the field in its natural type.
    ///
    /// Memo values are read from the memo stream on first access and returned owned.
    pub fn get_value(&self, ordinal: usize) -> Result<Value<'_>> {
        let (ctx, column, accessor) = self.current(ordinal)?;
        match accessor.decode(&ctx, column)? {
            Decoded::Value(value) => Ok(value),
            Decoded::Memo { block, text: true } => {
                let encoding = self.encoding;
                self.with_memo(ordinal, block, |bytes| {
                    Value::Text(Cow::Owned(encoding.decode(bytes).into_owned()))
                })
            }
            Decoded::Memo { block, text: false } => {
                self.with_memo(ordinal, block, |bytes| Value::Binary(Cow::Owned(bytes.to_vec())))
            }
        }
    }

    /// Copies the current row's values into `values`, returning how many were copied.
    pub fn get_values<'s>(&'s self, values: &mut [Value<'s>]) -> Result<usize> {
        let count = values.len().min(self.field_count());
        for (ordinal, slot) in values.iter_mut().take(count).enumerate() {
            *slot = self.get_value(ordinal)?;
        }
        Ok(count)
    }

    pub fn get_bool(&self, ordinal: usize) -> Result<Option<bool>> {
        match self.get_value(ordinal)? {
            Value::Null => Ok(None),
            Value::Boolean(v) => Ok(Some(v)),
            _ => Err(self.invalid_cast(ordinal, "boolean")),
        }
    }

    pub fn get_i32(&self, ordinal: usize) -> Result<Option<i32>> {
        match self.get_value(ordinal)? {
            Value::Null => Ok(None),
            Value::Int32(v) => Ok(Some(v)),
            _ => Err(self.invalid_cast(ordinal, "int32")),
        }
    }

    /// Reads Integer columns and integral Numeric values.
    pub fn get_i64(&self, ordinal: usize) -> Result<Option<i64>> {
        match self.get_value(ordinal)? {
            Value::Null => Ok(None),
            Value::Int32(v) => Ok(Some(v as i64)),
            Value::Decimal(d) if d.with_scale(0) == d => {
                d.to_i64().map(Some).ok_or_else(|| self.invalid_cast(ordinal, "int64"))
            }
            _ => Err(self.invalid_cast(ordinal, "int64")),
        }
    }

    /// Reads Double, Integer and any decimal column, with possible loss of precision.
    pub fn get_f64(&self, ordinal: usize) -> Result<Option<f64>> {
        match self.get_value(ordinal)? {
            Value::Null => Ok(None),
            Value::Double(v) => Ok(Some(v)),
            Value::Int32(v) => Ok(Some(v as f64)),
            Value::Decimal(d) => d.to_f64().map(Some).ok_or_else(|| self.invalid_cast(ordinal, "double")),
            _ => Err(self.invalid_cast(ordinal, "double")),
        }
    }

    pub fn get_decimal(&self, ordinal: usize) -> Result<Option<BigDecimal>> {
        match self.get_value(ordinal)? {
            Value::Null => Ok(None),
            Value::Decimal(d) => Ok(Some(d)),
            Value::Int32(v) => Ok(Some(BigDecimal::from(v))),
            _ => Err(self.invalid_cast(ordinal, "decimal")),
        }
    }

    pub fn get_date(&self, ordinal: usize) -> Result<Option<NaiveDate>> {
        match self.get_value(ordinal)? {
            Value::Null => Ok(None),
            Value::Date(d) => Ok(Some(d)),
            Value::DateTime(dt) => Ok(Some(dt.date())),
            _ => Err(self.invalid_cast(ordinal, "date")),
        }
    }

    /// Reads DateTime columns, and Date columns at midnight.
    pub fn get_datetime(&self, ordinal: usize) -> Result<Option<NaiveDateTime>> {
        match self.get_value(ordinal)? {
            Value::Null => Ok(None),
            Value::DateTime(dt) => Ok(Some(dt)),
            Value::Date(d) => Ok(Some(d.and_time(NaiveTime::default()))),
            _ => Err(self.invalid_cast(ordinal, "datetime")),
        }
    }

    /// Reads a text column. The result borrows the current record when possible.
    pub fn get_str(&self, ordinal: usize) -> Result<Option<Cow<'_, str>>> {
        match self.get_value(ordinal)? {
            Value::Null => Ok(None),
            Value::Text(text) => Ok(Some(text)),
            _ => Err(self.invalid_cast(ordinal, "string")),
        }
    }

    pub fn get_string(&self, ordinal: usize) -> Result<Option<String>> {
        Ok(self.get_str(ordinal)?.map(Cow::into_owned))
    }

    /// Reads a text column through the configured string factory, if any.
    pub fn get_shared_str(&self, ordinal: usize) -> Result<Option<Arc<str>>> {
        Ok(self.get_str(ordinal)?.map(|text| match &self.options.string_factory {
            Some(factory) => factory(&text),
            None => Arc::from(text.as_ref()),
        }))
    }

    /// Reads a binary column: VarBinary, binary memo, General, Picture, Blob or raw unknown.
    pub fn get_bytes(&self, ordinal: usize) -> Result<Option<Cow<'_, [u8]>>> {
        match self.get_value(ordinal)? {
            Value::Null => Ok(None),
            Value::Binary(bytes) => Ok(Some(bytes)),
            _ => Err(self.invalid_cast(ordinal, "bytes")),
        }
    }

    /// The field's bytes exactly as stored in the record, ignoring null flags.
    pub fn get_bytes_raw(&self, ordinal: usize) -> Result<&[u8]> {
        let (ctx, column, _) = self.current(ordinal)?;
        Ok(ctx.field(column))
    }

    /// Copies bytes of the field starting at `offset` into `buf`.
    ///
    /// Works on binary columns and on memo columns (text memos yield their stored bytes).
    /// Returns the number of bytes copied; 0 at or past the end, or for null.
    pub fn read_bytes(&self, ordinal: usize, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let (ctx, column, accessor) = self.current(ordinal)?;
        match accessor.decode(&ctx, column)? {
            Decoded::Memo { block, .. } => self.with_memo(ordinal, block, |bytes| copy_window(bytes, offset, buf)),
            Decoded::Value(Value::Null) => Ok(0),
            Decoded::Value(Value::Binary(bytes)) => Ok(copy_window(&bytes, offset, buf)),
            Decoded::Value(_) => Err(self.invalid_cast(ordinal, "bytes")),
        }
    }

    /// Copies characters of a text field starting at character `offset` into `buf`.
    ///
    /// The decoded characters are kept until another field or row is read, so reading
    /// a long memo in chunks decodes it once.
    pub fn read_chars(&self, ordinal: usize, offset: usize, buf: &mut [char]) -> Result<usize> {
        let (_, _, accessor) = self.current(ordinal)?;
        if !is_text(accessor.decoder()) {
            return Err(self.invalid_cast(ordinal, "chars"));
        }
        let record = self.cursor.records_read();
        if let Some(chars) = &self.cache.borrow_mut().at(record, ordinal).chars {
            return Ok(copy_window(chars, offset, buf));
        }

        let chars: Vec<char> = match self.get_value(ordinal)? {
            Value::Text(text) => text.chars().collect(),
            _ => return Ok(0),
        };
        let copied = copy_window(&chars, offset, buf);
        self.cache.borrow_mut().at(record, ordinal).chars = Some(chars);
        Ok(copied)
    }
}

fn is_text(decoder: Decoder) -> bool {
    matches!(
        decoder,
        Decoder::Character | Decoder::VarChar { .. } | Decoder::Memo { text: true } | Decoder::MissingMemo
    )
}

fn copy_window<T: Copy>(source: &[T], offset: usize, buf: &mut [T]) -> usize {
    let Some(rest) = source.get(offset..) else {
        return 0;
    };
    let count = rest.len().min(buf.len());
    buf[..count].copy_from_slice(&rest[..count]);
    count
}
