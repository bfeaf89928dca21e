//! Reader configuration.

use std::fmt;
use std::sync::Arc;

use crate::xbase::codec::encoding::TextEncoding;

/// A function that can de-duplicate strings as they are produced from the record buffer.
///
/// Receives the decoded field text and returns the shared string to hand out.
pub type StringFactory = Arc<dyn Fn(&str) -> Arc<str> + Send + Sync>;

/// Options consulted while opening and reading a file.
#[derive(Clone, Default)]
pub struct ReaderOptions {
    /// When `false` (the default), opening a file with memo-backed columns but no memo
    /// stream fails immediately. When `true`, only accessing those columns fails;
    /// every other column stays readable.
    pub ignore_missing_memo: bool,

    /// When `true`, columns of unknown type are exposed as raw bytes instead of failing
    /// initialization with `UnsupportedColumnType`.
    pub ignore_unsupported_types: bool,

    /// When `true`, rows whose deletion marker is set are yielded instead of skipped.
    pub read_deleted_records: bool,

    /// Explicit text encoding. Overrides the language id in the file header.
    pub encoding: Option<TextEncoding>,

    /// Optional string de-duplication, used by `get_shared_str`.
    pub string_factory: Option<StringFactory>,
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore_missing_memo(mut self, value: bool) -> Self {
        self.ignore_missing_memo = value;
        self
    }

    pub fn with_ignore_unsupported_types(mut self, value: bool) -> Self {
        self.ignore_unsupported_types = value;
        self
    }

    pub fn with_read_deleted_records(mut self, value: bool) -> Self {
        self.read_deleted_records = value;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<TextEncoding>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_string_factory(mut self, factory: StringFactory) -> Self {
        self.string_factory = Some(factory);
        self
    }
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("ignore_missing_memo", &self.ignore_missing_memo)
            .field("ignore_unsupported_types", &self.ignore_unsupported_types)
            .field("read_deleted_records", &self.read_deleted_records)
            .field("encoding", &self.encoding)
            .field("string_factory", &self.string_factory.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
