//! Forward-only record iteration over the data stream.
//!
//! The cursor owns the data stream and a single record buffer that is overwritten
//! on every advance. It never seeks, so the stream may be a pipe or an archive entry.
//!
//! ```text
//!            advance()                  advance()
//!   Ready ─────────────▶ AtRow ◀──────────────┐
//!     │                    │  └───────────────┘
//!     │ count reached      │ count reached / end of data
//!     └──────────────▶ Exhausted ◀──┘
//!
//!   any state ── close() / read failure / cancellation ──▶ Closed
//! ```

use std::io::Read;

use log::{trace, warn};

use crate::xbase::types::error::{Result, XBaseError};
use crate::xbase::utils;

/// Deletion marker of an active record.
const ACTIVE_MARKER: u8 = b' ';
/// End-of-file byte some writers append after the last record.
const EOF_MARKER: u8 = 0x1a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CursorState {
    Ready,
    AtRow,
    Exhausted,
    Closed,
}

/// What one physical record read produced.
enum Fetch {
    Row,
    Skip,
    End,
}

#[derive(Debug)]
pub(crate) struct RecordCursor<R> {
    /// `None` once closed; dropping it releases an owned stream.
    source: Option<R>,
    buffer: Vec<u8>,
    record_count: u32,
    /// Physical records consumed, deleted ones included.
    records_read: u32,
    /// Rows handed to the caller.
    rows_read: u64,
    read_deleted: bool,
    state: CursorState,
}

impl<R> RecordCursor<R> {
    pub fn new(source: R, record_count: u32, record_length: usize, read_deleted: bool) -> Self {
        Self {
            source: Some(source),
            buffer: vec![0u8; record_length],
            record_count,
            records_read: 0,
            rows_read: 0,
            read_deleted,
            state: CursorState::Ready,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    pub fn records_read(&self) -> u32 {
        self.records_read
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// The current record, deletion marker included.
    pub fn record(&self) -> Result<&[u8]> {
        match self.state {
            CursorState::AtRow => Ok(&self.buffer),
            CursorState::Closed => Err(XBaseError::Closed),
            CursorState::Ready | CursorState::Exhausted => Err(XBaseError::NoCurrentRow),
        }
    }

    pub fn is_deleted(&self) -> Result<bool> {
        Ok(self.record()?[0] != ACTIVE_MARKER)
    }

    pub fn close(&mut self) {
        if self.state != CursorState::Closed {
            trace!("Closing record cursor after {} records", self.records_read);
        }
        self.source = None;
        self.state = CursorState::Closed;
    }

    fn fail(&mut self, error: XBaseError) -> XBaseError {
        self.close();
        error
    }

    /// Decides whether another physical read is needed. `Some` is the final answer.
    fn begin(&mut self) -> Option<Result<bool>> {
        match self.state {
            CursorState::Closed => Some(Err(XBaseError::Closed)),
            CursorState::Exhausted => Some(Ok(false)),
            CursorState::Ready | CursorState::AtRow if self.records_read >= self.record_count => {
                trace!("Declared record count {} reached", self.record_count);
                self.state = CursorState::Exhausted;
                Some(Ok(false))
            }
            CursorState::Ready | CursorState::AtRow => None,
        }
    }

    /// Classifies a read of `got` bytes into the record buffer.
    ///
    /// A short read starting with `0x1A` is the end-of-file marker. A full-length
    /// record is a record whatever its first byte, so a stray `0x1A` deletion
    /// marker reads as a deleted row.
    fn classify(&mut self, got: usize) -> Result<Fetch> {
        if got == 0 || (got < self.buffer.len() && self.buffer[0] == EOF_MARKER) {
            warn!(
                "Data ended after {} of {} declared records",
                self.records_read, self.record_count
            );
            return Ok(Fetch::End);
        }
        if got < self.buffer.len() {
            return Err(XBaseError::malformed(format!(
                "truncated record {}: expected {} bytes, got {}",
                self.records_read,
                self.buffer.len(),
                got
            )));
        }

        self.records_read += 1;
        if self.buffer[0] != ACTIVE_MARKER && !self.read_deleted {
            trace!("Skipping deleted record {}", self.records_read - 1);
            return Ok(Fetch::Skip);
        }
        self.rows_read += 1;
        Ok(Fetch::Row)
    }

    /// Applies a classified read. `Some` is the final answer for this advance.
    fn finish(&mut self, fetched: Result<Fetch>) -> Option<Result<bool>> {
        match fetched {
            Ok(Fetch::Row) => {
                self.state = CursorState::AtRow;
                Some(Ok(true))
            }
            Ok(Fetch::Skip) => None,
            Ok(Fetch::End) => {
                self.state = CursorState::Exhausted;
                Some(Ok(false))
            }
            Err(e) => Some(Err(self.fail(e))),
        }
    }
}

impl<R: Read> RecordCursor<R> {
    /// Moves to the next visible row. Returns `false` once the data is exhausted.
    pub fn advance(&mut self) -> Result<bool> {
        loop {
            if let Some(done) = self.begin() {
                return done;
            }
            let source = self.source.as_mut().ok_or(XBaseError::Closed)?;
            let fetched = match utils::read_block(source, &mut self.buffer) {
                Ok(got) => self.classify(got),
                Err(e) => Err(e.into()),
            };
            if let Some(done) = self.finish(fetched) {
                return done;
            }
        }
    }
}

#[cfg(feature = "async")]
impl<R: tokio::io::AsyncRead + Unpin> RecordCursor<R> {
    /// Async counterpart of [`advance`](Self::advance).
    ///
    /// The cursor is marked closed while a read is in flight, so cancelling the
    /// token or dropping the future leaves it closed.
    pub async fn advance_async(
        &mut self,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<bool> {
        loop {
            if let Some(done) = self.begin() {
                return done;
            }
            self.state = CursorState::Closed;
            let source = self.source.as_mut().ok_or(XBaseError::Closed)?;
            let buffer = &mut self.buffer;
            let read = utils::cancellable(cancel, async move {
                Ok(utils::read_block_async(source, buffer).await?)
            })
            .await;
            self.state = CursorState::Ready;

            let fetched = read.and_then(|got| self.classify(got));
            if let Some(done) = self.finish(fetched) {
                return done;
            }
        }
    }
}
