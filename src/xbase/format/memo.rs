//! Memo file (`.fpt` / `.dbt`) block resolution.
//!
//! Memo-backed columns store a block index in the record; the payload lives in a
//! companion file addressed as `block_index * block_size`.
//!
//! # Memo Header
//! ```text
//! [0..4]   next free block
//! [6..8]   block size (u16 BE); 0 means 512 (dBase III)
//! ...      padded to 512 bytes, followed by a second 512-byte page
//! ```
//!
//! # Block Layouts
//! ```text
//! FoxPro:    [4 bytes] block type (BE) [4 bytes] length (BE) [payload]
//! dBase IV:  FF FF 08 00 [4 bytes] length incl. header (LE) [payload]
//! dBase III: [payload] 0x1A
//! ```

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::{debug, trace};

use crate::xbase::types::error::{Result, XBaseError};
use crate::xbase::utils;

pub const MEMO_HEADER_LEN: usize = 512;
const DEFAULT_BLOCK_SIZE: u64 = 512;
const BLOCK_HEADER_LEN: usize = 8;
const DBASE4_SIGNATURE: [u8; 4] = [0xff, 0xff, 0x08, 0x00];
const DBASE3_TERMINATOR: u8 = 0x1a;
/// Highest FoxPro block type (0 picture, 1 text, 2 object).
const MAX_FOXPRO_BLOCK_TYPE: u32 = 2;

/// A stream that can both read and seek.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

enum MemoStream<'a> {
    Seekable(Box<dyn ReadSeek + Send + 'a>),
    ForwardOnly(Box<dyn Read + Send + 'a>),
}

/// A memo stream whose seek capability is fixed at construction.
///
/// Pass an owned value (such as `File`) to hand the stream to the reader, or a
/// `&mut` borrow to keep ownership with the caller.
pub struct MemoSource<'a> {
    stream: MemoStream<'a>,
}

impl<'a> MemoSource<'a> {
    /// Wraps a stream that supports direct seeks.
    pub fn seekable<S: Read + Seek + Send + 'a>(stream: S) -> Self {
        Self {
            stream: MemoStream::Seekable(Box::new(stream)),
        }
    }

    /// Wraps a stream that can only be read forward, such as an archive entry.
    ///
    /// Blocks must then be referenced in ascending order; skipping forward is
    /// done by reading and discarding.
    pub fn forward_only<S: Read + Send + 'a>(stream: S) -> Self {
        Self {
            stream: MemoStream::ForwardOnly(Box::new(stream)),
        }
    }

    pub fn is_seekable(&self) -> bool {
        matches!(self.stream, MemoStream::Seekable(_))
    }

    /// Seeks when supported; `None` for forward-only streams.
    fn seek_to(&mut self, position: u64) -> Option<io::Result<u64>> {
        match &mut self.stream {
            MemoStream::Seekable(s) => Some(s.seek(SeekFrom::Start(position))),
            MemoStream::ForwardOnly(_) => None,
        }
    }
}

impl Read for MemoSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stream {
            MemoStream::Seekable(s) => s.read(buf),
            MemoStream::ForwardOnly(s) => s.read(buf),
        }
    }
}

impl fmt::Debug for MemoSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MemoSource")
            .field("seekable", &self.is_seekable())
            .finish()
    }
}

/// Resolves in-record block references into memo payloads.
#[derive(Debug)]
pub struct MemoResolver<'a> {
    source: MemoSource<'a>,
    block_size: u64,
    /// Bytes consumed from the start of the memo stream.
    position: u64,
    /// The second header page. Blocks of small-block files may start inside it.
    page: Vec<u8>,
    buffer: Vec<u8>,
}

impl<'a> MemoResolver<'a> {
    /// Reads the memo header and prepares for block lookups.
    ///
    /// # Errors
    /// `MalformedData` if the first 512-byte header page is truncated.
    pub fn open(mut source: MemoSource<'a>) -> Result<Self> {
        let mut page = vec![0u8; MEMO_HEADER_LEN];
        utils::read_exact_section(&mut source, &mut page, "memo header")?;

        let declared = BigEndian::read_u16(&page[6..8]) as u64;
        let block_size = if declared == 0 { DEFAULT_BLOCK_SIZE } else { declared };

        // Second header page; a short read here just means a memo file with no blocks.
        let second = utils::read_block(&mut source, &mut page)?;
        page.truncate(second);
        let position = (MEMO_HEADER_LEN + second) as u64;

        debug!(
            "Memo header: block size {} (declared {}), seekable={}",
            block_size,
            declared,
            source.is_seekable()
        );

        Ok(Self {
            source,
            block_size,
            position,
            page,
            buffer: Vec::new(),
        })
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Reads the payload of the memo stored at `block`.
    ///
    /// The returned slice is valid until the next call.
    pub fn read_memo(&mut self, block: u64) -> Result<&[u8]> {
        let target = block.checked_mul(self.block_size).ok_or_else(|| {
            XBaseError::malformed(format!("memo block {} is out of range", block))
        })?;
        let replay = self.position_at(target)?;

        self.buffer.clear();
        let consumed = match replay {
            Some(offset) => {
                let page = &self.page[offset..];
                let mut input = page.chain(&mut self.source);
                let read = decode_block(&mut input, block, self.block_size, &mut self.buffer)?;
                read.saturating_sub(page.len() as u64)
            }
            None => decode_block(&mut self.source, block, self.block_size, &mut self.buffer)?,
        };
        self.position += consumed;
        Ok(&self.buffer)
    }

    /// Moves the stream to `target`. `Some(offset)` means the block starts inside the
    /// retained header page at that offset and must be replayed from it.
    fn position_at(&mut self, target: u64) -> Result<Option<usize>> {
        if target == self.position {
            return Ok(None);
        }
        if let Some(result) = self.source.seek_to(target) {
            result?;
            self.position = target;
            return Ok(None);
        }
        if target < self.position {
            let page_start = MEMO_HEADER_LEN as u64;
            let page_end = page_start + self.page.len() as u64;
            if self.position == page_end && target >= page_start {
                return Ok(Some((target - page_start) as usize));
            }
            return Err(XBaseError::malformed(format!(
                "memo offset {} precedes position {} of a forward-only memo stream",
                target, self.position
            )));
        }
        utils::skip(&mut self.source, target - self.position, "memo stream")?;
        self.position = target;
        Ok(None)
    }
}

/// Decodes one memo block from `input` into `buffer`, returning the bytes consumed.
fn decode_block<R: Read + ?Sized>(
    input: &mut R,
    block: u64,
    block_size: u64,
    buffer: &mut Vec<u8>,
) -> Result<u64> {
    let mut head = [0u8; BLOCK_HEADER_LEN];
    let got = utils::read_block(input, &mut head)?;

    if got == BLOCK_HEADER_LEN && head[..4] == DBASE4_SIGNATURE {
        let total = LittleEndian::read_u32(&head[4..8]) as u64;
        let length = total.checked_sub(BLOCK_HEADER_LEN as u64).ok_or_else(|| {
            XBaseError::malformed(format!("memo block {} declares length {}", block, total))
        })?;
        trace!("dBase IV memo block {}: {} bytes", block, length);
        Ok(got as u64 + read_payload(input, length, buffer)?)
    } else if got == BLOCK_HEADER_LEN && BigEndian::read_u32(&head[..4]) <= MAX_FOXPRO_BLOCK_TYPE {
        let length = BigEndian::read_u32(&head[4..8]) as u64;
        trace!(
            "FoxPro memo block {}: type {} with {} bytes",
            block,
            BigEndian::read_u32(&head[..4]),
            length
        );
        Ok(got as u64 + read_payload(input, length, buffer)?)
    } else if got == 0 {
        Err(XBaseError::malformed(format!(
            "memo block {} lies beyond the end of the memo stream",
            block
        )))
    } else {
        buffer.extend_from_slice(&head[..got]);
        let read = read_terminated(input, block_size, buffer)?;
        trace!("dBase III memo block {}: {} bytes", block, buffer.len());
        Ok(got as u64 + read)
    }
}

fn read_payload<R: Read + ?Sized>(input: &mut R, length: u64, buffer: &mut Vec<u8>) -> Result<u64> {
    let read = (&mut *input).take(length).read_to_end(buffer)? as u64;
    if read != length {
        return Err(XBaseError::malformed(format!(
            "truncated memo block: expected {} bytes, got {}",
            length, read
        )));
    }
    Ok(read)
}

/// Reads block-sized chunks until the dBase III terminator or end of stream.
fn read_terminated<R: Read + ?Sized>(input: &mut R, block_size: u64, buffer: &mut Vec<u8>) -> Result<u64> {
    let mut searched = 0;
    let mut consumed = 0;
    loop {
        if let Some(end) = buffer[searched..].iter().position(|&b| b == DBASE3_TERMINATOR) {
            buffer.truncate(searched + end);
            return Ok(consumed);
        }
        searched = buffer.len();
        let read = (&mut *input).take(block_size).read_to_end(buffer)? as u64;
        consumed += read;
        if read == 0 {
            return Ok(consumed);
        }
    }
}
