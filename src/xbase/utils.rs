//! Low-level byte reading utilities.
//!
//! Everything here reads forward only, so the same code works over files,
//! pipes and archive entries.

use std::io::{self, Read};

use crate::xbase::types::error::{Result, XBaseError};

/// Fills `buf` from `reader`, looping over partial reads.
///
/// Returns the number of bytes read, which is less than `buf.len()` only when the
/// stream reported end-of-data.
pub fn read_block<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads exactly `buf.len()` bytes of a fixed-size structure.
///
/// A short read is reported as malformed data naming `context`.
pub fn read_exact_section<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    context: &str,
) -> Result<()> {
    let got = read_block(reader, buf)?;
    if got != buf.len() {
        return Err(XBaseError::malformed(format!(
            "truncated {}: expected {} bytes, got {}",
            context,
            buf.len(),
            got
        )));
    }
    Ok(())
}

/// Advances `reader` by `count` bytes by reading and discarding them.
pub fn skip<R: Read + ?Sized>(reader: &mut R, count: u64, context: &str) -> Result<()> {
    let mut limited = (&mut *reader).take(count);
    let copied = io::copy(&mut limited, &mut io::sink())?;
    if copied != count {
        return Err(XBaseError::malformed(format!(
            "truncated {}: expected {} bytes, got {}",
            context, count, copied
        )));
    }
    Ok(())
}

/// Returns the bytes of a NUL-terminated field of at most `max_len` bytes.
pub fn zstring(bytes: &[u8], max_len: usize) -> &[u8] {
    let field = &bytes[..max_len.min(bytes.len())];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

/// Async counterpart of [`read_block`].
#[cfg(feature = "async")]
pub async fn read_block_async<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: tokio::io::AsyncRead + Unpin + ?Sized,
{
    use tokio::io::AsyncReadExt;

    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Runs `future` unless `cancel` fires first.
#[cfg(feature = "async")]
pub async fn cancellable<F, T>(
    cancel: &tokio_util::sync::CancellationToken,
    future: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(XBaseError::Cancelled),
        result = future => result,
    }
}
