//! xBase file header and field-descriptor parsing.
//!
//! This module handles:
//! - Parsing the fixed 32-byte file header
//! - Resolving the text encoding from the language id
//! - Parsing the field-descriptor table and deriving each column's byte layout
//! - Assigning null/var flag bits
//! - Consuming the rest of the header so the stream sits at the first record
//!
//! # Header Structure
//! ```text
//! [32 bytes]      File header
//! [32 bytes] × n  Field descriptors
//! [1 byte]        0x0D terminator
//! [k bytes]       Padding / backlink, up to the declared header length
//! ```

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info, trace, warn};

use crate::xbase::codec::encoding::{self, TextEncoding};
use crate::xbase::types::error::{Result, XBaseError};
use crate::xbase::types::models::{
    AutoIncrement, ColumnDescriptor, ColumnFlags, FileFlags, FileHeader, XBaseType, XBaseVersion,
};
use crate::xbase::types::options::ReaderOptions;
use crate::xbase::utils;

pub const FILE_HEADER_LEN: usize = 32;
pub const DESCRIPTOR_LEN: usize = 32;
pub const FIELD_TERMINATOR: u8 = 0x0d;
/// The format's own ceiling on the number of field descriptors.
pub const MAX_FIELDS: usize = 128;
/// Name of the hidden system column carrying null/var flag bits.
pub const NULL_FLAGS_COLUMN: &str = "_NullFlags";

const NAME_LEN: usize = 10;

/// Everything learned from the header, in file order.
#[derive(Debug)]
pub struct ParsedHeader {
    pub header: FileHeader,
    pub encoding: TextEncoding,
    /// All columns in descriptor order, system columns included.
    pub columns: Vec<ColumnDescriptor>,
    /// Number of null/var flag bits assigned across all columns.
    pub flag_bits: usize,
}

impl ParsedHeader {
    /// The hidden column holding the null/var bitmask, if the file has one.
    pub fn null_flags_column(&self) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.is_hidden() && (c.name == NULL_FLAGS_COLUMN || c.data_type == XBaseType::NullFlags))
    }
}

/// Parses the header from the beginning of a `.dbf` stream.
///
/// On success the stream is positioned exactly at the first record. No seeking
/// is performed, so `reader` may be a pipe or an archive entry.
///
/// # Errors
/// - `MalformedData` on truncated sections or inconsistent lengths
/// - `EncodingNotSupported` for an unmapped language id without an override
/// - `UnsupportedColumnType` for an unknown type code unless tolerated by `options`
pub fn parse<R: Read + ?Sized>(reader: &mut R, options: &ReaderOptions) -> Result<ParsedHeader> {
    trace!("Parsing xBase file header");

    // Step 1: Fixed header
    let mut fixed = [0u8; FILE_HEADER_LEN];
    utils::read_exact_section(reader, &mut fixed, "file header")?;
    let header = parse_fixed(&fixed)?;
    let mut consumed = FILE_HEADER_LEN;

    // Step 2: Text encoding
    let encoding = encoding::resolve(header.language_id, options.encoding)?;

    // Step 3: Field descriptors, until the terminator or the field ceiling
    let mut columns = Vec::with_capacity(16);
    let mut descriptor = [0u8; DESCRIPTOR_LEN];
    let mut offset = 1;
    let mut flag_bits = 0;
    for ordinal in 0..MAX_FIELDS {
        utils::read_exact_section(reader, &mut descriptor[..1], "field descriptor table")?;
        consumed += 1;
        if descriptor[0] == FIELD_TERMINATOR {
            break;
        }
        utils::read_exact_section(reader, &mut descriptor[1..], "field descriptor")?;
        consumed += DESCRIPTOR_LEN - 1;

        let column = parse_descriptor(&descriptor, ordinal, offset, encoding, &mut flag_bits);
        trace!(
            "Column {}: '{}' type={} offset={} length={} decimals={} flags={:?}",
            ordinal,
            column.name,
            column.data_type,
            column.offset,
            column.length,
            column.decimal_count,
            column.flags
        );

        if !column.is_hidden() && column.data_type.is_unknown() {
            if !options.ignore_unsupported_types {
                return Err(XBaseError::UnsupportedColumnType {
                    ordinal,
                    name: column.name,
                    type_code: column.type_code,
                });
            }
            debug!(
                "Column {} '{}' has unknown type code {:#04x}; exposing raw bytes",
                ordinal, column.name, column.type_code
            );
        }

        offset += column.length;
        columns.push(column);
    }

    // Step 4: Layout validation
    let header_length = header.header_length as usize;
    if header_length < consumed {
        return Err(XBaseError::malformed(format!(
            "header length {} is shorter than its {} descriptors ({} bytes)",
            header_length,
            columns.len(),
            consumed
        )));
    }
    let record_length = header.record_length as usize;
    if record_length < offset {
        return Err(XBaseError::malformed(format!(
            "record length {} is shorter than the field layout ({} bytes)",
            record_length, offset
        )));
    }
    if record_length > offset {
        warn!(
            "Record length {} exceeds the field layout ({} bytes); trailing bytes are ignored",
            record_length, offset
        );
    }

    // Step 5: Consume the rest of the header with forward reads only
    let remaining = header_length - consumed;
    if remaining > 0 {
        trace!("Skipping {} trailing header bytes", remaining);
        utils::skip(reader, remaining as u64, "header padding")?;
    }

    let parsed = ParsedHeader {
        header,
        encoding,
        columns,
        flag_bits,
    };
    check_flag_bits(&parsed);

    info!(
        "xBase header parsed: version={:?}, records={}, columns={}, record_length={}, encoding={}",
        parsed.header.version,
        parsed.header.record_count,
        parsed.columns.iter().filter(|c| !c.is_hidden()).count(),
        parsed.header.record_length,
        parsed.encoding.name()
    );
    Ok(parsed)
}

/// Decodes the fixed 32-byte file header.
///
/// ```text
/// [0]      version
/// [1..4]   last update (YY since 1900, MM, DD)
/// [4..8]   record count (i32 LE)
/// [8..10]  header length (i16 LE)
/// [10..12] record length (i16 LE)
/// [28]     file flags
/// [29]     language id
/// ```
pub fn parse_fixed(bytes: &[u8; FILE_HEADER_LEN]) -> Result<FileHeader> {
    let record_count = LittleEndian::read_i32(&bytes[4..8]);
    let header_length = LittleEndian::read_i16(&bytes[8..10]);
    let record_length = LittleEndian::read_i16(&bytes[10..12]);

    if record_count < 0 {
        return Err(XBaseError::malformed(format!("negative record count {}", record_count)));
    }
    if header_length < (FILE_HEADER_LEN + 1) as i16 {
        return Err(XBaseError::malformed(format!("invalid header length {}", header_length)));
    }
    if record_length <= 0 {
        return Err(XBaseError::malformed(format!("invalid record length {}", record_length)));
    }

    let header = FileHeader {
        version: XBaseVersion::from(bytes[0]),
        modified: (bytes[1], bytes[2], bytes[3]),
        record_count: record_count as u32,
        header_length: header_length as u16,
        record_length: record_length as u16,
        flags: FileFlags::from(bytes[0x1c]),
        language_id: bytes[0x1d],
    };
    debug!(
        "File header: version={:#04x}, modified={:?}, flags={:?}, language_id={:#04x}",
        bytes[0],
        header.last_modified(),
        header.flags,
        header.language_id
    );
    Ok(header)
}

/// Decodes one 32-byte field descriptor.
///
/// ```text
/// [0..11]  name (NUL padded, at most 10 significant bytes)
/// [11]     type code
/// [16..18] length (u16 LE) for Character fields
/// [16]     length, [17] decimal count, for all other fields
/// [18]     column flags
/// [19..23] next auto-increment value (i32 LE)
/// [23]     auto-increment step
/// ```
///
/// `next_bit` is the running null/var flag bit index shared by all columns.
fn parse_descriptor(
    bytes: &[u8; DESCRIPTOR_LEN],
    ordinal: usize,
    offset: usize,
    encoding: TextEncoding,
    next_bit: &mut usize,
) -> ColumnDescriptor {
    let name = encoding
        .decode(utils::zstring(bytes, NAME_LEN))
        .trim_end_matches(' ')
        .to_string();
    let type_code = bytes[0x0b];

    let (length, decimal_count) = if type_code == b'C' {
        (LittleEndian::read_u16(&bytes[0x10..0x12]) as usize, 0)
    } else {
        (bytes[0x10] as usize, bytes[0x11])
    };

    let flags = ColumnFlags::from(bytes[0x12]);
    let auto_increment = flags.auto_increment.then(|| AutoIncrement {
        next_value: LittleEndian::read_i32(&bytes[0x13..0x17]),
        step: bytes[0x17],
    });
    let data_type = XBaseType::from_code(type_code, length);

    // Var bit first, then null bit, from one shared counter
    let var_bit = data_type.is_variable().then(|| take_bit(next_bit));
    let null_bit = flags.nullable.then(|| take_bit(next_bit));

    ColumnDescriptor {
        ordinal,
        name,
        offset,
        length,
        decimal_count,
        type_code,
        flags,
        data_type,
        auto_increment,
        null_bit,
        var_bit,
    }
}

fn take_bit(next_bit: &mut usize) -> usize {
    let bit = *next_bit;
    *next_bit += 1;
    bit
}

/// Warns when flag bits were assigned but the bitmask column cannot hold them.
fn check_flag_bits(parsed: &ParsedHeader) {
    if parsed.flag_bits == 0 {
        return;
    }
    match parsed.null_flags_column() {
        None => warn!(
            "{} null/var flag bits assigned but the file has no {} column; all flags read as clear",
            parsed.flag_bits, NULL_FLAGS_COLUMN
        ),
        Some(column) if column.length * 8 < parsed.flag_bits => warn!(
            "{} column holds {} bits but {} were assigned; the excess read as clear",
            NULL_FLAGS_COLUMN,
            column.length * 8,
            parsed.flag_bits
        ),
        Some(_) => {}
    }
}
