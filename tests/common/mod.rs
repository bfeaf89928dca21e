//! In-memory builders for xBase data and memo files.

#![allow(dead_code)]

pub const SYSTEM: u8 = 0x01;
pub const NULLABLE: u8 = 0x02;
pub const BINARY: u8 = 0x04;

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init();
}

struct FieldDef {
    name: String,
    type_code: u8,
    length: usize,
    decimals: u8,
    flags: u8,
    autoinc: Option<(i32, u8)>,
}

/// Builds a `.dbf` image field by field, record by record.
pub struct DbfBuilder {
    version: u8,
    modified: (u8, u8, u8),
    language_id: u8,
    file_flags: u8,
    fields: Vec<FieldDef>,
    records: Vec<Vec<u8>>,
    declared_records: Option<i32>,
    header_padding: usize,
    record_padding: usize,
    eof_marker: bool,
}

impl DbfBuilder {
    /// Visual FoxPro table, windows-1252, last updated 2024-10-15.
    pub fn new() -> Self {
        Self {
            version: 0x30,
            modified: (124, 10, 15),
            language_id: 0x03,
            file_flags: 0,
            fields: Vec::new(),
            records: Vec::new(),
            declared_records: None,
            header_padding: 0,
            record_padding: 0,
            eof_marker: false,
        }
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn modified(mut self, year: u8, month: u8, day: u8) -> Self {
        self.modified = (year, month, day);
        self
    }

    pub fn language(mut self, language_id: u8) -> Self {
        self.language_id = language_id;
        self
    }

    pub fn file_flags(mut self, flags: u8) -> Self {
        self.file_flags = flags;
        self
    }

    pub fn field(self, name: &str, type_code: u8, length: usize, decimals: u8) -> Self {
        self.field_with_flags(name, type_code, length, decimals, 0)
    }

    pub fn field_with_flags(mut self, name: &str, type_code: u8, length: usize, decimals: u8, flags: u8) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            type_code,
            length,
            decimals,
            flags,
            autoinc: None,
        });
        self
    }

    pub fn auto_increment(mut self, name: &str, next_value: i32, step: u8) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            type_code: b'I',
            length: 4,
            decimals: 0,
            flags: 0x0c,
            autoinc: Some((next_value, step)),
        });
        self
    }

    /// Appends the hidden `_NullFlags` column.
    pub fn null_flags(self, length: usize) -> Self {
        self.field_with_flags("_NullFlags", b'0', length, 0, SYSTEM)
    }

    /// Extra bytes after the descriptor terminator, such as the Visual FoxPro backlink.
    pub fn header_padding(mut self, bytes: usize) -> Self {
        self.header_padding = bytes;
        self
    }

    /// Extra bytes at the end of every record, beyond the field layout.
    pub fn record_padding(mut self, bytes: usize) -> Self {
        self.record_padding = bytes;
        self
    }

    pub fn declared_records(mut self, count: i32) -> Self {
        self.declared_records = Some(count);
        self
    }

    pub fn eof_marker(mut self) -> Self {
        self.eof_marker = true;
        self
    }

    /// Appends an active record. Each value is space-padded to its field's length.
    pub fn record(self, values: &[&[u8]]) -> Self {
        self.push_record(b' ', values)
    }

    pub fn deleted_record(self, values: &[&[u8]]) -> Self {
        self.push_record(b'*', values)
    }

    fn push_record(mut self, marker: u8, values: &[&[u8]]) -> Self {
        assert_eq!(values.len(), self.fields.len(), "one value per field");
        let mut record = vec![marker];
        for (field, value) in self.fields.iter().zip(values) {
            assert!(
                value.len() <= field.length,
                "value for {} is {} bytes, field holds {}",
                field.name,
                value.len(),
                field.length
            );
            record.extend_from_slice(value);
            record.extend(std::iter::repeat_n(b' ', field.length - value.len()));
        }
        record.extend(std::iter::repeat_n(b' ', self.record_padding));
        self.records.push(record);
        self
    }

    pub fn header_length(&self) -> usize {
        32 + 32 * self.fields.len() + 1 + self.header_padding
    }

    pub fn record_length(&self) -> usize {
        1 + self.fields.iter().map(|f| f.length).sum::<usize>() + self.record_padding
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0u8; 32];
        out[0] = self.version;
        out[1] = self.modified.0;
        out[2] = self.modified.1;
        out[3] = self.modified.2;
        let count = self.declared_records.unwrap_or(self.records.len() as i32);
        out[4..8].copy_from_slice(&count.to_le_bytes());
        out[8..10].copy_from_slice(&(self.header_length() as i16).to_le_bytes());
        out[10..12].copy_from_slice(&(self.record_length() as i16).to_le_bytes());
        out[0x1c] = self.file_flags;
        out[0x1d] = self.language_id;

        for field in &self.fields {
            let mut descriptor = [0u8; 32];
            let name = field.name.as_bytes();
            descriptor[..name.len().min(10)].copy_from_slice(&name[..name.len().min(10)]);
            descriptor[0x0b] = field.type_code;
            if field.type_code == b'C' {
                descriptor[0x10..0x12].copy_from_slice(&(field.length as u16).to_le_bytes());
            } else {
                descriptor[0x10] = field.length as u8;
                descriptor[0x11] = field.decimals;
            }
            descriptor[0x12] = field.flags;
            if let Some((next_value, step)) = field.autoinc {
                descriptor[0x13..0x17].copy_from_slice(&next_value.to_le_bytes());
                descriptor[0x17] = step;
            }
            out.extend_from_slice(&descriptor);
        }
        out.push(0x0d);
        out.extend(std::iter::repeat_n(0u8, self.header_padding));

        for record in &self.records {
            out.extend_from_slice(record);
        }
        if self.eof_marker {
            out.push(0x1a);
        }
        out
    }
}

/// Builds a memo file image. Blocks are appended in order and return their block index.
pub struct MemoBuilder {
    block_size: usize,
    data: Vec<u8>,
}

impl MemoBuilder {
    /// A memo file whose first block starts right after the 512-byte header.
    pub fn new(block_size: usize) -> Self {
        let mut data = vec![0u8; 512];
        data[6..8].copy_from_slice(&(block_size as u16).to_be_bytes());
        Self { block_size, data }
    }

    /// A dBase III memo file: block size 0 in the header, meaning 512.
    pub fn dbase3() -> Self {
        Self {
            block_size: 512,
            data: vec![0u8; 512],
        }
    }

    fn align(&mut self) -> u64 {
        let rem = self.data.len() % self.block_size;
        if rem != 0 {
            self.data.extend(std::iter::repeat_n(0u8, self.block_size - rem));
        }
        (self.data.len() / self.block_size) as u64
    }

    /// FoxPro block: type (1 text, 0 picture, 2 object) and length, big-endian.
    pub fn foxpro_block(&mut self, block_type: u32, payload: &[u8]) -> u64 {
        let block = self.align();
        self.data.extend_from_slice(&block_type.to_be_bytes());
        self.data.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        self.data.extend_from_slice(payload);
        block
    }

    /// dBase IV block: signature, then the little-endian length including the 8-byte header.
    pub fn dbase4_block(&mut self, payload: &[u8]) -> u64 {
        let block = self.align();
        self.data.extend_from_slice(&[0xff, 0xff, 0x08, 0x00]);
        self.data.extend_from_slice(&((payload.len() + 8) as u32).to_le_bytes());
        self.data.extend_from_slice(payload);
        block
    }

    /// dBase III block: payload followed by the 0x1A terminator.
    pub fn dbase3_block(&mut self, payload: &[u8]) -> u64 {
        let block = self.align();
        self.data.extend_from_slice(payload);
        self.data.extend_from_slice(&[0x1a, 0x1a]);
        block
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        let rem = out.len() % self.block_size;
        if rem != 0 {
            out.extend(std::iter::repeat_n(0u8, self.block_size - rem));
        }
        let next_free = (out.len() / self.block_size) as u32;
        out[0..4].copy_from_slice(&next_free.to_be_bytes());
        out
    }
}

/// Four-byte little-endian memo reference, as Visual FoxPro stores it.
pub fn memo_ref(block: u64) -> [u8; 4] {
    (block as u32).to_le_bytes()
}

/// Ten ASCII digits, right-aligned, as dBase stores memo references.
pub fn memo_ref_ascii(block: u64) -> Vec<u8> {
    format!("{:>10}", block).into_bytes()
}

/// A `Read` that hands out at most `chunk` bytes per call.
pub struct Trickle<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl<'a> Trickle<'a> {
    pub fn new(data: &'a [u8], chunk: usize) -> Self {
        Self { data, chunk }
    }
}

impl std::io::Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.chunk).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}
