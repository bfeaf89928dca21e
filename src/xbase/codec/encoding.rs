//! Text encoding resolution from the header's language-driver id.
//!
//! The language id at header byte `0x1D` selects the code page used for column
//! names and all Character/VarChar/Memo text. An explicit override always wins.

use std::borrow::Cow;
use std::fmt;

use encoding_rs::Encoding;
use log::debug;

use super::oem::OemCodePage;
use crate::xbase::types::error::{Result, XBaseError};

/// The text encoding used to decode every string in a file.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Any encoding provided by `encoding_rs`.
    Standard(&'static Encoding),
    /// A DOS code page decoded through `oem_cp`.
    Oem(OemCodePage),
}

impl TextEncoding {
    /// Resolves an encoding from a label such as `"utf-8"`, `"windows-1251"` or `"cp852"`.
    pub fn for_label(label: &str) -> Option<TextEncoding> {
        if let Some(page) = OemCodePage::for_label(label) {
            return Some(TextEncoding::Oem(page));
        }
        Encoding::for_label(label.trim().as_bytes()).map(TextEncoding::Standard)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Standard(encoding) => encoding.name(),
            TextEncoding::Oem(page) => page.name,
        }
    }

    /// Decodes bytes without BOM sniffing. The result borrows the input when no
    /// transcoding was needed.
    pub fn decode<'b>(&self, bytes: &'b [u8]) -> Cow<'b, str> {
        match self {
            TextEncoding::Standard(encoding) => encoding.decode_without_bom_handling(bytes).0,
            TextEncoding::Oem(page) => page.decode(bytes),
        }
    }
}

/// The encoding used when the header carries language id 0.
impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Standard(encoding_rs::WINDOWS_1252)
    }
}

impl From<&'static Encoding> for TextEncoding {
    fn from(encoding: &'static Encoding) -> Self {
        TextEncoding::Standard(encoding)
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TextEncoding({})", self.name())
    }
}

/// Chooses the encoding for a file.
///
/// Priority (highest → lowest):
/// 1. `override_encoding` supplied by the caller
/// 2. Language id 0 → [`TextEncoding::default()`] (windows-1252)
/// 3. The language-driver table
///
/// # Errors
/// `EncodingNotSupported` when the id is not in the table, or its code page has no decoder.
pub fn resolve(language_id: u8, override_encoding: Option<TextEncoding>) -> Result<TextEncoding> {
    if let Some(encoding) = override_encoding {
        debug!("Using caller-supplied encoding {} (language id {:#04x})", encoding.name(), language_id);
        return Ok(encoding);
    }
    if language_id == 0 {
        return Ok(TextEncoding::default());
    }
    let code_page = code_page_for(language_id);
    let encoding = code_page.and_then(encoding_for_code_page).ok_or(
        XBaseError::EncodingNotSupported {
            language_id,
            code_page,
        },
    )?;
    debug!(
        "Language id {:#04x} resolved to code page {:?} ({})",
        language_id,
        code_page,
        encoding.name()
    );
    Ok(encoding)
}

/// Maps an xBase language-driver id to its Windows/DOS code page number.
pub fn code_page_for(language_id: u8) -> Option<u16> {
    let code_page = match language_id {
        0x01 => 437,   // US MS-DOS
        0x02 => 850,   // International MS-DOS
        0x03 => 1252,  // Windows ANSI
        0x04 => 10000, // Standard Macintosh
        0x08 => 865,
        0x09 => 437,
        0x0a => 850,
        0x0b => 437,
        0x0d => 437,
        0x0e => 850,
        0x0f => 437,
        0x10 => 850,
        0x11 => 437,
        0x12 => 850,
        0x13 => 932,
        0x14 => 850,
        0x15 => 437,
        0x16 => 850,
        0x17 => 865,
        0x18 => 437,
        0x19 => 437,
        0x1a => 850,
        0x1b => 437,
        0x1c => 863,
        0x1d => 850,
        0x1f => 852,
        0x22 => 852,
        0x23 => 852,
        0x24 => 860,
        0x25 => 850,
        0x26 => 866,
        0x37 => 850,
        0x40 => 852,
        0x4d => 936,
        0x4e => 949,
        0x4f => 950,
        0x50 => 874,
        0x57 => 1252, // ESRI shapefiles: ANSI
        0x58 => 1252,
        0x59 => 1252,
        0x64 => 852,
        0x65 => 866,
        0x66 => 865,
        0x67 => 861,
        0x68 => 895,
        0x69 => 620,
        0x6a => 737,
        0x6b => 857,
        0x6c => 863,
        0x78 => 950,
        0x79 => 949,
        0x7a => 936,
        0x7b => 932,
        0x7c => 874,
        0x7d => 1255,
        0x7e => 1256,
        0x86 => 737,
        0x87 => 852,
        0x88 => 857,
        0x96 => 10007,
        0x97 => 10029,
        0x98 => 10006,
        0xc8 => 1250,
        0xc9 => 1251,
        0xca => 1254,
        0xcb => 1253,
        0xcc => 1257,
        _ => return None,
    };
    Some(code_page)
}

/// Returns a decoder for a code page, if one is available.
pub fn encoding_for_code_page(code_page: u16) -> Option<TextEncoding> {
    if let Some(page) = OemCodePage::for_code_page(code_page) {
        return Some(TextEncoding::Oem(page));
    }
    let encoding = match code_page {
        866 => encoding_rs::IBM866,
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1252 => encoding_rs::WINDOWS_1252,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        10000 => encoding_rs::MACINTOSH,
        10007 => encoding_rs::X_MAC_CYRILLIC,
        _ => return None,
    };
    Some(TextEncoding::Standard(encoding))
}
