//! DOS (OEM) code pages that `encoding_rs` does not ship.
//!
//! The decoding tables come from `oem_cp`. Only the upper half differs from
//! ASCII, so pure ASCII input is passed through untouched.

use std::borrow::Cow;
use std::fmt;

use oem_cp::code_table::DECODING_TABLE_CP_MAP;
use oem_cp::code_table_type::TableType;

/// A single-byte DOS code page.
#[derive(Clone, Copy)]
pub struct OemCodePage {
    pub code_page: u16,
    pub name: &'static str,
    table: &'static TableType,
}

impl OemCodePage {
    /// Looks up a DOS code page used by xBase language drivers.
    ///
    /// 866 and 874 are left to `encoding_rs`, which decodes them natively.
    pub fn for_code_page(code_page: u16) -> Option<Self> {
        let name = match code_page {
            437 => "IBM437",
            737 => "IBM737",
            850 => "IBM850",
            852 => "IBM852",
            857 => "IBM857",
            860 => "IBM860",
            861 => "IBM861",
            863 => "IBM863",
            865 => "IBM865",
            _ => return None,
        };
        let table = DECODING_TABLE_CP_MAP.get(&code_page)?;
        Some(Self { code_page, name, table })
    }

    /// Resolves labels such as `"cp852"`, `"IBM865"` or `"437"`.
    pub fn for_label(label: &str) -> Option<Self> {
        let lower = label.trim().to_ascii_lowercase();
        let digits = lower
            .strip_prefix("cp")
            .or_else(|| lower.strip_prefix("ibm"))
            .unwrap_or(&lower);
        Self::for_code_page(digits.parse().ok()?)
    }

    /// Decodes bytes to text. Pure ASCII input is returned borrowed; bytes the
    /// page leaves undefined become U+FFFD.
    pub fn decode<'b>(&self, bytes: &'b [u8]) -> Cow<'b, str> {
        if bytes.is_ascii()
            && let Ok(text) = std::str::from_utf8(bytes)
        {
            return Cow::Borrowed(text);
        }
        Cow::Owned(self.table.decode_string_lossy(bytes))
    }
}

impl PartialEq for OemCodePage {
    fn eq(&self, other: &Self) -> bool {
        self.code_page == other.code_page
    }
}

impl Eq for OemCodePage {}

impl fmt::Debug for OemCodePage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}
