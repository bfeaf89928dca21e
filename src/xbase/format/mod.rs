//! File format parsing layer for xBase data and memo files.
//!
//! This module provides the mid-level parsing layer that bridges between
//! raw stream I/O and the high-level [`XBaseReader`](crate::xbase::reader::XBaseReader).
//!
//! # Module Organization
//!
//! - [`header`]: Parses the file header and field-descriptor table
//! - [`memo`]: Resolves memo block references against the memo stream
//!
//! # Architecture
//!
//! ```text
//! .dbf:                           .fpt / .dbt:
//! ┌─────────────────┐             ┌─────────────────┐
//! │  File Header    │ ← header    │  Memo Header    │ ← memo::MemoResolver::open()
//! ├─────────────────┤             ├─────────────────┤
//! │  Descriptors    │ ← header    │  Blocks         │ ← memo::MemoResolver::read_memo()
//! ├─────────────────┤             └─────────────────┘
//! │  Records        │ ← cursor
//! └─────────────────┘
//! ```

pub mod header;
pub mod memo;
