//! Codec layer for text decoding.
//!
//! # Submodules
//!
//! - [`encoding`][]: Language-id → encoding resolution
//! - [`oem`][]: DOS code pages (437, 737, 850, 852, 857, 860, 861, 863, 865)

pub mod encoding;
pub mod oem;
