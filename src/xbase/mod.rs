//! Core xBase reader module.

pub mod codec;
pub mod format;
pub mod iter;
pub mod reader;
pub mod types;

mod accessor;
mod cursor;
mod utils;

pub use reader::XBaseReader;
pub use types::{error, models, options, value};
