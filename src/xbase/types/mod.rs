//! Foundational data structures, error types, options and values.

pub mod error;
pub mod models;
pub mod options;
pub mod value;
