//! Shared helpers for the memory workspace: logging setup, data-file
//! bootstrapping and small cross-crate types.

pub mod types;
pub mod utils;
pub mod env;
