//! Shared key-value memory for the cell services.
//! - `memory::Memory` picks a networked (Redis) or JSON-file backend once, at construction.
//! - `storage` holds the two backends.
//! - Operations never surface backend errors; they log and return their failure value.

pub mod errors;
pub mod storage;
pub mod memory;

pub use memory::{BackendMode, Memory, MemoryStore};
