//! Storage backends for the memory store
//!
//! `json_map_store` keeps the whole keyspace in one JSON file; `redis_store`
//! talks to a networked Redis instance. Both speak `serde_json::Value`.

pub mod json_map_store;
#[cfg(feature = "redis")]
pub mod redis_store;
