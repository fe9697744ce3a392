//! Memory: uniform CRUD over JSON values with a backend chosen once.
//!
//! `Memory::open` pings the configured Redis; if that fails for any reason the
//! instance uses the JSON file for the rest of its life. The five public
//! operations never return errors. They log and report `false`, `None` or an
//! empty list instead. In particular `get` cannot tell "absent" from
//! "unreadable"; use `try_get` when that matters.

mod finite;
mod store;

use std::path::Path;
use std::sync::Arc;

use configs::MemoryConfig;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

pub use store::MemoryStore;
pub use common::types::BackendMode;

use crate::errors::ServiceError;
use crate::storage::json_map_store::JsonMapStore;
#[cfg(feature = "redis")]
use crate::storage::redis_store::RedisStore;

#[derive(Clone)]
enum Backend {
    #[cfg(feature = "redis")]
    Networked(RedisStore),
    File(Arc<JsonMapStore>),
}

/// Handle to the shared key-value memory. Clones share the same backend.
#[derive(Clone)]
pub struct Memory {
    backend: Backend,
}

impl Memory {
    /// Probe the networked backend, falling back to the JSON file at
    /// `cfg.json_path`. Only fails when the file cannot be prepared either.
    pub async fn open(cfg: &MemoryConfig) -> Result<Self, ServiceError> {
        if let Some(backend) = probe_networked(cfg).await {
            return Ok(Self { backend });
        }
        Self::file(&cfg.json_path).await
    }

    /// File mode without probing the network.
    pub async fn file<P: AsRef<Path>>(path: P) -> Result<Self, ServiceError> {
        let store = JsonMapStore::new(path.as_ref()).await?;
        info!(backend = "file", path = %store.path().display(), "using json file storage");
        Ok(Self { backend: Backend::File(store) })
    }

    pub fn mode(&self) -> BackendMode {
        match &self.backend {
            #[cfg(feature = "redis")]
            Backend::Networked(_) => BackendMode::Networked,
            Backend::File(_) => BackendMode::File,
        }
    }

    /// Redis URL or file path of the active backend.
    pub fn describe(&self) -> String {
        match &self.backend {
            #[cfg(feature = "redis")]
            Backend::Networked(s) => s.addr().to_string(),
            Backend::File(s) => s.path().display().to_string(),
        }
    }

    /// Store `value` under `key`, overwriting any previous value.
    /// Returns `false` on an empty key, a value that cannot be represented as
    /// JSON (including NaN and infinite floats), or a backend failure.
    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.try_put(key, value).await {
            Ok(()) => true,
            Err(e) => {
                error!(backend = %self.mode(), key, error = %e, "failed to store entry");
                false
            }
        }
    }

    async fn try_put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), ServiceError> {
        validate_key(key)?;
        finite::check(value).map_err(|e| ServiceError::Validation(e.to_string()))?;
        let value = serde_json::to_value(value)?;
        match &self.backend {
            #[cfg(feature = "redis")]
            Backend::Networked(s) => s.set(key, &value).await,
            Backend::File(s) => s.insert(key.to_string(), value).await,
        }
    }

    /// Value stored under `key`. Read failures are logged and reported as `None`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.try_get(key).await {
            Ok(v) => v,
            Err(e) => {
                error!(backend = %self.mode(), key, error = %e, "failed to read entry");
                None
            }
        }
    }

    /// Like [`get`](Self::get), but read failures are errors, not `None`.
    pub async fn try_get(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        match &self.backend {
            #[cfg(feature = "redis")]
            Backend::Networked(s) => s.get(key).await,
            Backend::File(s) => s.get(key).await,
        }
    }

    /// Typed read; a stored value of the wrong shape reads as `None`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "stored entry has unexpected shape");
                None
            }
        }
    }

    /// All keys currently stored, in no particular order.
    pub async fn list_ids(&self) -> Vec<String> {
        let res = match &self.backend {
            #[cfg(feature = "redis")]
            Backend::Networked(s) => s.keys().await,
            Backend::File(s) => s.keys().await,
        };
        res.unwrap_or_else(|e| {
            error!(backend = %self.mode(), error = %e, "failed to list entries");
            Vec::new()
        })
    }

    /// Remove `key`; `true` only if something was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let res = match &self.backend {
            #[cfg(feature = "redis")]
            Backend::Networked(s) => s.delete(key).await,
            Backend::File(s) => s.remove(key).await,
        };
        res.unwrap_or_else(|e| {
            error!(backend = %self.mode(), key, error = %e, "failed to delete entry");
            false
        })
    }

    /// Drop every entry.
    pub async fn clear_all(&self) -> bool {
        let res = match &self.backend {
            #[cfg(feature = "redis")]
            Backend::Networked(s) => s.clear().await,
            Backend::File(s) => s.clear().await,
        };
        match res {
            Ok(()) => true,
            Err(e) => {
                error!(backend = %self.mode(), error = %e, "failed to clear entries");
                false
            }
        }
    }
}

fn validate_key(key: &str) -> Result<(), ServiceError> {
    if key.is_empty() {
        return Err(ServiceError::empty_key());
    }
    Ok(())
}

#[cfg(feature = "redis")]
async fn probe_networked(cfg: &MemoryConfig) -> Option<Backend> {
    let url = cfg.redis_url();
    match RedisStore::connect(&url, cfg.key_prefix.clone(), cfg.connect_timeout(), cfg.op_timeout()).await {
        Ok(store) => {
            info!(backend = "networked", addr = %url, "connected to redis");
            Some(Backend::Networked(store))
        }
        Err(e) => {
            warn!(addr = %url, error = %e, "redis not available, falling back to json file");
            None
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn probe_networked(cfg: &MemoryConfig) -> Option<Backend> {
    warn!(addr = %cfg.redis_url(), "built without redis support, using json file");
    None
}
