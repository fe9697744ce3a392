use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Settings for the shared memory store.
///
/// The networked backend is only used when it answers a ping within
/// `connect_timeout_ms`; otherwise the store lives in `json_path`.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_redis_host")]
    pub redis_host: String,
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,
    #[serde(default = "default_json_path")]
    pub json_path: PathBuf,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_op_timeout")]
    pub op_timeout_ms: u64,
    /// Empty means the flat, global keyspace of the backend.
    #[serde(default)]
    pub key_prefix: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            json_path: default_json_path(),
            connect_timeout_ms: default_connect_timeout(),
            op_timeout_ms: default_op_timeout(),
            key_prefix: String::new(),
        }
    }
}

fn default_redis_host() -> String { "redis".into() }
fn default_redis_port() -> u16 { 6379 }
fn default_json_path() -> PathBuf { PathBuf::from("./data/memory.json") }
fn default_connect_timeout() -> u64 { 2000 }
fn default_op_timeout() -> u64 { 1000 }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if std::fs::metadata(&path).is_err() {
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.memory.apply_env_overrides();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.memory.normalize()?;
        self.memory.validate()?;
        Ok(())
    }
}

impl MemoryConfig {
    /// Overlay `REDIS_HOST`, `REDIS_PORT`, `MEMORY_JSON_PATH` and `MEMORY_KEY_PREFIX`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an explicit lookup.
    /// An unparsable `REDIS_PORT` is ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("REDIS_HOST") {
            self.redis_host = host;
        }
        if let Some(port) = lookup("REDIS_PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            self.redis_port = port;
        }
        if let Some(path) = lookup("MEMORY_JSON_PATH") {
            self.json_path = PathBuf::from(path);
        }
        if let Some(prefix) = lookup("MEMORY_KEY_PREFIX") {
            self.key_prefix = prefix;
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.redis_host.trim().is_empty() {
            self.redis_host = default_redis_host();
        } else {
            self.redis_host = self.redis_host.trim().to_string();
        }
        if self.json_path.as_os_str().is_empty() {
            self.json_path = default_json_path();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.redis_port == 0 {
            return Err(anyhow!("memory.redis_port must be within 1..=65535"));
        }
        if self.connect_timeout_ms == 0 || self.op_timeout_ms == 0 {
            return Err(anyhow!("memory timeouts must be positive milliseconds"));
        }
        Ok(())
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.redis_host, self.redis_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}
