use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::{Map, Value};
use tokio::{fs, sync::Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::errors::ServiceError;

pub type JsonMap = Map<String, Value>;

/// JSON file-backed key-value map store.
///
/// The file holds a single JSON object whose top-level keys are the entry keys.
/// Every call reloads the object from disk, so external edits are picked up;
/// mutations rewrite the whole file. Calls on one instance are serialized by
/// an internal lock. Other instances on the same path, in this process or
/// another, are not coordinated: each save is atomic, but a concurrent
/// read-modify-write from another instance can overwrite an update.
pub struct JsonMapStore {
    file_path: PathBuf,
    lock: Mutex<()>,
}

impl JsonMapStore {
    /// Initialize the store from a path. Creates the parent directory and the
    /// file (as `{}`) if missing; an existing file is left as is.
    pub async fn new<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let file_path = path.into();
        common::env::ensure_json_file(&file_path)
            .await
            .map_err(|e| ServiceError::Io(e.to_string()))?;
        Ok(Arc::new(Self { file_path, lock: Mutex::new(()) }))
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// A missing file reads as an empty map; unparsable content or a non-object
    /// top level is `Corrupt` so that mutations never clobber it.
    async fn load(&self) -> Result<JsonMap, ServiceError> {
        let bytes = match fs::read(&self.file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(JsonMap::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonMap::new());
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(self.corrupt(format!("top level is {}, expected an object", kind_of(&other)))),
            Err(e) => Err(self.corrupt(e.to_string())),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn save(&self, map: &JsonMap) -> Result<(), ServiceError> {
        let data = serde_json::to_vec_pretty(map)?;
        let tmp = self.temp_path();
        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, &self.file_path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(path = %self.file_path.display(), entries = map.len(), "json store saved");
        Ok(())
    }

    /// Unique per save, so concurrent writers never share or steal a temp file.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "memory.json".into());
        name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        self.file_path.with_file_name(name)
    }

    fn corrupt(&self, reason: String) -> ServiceError {
        ServiceError::Corrupt { path: self.file_path.display().to_string(), reason }
    }

    /// List all keys.
    pub async fn keys(&self) -> Result<Vec<String>, ServiceError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().map(|(k, _)| k).collect())
    }

    /// Get value by key.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        Ok(map.remove(key))
    }

    /// Insert or update a value by key and persist.
    pub async fn insert(&self, key: String, value: Value) -> Result<(), ServiceError> {
        self.update_map(|m| {
            m.insert(key, value);
            true
        })
        .await
        .map(|_| ())
    }

    /// Remove a key and persist; returns whether it existed.
    pub async fn remove(&self, key: &str) -> Result<bool, ServiceError> {
        self.update_map(|m| m.remove(key).is_some()).await
    }

    /// Replace the file content with an empty object. Does not read the old
    /// content, so it also recovers a corrupt file.
    pub async fn clear(&self) -> Result<(), ServiceError> {
        let _guard = self.lock.lock().await;
        self.save(&JsonMap::new()).await
    }

    /// Apply a mutation to the loaded map under the lock. The file is rewritten
    /// only when `f` reports a change.
    pub async fn update_map<F>(&self, f: F) -> Result<bool, ServiceError>
    where
        F: FnOnce(&mut JsonMap) -> bool,
    {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        let changed = f(&mut map);
        if changed {
            self.save(&map).await?;
        }
        Ok(changed)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tmp_file() -> PathBuf {
        std::env::temp_dir().join(format!("json_map_store_{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn json_map_store_crud_persists() -> Result<(), anyhow::Error> {
        let tmp = tmp_file();
        let store = JsonMapStore::new(&tmp).await?;

        // initially empty
        assert_eq!(store.keys().await?.len(), 0);

        store.insert("a".into(), json!(1)).await?;
        store.insert("b".into(), json!({"nested": [1, 2]})).await?;
        assert_eq!(store.get("a").await?, Some(json!(1)));

        // update_map
        store
            .update_map(|m| {
                if let Some(v) = m.get_mut("a") { *v = json!(10); }
                true
            })
            .await?;
        assert_eq!(store.get("a").await?, Some(json!(10)));

        // remove and reload persistence
        assert!(store.remove("b").await?);
        assert!(!store.remove("b").await?);
        let reloaded = JsonMapStore::new(&tmp).await?;
        assert_eq!(reloaded.keys().await?, vec!["a".to_string()]);

        // file layout is a bare object, no envelope
        let raw: Value = serde_json::from_slice(&fs::read(&tmp).await?)?;
        assert_eq!(raw, json!({"a": 10}));

        let _ = fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_and_preserved() -> Result<(), anyhow::Error> {
        let tmp = tmp_file();
        fs::write(&tmp, b"[1, 2, 3]").await?;
        let store = JsonMapStore::new(&tmp).await?;

        assert!(matches!(store.get("x").await, Err(ServiceError::Corrupt { .. })));
        assert!(store.insert("x".into(), json!(true)).await.is_err());
        assert_eq!(fs::read(&tmp).await?, b"[1, 2, 3]");

        store.clear().await?;
        assert!(store.keys().await?.is_empty());

        let _ = fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn missing_or_blank_file_reads_empty() -> Result<(), anyhow::Error> {
        let tmp = tmp_file();
        let store = JsonMapStore::new(&tmp).await?;

        fs::write(&tmp, b"  \n").await?;
        assert_eq!(store.get("k").await?, None);

        fs::remove_file(&tmp).await?;
        assert!(store.keys().await?.is_empty());
        store.insert("k".into(), json!("v")).await?;
        assert_eq!(store.get("k").await?, Some(json!("v")));

        let _ = fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn unchanged_map_is_not_rewritten() -> Result<(), anyhow::Error> {
        let tmp = tmp_file();
        let store = JsonMapStore::new(&tmp).await?;
        // seeded file is the compact `{}`; a no-op remove must not pretty-print it
        assert!(!store.remove("absent").await?);
        assert_eq!(fs::read_to_string(&tmp).await?, "{}");
        let _ = fs::remove_file(&tmp).await;
        Ok(())
    }

    #[test]
    fn temp_paths_are_unique_siblings() {
        let store = JsonMapStore { file_path: PathBuf::from("/data/memory.json"), lock: Mutex::new(()) };
        let (a, b) = (store.temp_path(), store.temp_path());
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(Path::new("/data")));
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("memory.json.") && name.ends_with(".tmp"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_instances_on_one_path_never_fail_a_save() -> Result<(), anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("json_map_store_shared_{}", uuid::Uuid::new_v4()));
        let tmp = dir.join("memory.json");
        let first = JsonMapStore::new(&tmp).await?;
        let second = JsonMapStore::new(&tmp).await?;

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let store = if i % 2 == 0 { first.clone() } else { second.clone() };
                tokio::spawn(async move { store.insert(format!("k{i}"), json!(i)).await })
            })
            .collect();
        for h in handles {
            h.await??;
        }

        // file is always a complete object and no temp files are left behind
        let raw: Value = serde_json::from_slice(&fs::read(&tmp).await?)?;
        assert!(raw.is_object());
        let mut entries = fs::read_dir(&dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["memory.json".to_string()]);

        let _ = fs::remove_dir_all(&dir).await;
        Ok(())
    }
}
