use async_trait::async_trait;
use serde_json::Value;

use super::Memory;

/// Trait abstraction over the shared memory, for request handlers that hold
/// it as `Arc<dyn MemoryStore>` in their own state.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn put(&self, key: &str, value: Value) -> bool;
    async fn get(&self, key: &str) -> Option<Value>;
    async fn list_ids(&self) -> Vec<String>;
    async fn delete(&self, key: &str) -> bool;
    async fn clear_all(&self) -> bool;
}

#[async_trait]
impl MemoryStore for Memory {
    async fn put(&self, key: &str, value: Value) -> bool {
        Memory::put(self, key, &value).await
    }

    async fn get(&self, key: &str) -> Option<Value> {
        Memory::get(self, key).await
    }

    async fn list_ids(&self) -> Vec<String> {
        Memory::list_ids(self).await
    }

    async fn delete(&self, key: &str) -> bool {
        Memory::delete(self, key).await
    }

    async fn clear_all(&self) -> bool {
        Memory::clear_all(self).await
    }
}
