mod memory;
mod reference_cache;
#[cfg(feature = "redis-store")]
mod redis_store;

use std::{env, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tb_core::StoreError;
#[cfg(not(feature = "redis-store"))]
use tracing::warn;

pub use memory::MemoryKvStore;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisKvStore;
pub use reference_cache::ConversationReferenceCache;

/// Shared durable store handle used across services.
pub type SharedKvStore = Arc<dyn KeyValueStore>;

/// Durable key-value contract, partitioned by owner (one partition per bot).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, owner_id: &str, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, owner_id: &str, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Composite key used by flat backends.
pub(crate) fn scoped_key(owner_id: &str, key: &str) -> String {
    format!("{owner_id}:{key}")
}

/// Returns an in-memory store wrapped in an [`Arc`].
pub fn shared_memory_store() -> SharedKvStore {
    Arc::new(MemoryKvStore::new())
}

/// Builds a durable store from environment variables.
///
/// If `SESSION_REDIS_URL` is present and the `redis-store` feature is enabled, a Redis-backed
/// store is created. Otherwise, the function falls back to the in-memory implementation.
pub async fn store_from_env() -> Result<SharedKvStore> {
    match env::var("SESSION_REDIS_URL") {
        Ok(url) => {
            let namespace = env::var("SESSION_NAMESPACE").unwrap_or_else(|_| "teams".into());
            build_redis_store(&url, &namespace).await
        }
        Err(_) => Ok(shared_memory_store()),
    }
}

#[cfg(feature = "redis-store")]
async fn build_redis_store(url: &str, namespace: &str) -> Result<SharedKvStore> {
    let store = RedisKvStore::connect(url, namespace).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis-store"))]
async fn build_redis_store(_url: &str, _namespace: &str) -> Result<SharedKvStore> {
    warn!("redis-store feature disabled; using in-memory conversation store");
    Ok(shared_memory_store())
}
