use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use tb_core::StoreError;
use tokio::sync::Mutex;

use crate::{KeyValueStore, scoped_key};

pub struct RedisKvStore {
    namespace: String,
    connection: Mutex<redis::aio::ConnectionManager>,
}

impl RedisKvStore {
    pub async fn connect(url: &str, namespace: impl Into<String>) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self {
            namespace: namespace.into(),
            connection: Mutex::new(manager),
        })
    }

    fn entry_key(&self, owner_id: &str, key: &str) -> String {
        format!("{}:kv:{}", self.namespace, scoped_key(owner_id, key))
    }
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(anyhow::Error::new(err))
}

#[async_trait]
impl KeyValueStore for RedisKvStore {
    async fn get(&self, owner_id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let entry_key = self.entry_key(owner_id, key);
        let mut conn = self.connection.lock().await;
        let payload: Option<String> = conn.get(&entry_key).await.map_err(backend)?;
        payload
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
                    key: entry_key.clone(),
                    source,
                })
            })
            .transpose()
    }

    async fn set(&self, owner_id: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let entry_key = self.entry_key(owner_id, key);
        let payload = serde_json::to_string(&value).map_err(|source| StoreError::Decode {
            key: entry_key.clone(),
            source,
        })?;
        let mut conn = self.connection.lock().await;
        conn.set::<_, _, ()>(entry_key, payload)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
