use dashmap::DashMap;
use tb_core::{ConversationReference, StoreError};
use tracing::debug;

use crate::SharedKvStore;

/// Two-tier lookup of continuation handles: an in-process map in front of the durable store.
///
/// One instance belongs to one bot; its lifetime follows the bot's mount/unmount. Entries are
/// never evicted. Within one process lifetime the first recorded handle for a thread wins, so
/// repeated inbound traffic on a known thread does not rewrite the store.
pub struct ConversationReferenceCache {
    owner_id: String,
    local: DashMap<String, ConversationReference>,
    store: SharedKvStore,
}

impl ConversationReferenceCache {
    pub fn new(owner_id: impl Into<String>, store: SharedKvStore) -> Self {
        Self {
            owner_id: owner_id.into(),
            local: DashMap::new(),
            store,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Looks up the handle for `thread_id`, falling back to the durable store on a local miss.
    ///
    /// Only present results are memoized; an absent thread is looked up again next time.
    pub async fn resolve(
        &self,
        thread_id: &str,
    ) -> Result<Option<ConversationReference>, StoreError> {
        if let Some(found) = self.local.get(thread_id).map(|entry| entry.value().clone()) {
            return Ok(Some(found));
        }

        let Some(raw) = self.store.get(&self.owner_id, thread_id).await? else {
            debug!(owner_id = %self.owner_id, thread_id, "no stored conversation reference");
            return Ok(None);
        };
        let reference: ConversationReference =
            serde_json::from_value(raw).map_err(|source| StoreError::Decode {
                key: thread_id.to_string(),
                source,
            })?;
        self.local
            .insert(thread_id.to_string(), reference.clone());
        Ok(Some(reference))
    }

    /// Records the handle for `thread_id` unless this process already knows one.
    ///
    /// Returns `true` when the handle was written through to the durable store. Two concurrent
    /// first sightings of a thread may both write the store; locally the first to finish stays.
    pub async fn record(
        &self,
        thread_id: &str,
        reference: ConversationReference,
    ) -> Result<bool, StoreError> {
        if self.local.contains_key(thread_id) {
            return Ok(false);
        }

        let value = serde_json::to_value(&reference).map_err(|source| StoreError::Decode {
            key: thread_id.to_string(),
            source,
        })?;
        self.store.set(&self.owner_id, thread_id, value).await?;
        self.local.entry(thread_id.to_string()).or_insert(reference);
        debug!(owner_id = %self.owner_id, thread_id, "conversation reference recorded");
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}
