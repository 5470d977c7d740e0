use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use tb_core::SharedBus;
use tb_session::{ConversationReferenceCache, SharedKvStore};
use tracing::info;

use crate::adapter::{ConnectorAdapter, SharedAdapter};
use crate::client::ChannelClient;
use crate::config::ChannelConfig;

/// Mounted Teams clients keyed by bot id.
///
/// Cloning is cheap and every clone sees the same set of bots.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<DashMap<String, Arc<ChannelClient>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a bot with the connector adapter built from its config.
    ///
    /// Disabled bots are skipped and yield `None`.
    pub fn mount_bot(
        &self,
        config: ChannelConfig,
        store: SharedKvStore,
        bus: SharedBus,
    ) -> Result<Option<Arc<ChannelClient>>> {
        if !config.enabled {
            info!(bot_id = %config.bot_id, "teams channel disabled for bot");
            return Ok(None);
        }
        let adapter = Arc::new(ConnectorAdapter::new(&config)?);
        Ok(Some(self.mount_with_adapter(config, store, bus, adapter)))
    }

    /// Builds the bot's cache and client, initializes it and makes it reachable by bot id.
    /// A bot mounted twice replaces its previous client and cache.
    pub fn mount_with_adapter(
        &self,
        config: ChannelConfig,
        store: SharedKvStore,
        bus: SharedBus,
        adapter: SharedAdapter,
    ) -> Arc<ChannelClient> {
        let bot_id = config.bot_id.clone();
        let cache = Arc::new(ConversationReferenceCache::new(bot_id.as_str(), store));
        let client = Arc::new(ChannelClient::new(config, cache, bus));
        client.initialize(adapter);
        self.clients.insert(bot_id.clone(), client.clone());
        info!(%bot_id, "teams channel mounted");
        client
    }

    /// Removes the bot's client; its reference cache is dropped with it.
    pub fn unmount_bot(&self, bot_id: &str) -> bool {
        let removed = self.clients.remove(bot_id).is_some();
        if removed {
            info!(bot_id, "teams channel unmounted");
        }
        removed
    }

    pub fn get(&self, bot_id: &str) -> Option<Arc<ChannelClient>> {
        self.clients.get(bot_id).map(|entry| entry.value().clone())
    }

    pub fn bot_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tb_core::NoopBus;
    use tb_session::shared_memory_store;

    use super::*;

    #[test]
    fn mount_and_unmount_track_bots() {
        let registry = ClientRegistry::new();
        let store = shared_memory_store();
        let bus: SharedBus = Arc::new(NoopBus);

        let client = registry
            .mount_bot(ChannelConfig::new("sales"), store.clone(), bus.clone())
            .unwrap()
            .expect("enabled bot is mounted");
        assert!(client.is_initialized());
        assert_eq!(client.cache().owner_id(), "sales");

        let mut disabled = ChannelConfig::new("support");
        disabled.enabled = false;
        assert!(registry.mount_bot(disabled, store, bus).unwrap().is_none());

        assert_eq!(registry.bot_ids(), vec!["sales".to_string()]);
        assert!(registry.unmount_bot("sales"));
        assert!(!registry.unmount_bot("sales"));
        assert!(registry.is_empty());
    }
}
