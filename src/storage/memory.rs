//! In-process item store for local development and tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{ItemStore, Result, StoredItem};

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<(String, String), StoredItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<StoredItem>> {
        let items = self.items.read().await;
        Ok(items.get(&(pk.to_string(), sk.to_string())).cloned())
    }

    async fn put(&self, item: StoredItem) -> Result<()> {
        let mut items = self.items.write().await;
        items.insert((item.pk.clone(), item.sk.clone()), item);
        Ok(())
    }

    async fn delete(&self, pk: &str, sk: &str) -> Result<bool> {
        let mut items = self.items.write().await;
        Ok(items.remove(&(pk.to_string(), sk.to_string())).is_some())
    }

    async fn query_prefix(&self, pk: &str, sk_prefix: &str) -> Result<Vec<StoredItem>> {
        let items = self.items.read().await;
        Ok(items
            .range((pk.to_string(), sk_prefix.to_string())..)
            .take_while(|((item_pk, item_sk), _)| item_pk == pk && item_sk.starts_with(sk_prefix))
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn query_index(&self, gsi1pk: &str) -> Result<Vec<StoredItem>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|item| item.gsi1pk.as_deref() == Some(gsi1pk))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
