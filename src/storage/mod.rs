//! Tenant-scoped persistence.
//!
//! Every record lives in a single table keyed by `PK = TENANT#{tenant_id}` and
//! `SK = {KIND}#{id}`. Records that need a secondary lookup also carry a
//! `GSI1PK`. The record itself is stored as a JSON body so that the item shape
//! can evolve without table migrations.

#[cfg(feature = "dynamo")]
mod dynamo;
mod memory;

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Malformed item {pk}/{sk}: {reason}")]
    Corrupt {
        pk: String,
        sk: String,
        reason: String,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Raw item as persisted by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub pk: String,
    pub sk: String,
    pub gsi1pk: Option<String>,
    pub body: String,
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<StoredItem>>;

    async fn put(&self, item: StoredItem) -> Result<()>;

    /// Returns `true` when an item was removed.
    async fn delete(&self, pk: &str, sk: &str) -> Result<bool>;

    /// Items under `pk` whose sort key starts with `sk_prefix`, ordered by sort key.
    async fn query_prefix(&self, pk: &str, sk_prefix: &str) -> Result<Vec<StoredItem>>;

    async fn query_index(&self, gsi1pk: &str) -> Result<Vec<StoredItem>>;

    async fn ping(&self) -> Result<()>;
}

/// A record type persisted through [`Repository`].
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const KIND: &'static str;

    fn entity_id(&self) -> String;

    fn index_key(&self) -> Option<String> {
        None
    }
}

pub fn tenant_pk(tenant_id: &str) -> String {
    format!("TENANT#{tenant_id}")
}

fn sort_key<E: Entity>(id: &str) -> String {
    format!("{}#{}", E::KIND, id)
}

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn ItemStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn get<E: Entity>(&self, tenant_id: &str, id: &str) -> Result<Option<E>> {
        let pk = tenant_pk(tenant_id);
        let sk = sort_key::<E>(id);
        match self.store.get(&pk, &sk).await? {
            Some(item) => decode(&item).map(Some),
            None => Ok(None),
        }
    }

    pub async fn put<E: Entity>(&self, tenant_id: &str, entity: &E) -> Result<()> {
        let item = StoredItem {
            pk: tenant_pk(tenant_id),
            sk: sort_key::<E>(&entity.entity_id()),
            gsi1pk: entity.index_key(),
            body: serde_json::to_string(entity)?,
        };
        self.store.put(item).await
    }

    pub async fn delete<E: Entity>(&self, tenant_id: &str, id: &str) -> Result<bool> {
        self.store
            .delete(&tenant_pk(tenant_id), &sort_key::<E>(id))
            .await
    }

    pub async fn list<E: Entity>(&self, tenant_id: &str) -> Result<Vec<E>> {
        let prefix = format!("{}#", E::KIND);
        self.store
            .query_prefix(&tenant_pk(tenant_id), &prefix)
            .await?
            .iter()
            .map(decode)
            .collect()
    }

    /// Entities of kind `E` sharing a secondary index key.
    pub async fn list_by_index<E: Entity>(&self, index_key: &str) -> Result<Vec<E>> {
        let prefix = format!("{}#", E::KIND);
        self.store
            .query_index(index_key)
            .await?
            .iter()
            .filter(|item| item.sk.starts_with(&prefix))
            .map(decode)
            .collect()
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}

fn decode<E: Entity>(item: &StoredItem) -> Result<E> {
    serde_json::from_str(&item.body).map_err(|e| StorageError::Corrupt {
        pk: item.pk.clone(),
        sk: item.sk.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        group: Option<String>,
        text: String,
    }

    impl Entity for Note {
        const KIND: &'static str = "NOTE";

        fn entity_id(&self) -> String {
            self.id.clone()
        }

        fn index_key(&self) -> Option<String> {
            self.group.as_ref().map(|g| format!("GROUP#{g}"))
        }
    }

    fn note(id: &str, group: Option<&str>) -> Note {
        Note {
            id: id.to_string(),
            group: group.map(String::from),
            text: format!("note {id}"),
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let repo = Repository::in_memory();
        repo.put("t1", &note("a", None)).await.unwrap();

        let found: Option<Note> = repo.get("t1", "a").await.unwrap();
        assert_eq!(found, Some(note("a", None)));

        let other_tenant: Option<Note> = repo.get("t2", "a").await.unwrap();
        assert!(other_tenant.is_none());

        assert!(repo.delete::<Note>("t1", "a").await.unwrap());
        assert!(!repo.delete::<Note>("t1", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_scoped_by_kind_and_tenant() {
        let repo = Repository::in_memory();
        repo.put("t1", &note("a", None)).await.unwrap();
        repo.put("t1", &note("b", None)).await.unwrap();
        repo.put("t2", &note("c", None)).await.unwrap();

        let notes: Vec<Note> = repo.list("t1").await.unwrap();
        let ids: Vec<_> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_list_by_index() {
        let repo = Repository::in_memory();
        repo.put("t1", &note("a", Some("g"))).await.unwrap();
        repo.put("t1", &note("b", Some("g"))).await.unwrap();
        repo.put("t1", &note("c", Some("h"))).await.unwrap();

        let grouped: Vec<Note> = repo.list_by_index("GROUP#g").await.unwrap();
        assert_eq!(grouped.len(), 2);

        // Re-putting without a group drops the item from the index.
        repo.put("t1", &note("b", None)).await.unwrap();
        let grouped: Vec<Note> = repo.list_by_index("GROUP#g").await.unwrap();
        assert_eq!(grouped.len(), 1);
    }
}
