//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! (id assignment, ordering, upgrade policies) but keeps everything in
//! memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{debug, info};

use quill_core::{Message, MessageId, MessagePatch, NewMessage, Query};

use crate::error::{Result, StoreError};
use crate::migration::{check_version, UpgradePolicy, CURRENT_VERSION};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock:
/// concurrent readers, exclusive writers.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
    policy: UpgradePolicy,
}

struct MemoryStoreInner {
    /// Rows in id order.
    rows: BTreeMap<MessageId, Message>,

    /// Next id to hand out. Never decreases while the table exists.
    next_id: i64,

    /// Recorded schema version.
    version: u32,
}

impl MemoryStore {
    /// Create a new empty in-memory store at the current schema version.
    pub fn new() -> Self {
        Self::empty(CURRENT_VERSION, UpgradePolicy::default())
    }

    /// Create a new empty store at an explicit version and upgrade policy.
    ///
    /// Version 0 is refused, as it is by [`SqliteStore`](crate::SqliteStore).
    pub fn with_version(version: u32, policy: UpgradePolicy) -> Result<Self> {
        check_version(version)?;
        Ok(Self::empty(version, policy))
    }

    fn empty(version: u32, policy: UpgradePolicy) -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                rows: BTreeMap::new(),
                next_id: 1,
                version,
            }),
            policy,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Lock(format!("memory store poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Lock(format!("memory store poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, message: &NewMessage) -> Result<MessageId> {
        let mut inner = self.write()?;

        let id = MessageId(inner.next_id);
        inner.next_id += 1;
        inner.rows.insert(id, message.clone().with_id(id));

        debug!(%id, "inserted message");
        Ok(id)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Message>> {
        let inner = self.read()?;

        let mut rows: Vec<Message> = match query.id {
            Some(id) => inner.rows.get(&id).into_iter().cloned().collect(),
            None => inner.rows.values().cloned().collect(),
        };
        rows.retain(|m| query.filter.matches(m));
        if let Some(order) = &query.sort {
            rows.sort_by(|a, b| order.compare(a, b));
        }
        Ok(rows)
    }

    async fn update(&self, id: MessageId, patch: &MessagePatch) -> Result<u64> {
        if patch.is_empty() {
            return Ok(0);
        }
        let mut inner = self.write()?;

        let changed = match inner.rows.get_mut(&id) {
            Some(row) => u64::from(row.apply(patch)),
            None => 0,
        };
        debug!(%id, changed, "updated message");
        Ok(changed)
    }

    async fn delete(&self, id: MessageId) -> Result<u64> {
        let mut inner = self.write()?;

        let removed = u64::from(inner.rows.remove(&id).is_some());
        debug!(%id, removed, "deleted message");
        Ok(removed)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read()?.rows.len() as u64)
    }

    async fn schema_version(&self) -> Result<u32> {
        Ok(self.read()?.version)
    }

    async fn upgrade(&self, old_version: u32, new_version: u32) -> Result<()> {
        let mut inner = self.write()?;

        if new_version <= old_version {
            return Err(StoreError::Schema(format!(
                "cannot upgrade from version {} to version {}",
                old_version, new_version
            )));
        }
        if inner.version != old_version {
            return Err(StoreError::Schema(format!(
                "upgrade expected recorded version {}, found {}",
                old_version, inner.version
            )));
        }

        if self.policy == UpgradePolicy::Recreate {
            inner.rows.clear();
            inner.next_id = 1;
        }
        inner.version = new_version;

        info!(old_version, new_version, policy = ?self.policy, "upgraded messages schema");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use quill_core::{Column, Filter, SortOrder};

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        let new = NewMessage::new("hello", "ana");

        let id = store.insert(&new).await.unwrap();
        assert_eq!(id, MessageId(1));
        assert_eq!(store.get(id).await.unwrap(), Some(new.with_id(id)));
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let store = MemoryStore::new();
        store.insert(&NewMessage::new("a", "x")).await.unwrap();
        let last = store.insert(&NewMessage::new("b", "x")).await.unwrap();
        store.delete(last).await.unwrap();

        let next = store.insert(&NewMessage::new("c", "x")).await.unwrap();
        assert_eq!(next, MessageId(3));
    }

    #[tokio::test]
    async fn test_query_matches_sqlite_ordering() {
        let store = MemoryStore::new();
        store.insert(&NewMessage::new("b", "bob")).await.unwrap();
        store
            .insert(&NewMessage::new("a", "ana").favorite(true))
            .await
            .unwrap();
        store.insert(&NewMessage::new("c", "ana")).await.unwrap();

        let by_author = store
            .query(
                &Query::all()
                    .filter(Filter::all().author("ana"))
                    .sort(Some(SortOrder::desc(Column::Text))),
            )
            .await
            .unwrap();
        let texts: Vec<&str> = by_author.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_counts() {
        let store = MemoryStore::new();
        let id = store.insert(&NewMessage::new("a", "x")).await.unwrap();

        assert_eq!(
            store.update(id, &MessagePatch::new().text("b")).await.unwrap(),
            1
        );
        assert_eq!(
            store
                .update(MessageId(9), &MessagePatch::new().text("b"))
                .await
                .unwrap(),
            0
        );
        assert_eq!(store.update(id, &MessagePatch::new()).await.unwrap(), 0);
        assert_eq!(store.delete(MessageId(9)).await.unwrap(), 0);
        assert_eq!(store.delete(id).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_version_zero_refused_like_sqlite() {
        let memory = MemoryStore::with_version(0, UpgradePolicy::Recreate);
        assert!(memory.err().unwrap().is_schema());

        let sqlite = crate::SqliteStore::open_memory_with(0, UpgradePolicy::Recreate);
        assert!(sqlite.err().unwrap().is_schema());

        let store = MemoryStore::with_version(1, UpgradePolicy::Preserve).unwrap();
        assert_eq!(store.schema_version().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upgrade_policies() {
        let recreate = MemoryStore::new();
        recreate.insert(&NewMessage::new("a", "x")).await.unwrap();
        recreate
            .upgrade(CURRENT_VERSION, CURRENT_VERSION + 1)
            .await
            .unwrap();
        assert_eq!(recreate.count().await.unwrap(), 0);
        assert_eq!(
            recreate.insert(&NewMessage::new("b", "x")).await.unwrap(),
            MessageId(1)
        );

        let preserve =
            MemoryStore::with_version(CURRENT_VERSION, UpgradePolicy::Preserve).unwrap();
        preserve.insert(&NewMessage::new("a", "x")).await.unwrap();
        preserve
            .upgrade(CURRENT_VERSION, CURRENT_VERSION + 1)
            .await
            .unwrap();
        assert_eq!(preserve.count().await.unwrap(), 1);
        assert_eq!(
            preserve.schema_version().await.unwrap(),
            CURRENT_VERSION + 1
        );

        assert!(preserve.upgrade(1, 5).await.unwrap_err().is_schema());
    }
}
