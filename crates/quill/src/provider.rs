//! The Provider: addressed access to the messages table.
//!
//! Every read and write goes through here. The provider resolves the target
//! address, calls the store, and after a write has returned publishes the
//! affected addresses on the shared [`ChangeNotifier`].

use std::path::Path;
use std::sync::Arc;

use quill_core::{
    Address, Contract, Filter, Message, MessageId, MessagePatch, NewMessage, Query, Route,
    SortOrder, DEFAULT_AUTHORITY,
};
use quill_notify::ChangeNotifier;
use quill_store::{SqliteStore, Store, StoreExt, UpgradePolicy, CURRENT_VERSION};
use tracing::{debug, error};

use crate::error::{ProviderError, Result};

/// Configuration for the Provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Authority part of every address this provider answers to.
    pub authority: String,
    /// Schema version the store is opened at.
    pub schema_version: u32,
    /// What an upgrade does with existing rows.
    pub upgrade_policy: UpgradePolicy,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            schema_version: CURRENT_VERSION,
            upgrade_policy: UpgradePolicy::default(),
        }
    }
}

/// The main Provider struct.
///
/// Provides:
/// - Address resolution (collection or single message)
/// - Insert, query, update and delete against the store
/// - Change publication after each successful write
pub struct Provider<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Where writes are announced.
    notifier: Arc<ChangeNotifier>,
    /// Address contract for the configured authority.
    contract: Contract,
    /// Configuration.
    config: ProviderConfig,
}

impl Provider<SqliteStore> {
    /// Open (or create) a SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>, config: ProviderConfig) -> Result<Self> {
        let contract = Contract::new(&config.authority)?;
        let store = SqliteStore::open_with(path, config.schema_version, config.upgrade_policy)?;
        Ok(Self::assemble(store, ChangeNotifier::new(), contract, config))
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory(config: ProviderConfig) -> Result<Self> {
        let contract = Contract::new(&config.authority)?;
        let store = SqliteStore::open_memory_with(config.schema_version, config.upgrade_policy)?;
        Ok(Self::assemble(store, ChangeNotifier::new(), contract, config))
    }
}

impl<S: Store> Provider<S> {
    /// Create a provider over an already opened store.
    ///
    /// `config.schema_version` and `config.upgrade_policy` are not applied
    /// here; they were the store's business when it was opened. Fails with
    /// [`ProviderError::Core`] if `config.authority` cannot appear in an
    /// address.
    pub fn new(store: S, notifier: Arc<ChangeNotifier>, config: ProviderConfig) -> Result<Self> {
        let contract = Contract::new(&config.authority)?;
        Ok(Self::assemble(store, notifier, contract, config))
    }

    fn assemble(
        store: S,
        notifier: Arc<ChangeNotifier>,
        contract: Contract,
        config: ProviderConfig,
    ) -> Self {
        Self {
            store: Arc::new(store),
            notifier,
            contract,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// `content://<authority>/messages`
    pub fn collection_address(&self) -> &Address {
        self.contract.collection()
    }

    /// `content://<authority>/messages/<id>`
    pub fn item_address(&self, id: MessageId) -> Address {
        self.contract.item(id)
    }

    /// Parse a textual address.
    pub fn parse_address(&self, s: &str) -> Result<Address> {
        Ok(Address::parse(s)?)
    }

    /// Map an address onto a route.
    pub fn resolve(&self, address: &Address) -> Result<Route> {
        self.route("resolve", address)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a message into the collection. Returns the new message's address.
    pub async fn insert(&self, address: &Address, message: NewMessage) -> Result<Address> {
        if self.route("insert", address)? != Route::Collection {
            return Err(unroutable("insert", address));
        }

        let id = self.store.insert(&message).await?;
        let item = self.contract.item(id);
        debug!(%item, "inserted message");

        self.notifier.publish(self.contract.collection());
        Ok(item)
    }

    /// Validate raw form input and insert it into the collection.
    pub async fn submit(&self, text: &str, author: &str, favorite: bool) -> Result<Address> {
        let message = NewMessage::from_form(text, author, favorite)?;
        let collection = self.contract.collection().clone();
        self.insert(&collection, message).await
    }

    /// Apply `patch` to the message at an item address.
    ///
    /// Returns the number of rows changed. Nothing is published when that is 0.
    pub async fn update(&self, address: &Address, patch: MessagePatch) -> Result<u64> {
        let id = self.item("update", address)?;

        let rows = self.store.update(id, &patch).await?;
        debug!(%id, rows, "updated message");

        if rows > 0 {
            self.publish_item(id);
        }
        Ok(rows)
    }

    /// Remove the message at an item address.
    ///
    /// Returns the number of rows removed. Nothing is published when that is 0.
    pub async fn delete(&self, address: &Address) -> Result<u64> {
        let id = self.item("delete", address)?;

        let rows = self.store.delete(id).await?;
        debug!(%id, rows, "deleted message");

        if rows > 0 {
            self.publish_item(id);
        }
        Ok(rows)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Read messages. A collection address reads every row matching
    /// `filter`; an item address reads at most that one row.
    pub async fn query(
        &self,
        address: &Address,
        filter: Filter,
        sort: Option<SortOrder>,
    ) -> Result<Vec<Message>> {
        let query = match self.route("query", address)? {
            Route::Collection => Query::all(),
            Route::Item(id) => Query::by_id(id),
        };
        Ok(self.store.query(&query.filter(filter).sort(sort)).await?)
    }

    /// Fetch one message by id.
    pub async fn get(&self, id: MessageId) -> Result<Option<Message>> {
        Ok(self.store.get(id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn route(&self, op: &'static str, address: &Address) -> Result<Route> {
        self.contract
            .resolve(address)
            .ok_or_else(|| unroutable(op, address))
    }

    fn item(&self, op: &'static str, address: &Address) -> Result<MessageId> {
        match self.route(op, address)? {
            Route::Item(id) => Ok(id),
            Route::Collection => Err(unroutable(op, address)),
        }
    }

    /// One round for both addresses, so a descendant subscriber on the
    /// collection hears about the write once.
    fn publish_item(&self, id: MessageId) {
        let addresses = [self.contract.item(id), self.contract.collection().clone()];
        self.notifier.publish_all(&addresses);
    }
}

fn unroutable(op: &'static str, address: &Address) -> ProviderError {
    error!(op, %address, "unroutable request");
    ProviderError::Unroutable(format!("{} {}", op, address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{Column, CoreError};
    use quill_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn provider() -> Provider<MemoryStore> {
        Provider::new(
            MemoryStore::new(),
            ChangeNotifier::new(),
            ProviderConfig::default(),
        )
        .unwrap()
    }

    fn count_changes(provider: &Provider<MemoryStore>, descendants: bool) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        provider.notifier().subscribe(
            provider.collection_address().clone(),
            descendants,
            move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );
        count
    }

    #[tokio::test]
    async fn test_insert_returns_item_address() {
        let p = provider();
        let collection = p.collection_address().clone();

        let first = p.insert(&collection, NewMessage::new("a", "x")).await.unwrap();
        let second = p.insert(&collection, NewMessage::new("b", "y")).await.unwrap();

        assert_eq!(first.to_string(), "content://quill.messages.provider/messages/1");
        assert_eq!(p.resolve(&second).unwrap(), Route::Item(MessageId(2)));
    }

    #[tokio::test]
    async fn test_insert_into_item_is_unroutable() {
        let p = provider();
        let count = count_changes(&p, true);

        let err = p
            .insert(&p.item_address(MessageId(1)), NewMessage::new("a", "x"))
            .await
            .unwrap_err();

        assert!(err.is_unroutable());
        assert_eq!(p.store().count().await.unwrap(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_and_delete_need_item() {
        let p = provider();
        let collection = p.collection_address().clone();

        let err = p
            .update(&collection, MessagePatch::new().favorite(true))
            .await
            .unwrap_err();
        assert!(err.is_unroutable());
        assert!(p.delete(&collection).await.unwrap_err().is_unroutable());
    }

    #[tokio::test]
    async fn test_foreign_addresses_are_unroutable() {
        let p = provider();
        for s in [
            "content://other.provider/messages",
            "content://quill.messages.provider/authors",
            "content://quill.messages.provider/messages/abc",
            "content://quill.messages.provider/messages/1/extra",
            "file://quill.messages.provider/messages",
        ] {
            let address = p.parse_address(s).unwrap();
            let err = p.query(&address, Filter::all(), None).await.unwrap_err();
            assert!(err.is_unroutable(), "{}", s);
        }
    }

    #[tokio::test]
    async fn test_parse_address_reports_core_error() {
        let p = provider();
        let err = p.parse_address("not an address").unwrap_err();
        assert!(matches!(err, ProviderError::Core(_)));
    }

    #[tokio::test]
    async fn test_one_notification_per_write() {
        let p = provider();
        let deep = count_changes(&p, true);
        let exact = count_changes(&p, false);
        let collection = p.collection_address().clone();

        let item = p.insert(&collection, NewMessage::new("a", "x")).await.unwrap();
        assert_eq!(deep.load(Ordering::SeqCst), 1);
        assert_eq!(exact.load(Ordering::SeqCst), 1);

        p.update(&item, MessagePatch::new().favorite(true)).await.unwrap();
        assert_eq!(deep.load(Ordering::SeqCst), 2);
        assert_eq!(exact.load(Ordering::SeqCst), 2);

        p.delete(&item).await.unwrap();
        assert_eq!(deep.load(Ordering::SeqCst), 3);
        assert_eq!(exact.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_notification_without_change() {
        let p = provider();
        let count = count_changes(&p, true);
        let missing = p.item_address(MessageId(42));

        assert_eq!(
            p.update(&missing, MessagePatch::new().text("b")).await.unwrap(),
            0
        );
        assert_eq!(p.delete(&missing).await.unwrap(), 0);
        p.query(p.collection_address(), Filter::all(), None)
            .await
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_collection_and_item() {
        let p = provider();
        let collection = p.collection_address().clone();
        p.insert(&collection, NewMessage::new("b", "bob")).await.unwrap();
        let item = p
            .insert(&collection, NewMessage::new("a", "ana").favorite(true))
            .await
            .unwrap();

        let sorted = p
            .query(&collection, Filter::all(), Some(SortOrder::asc(Column::Text)))
            .await
            .unwrap();
        let texts: Vec<&str> = sorted.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);

        let one = p.query(&item, Filter::all(), None).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].id, MessageId(2));

        let filtered_out = p
            .query(&item, Filter::all().author("bob"), None)
            .await
            .unwrap();
        assert!(filtered_out.is_empty());
    }

    #[tokio::test]
    async fn test_submit_validates_form() {
        let p = provider();

        let item = p.submit("  hi ", " ana ", false).await.unwrap();
        let stored = p.query(&item, Filter::all(), None).await.unwrap();
        assert_eq!(stored[0].text, "hi");
        assert_eq!(stored[0].author, "ana");

        let err = p.submit("   ", "ana", false).await.unwrap_err();
        assert!(matches!(err, ProviderError::Core(_)));
        assert_eq!(p.store().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_custom_authority() {
        let p = Provider::new(
            MemoryStore::new(),
            ChangeNotifier::new(),
            ProviderConfig {
                authority: "example.notes".to_string(),
                ..ProviderConfig::default()
            },
        )
        .unwrap();
        assert_eq!(
            p.collection_address().to_string(),
            "content://example.notes/messages"
        );

        let default_collection = Contract::default().collection().clone();
        assert!(p
            .insert(&default_collection, NewMessage::new("a", "x"))
            .await
            .unwrap_err()
            .is_unroutable());
    }

    #[tokio::test]
    async fn test_unusable_authority_is_rejected() {
        for authority in ["", "two/parts", "has space"] {
            let config = ProviderConfig {
                authority: authority.to_string(),
                ..ProviderConfig::default()
            };
            let err = Provider::new(MemoryStore::new(), ChangeNotifier::new(), config.clone())
                .err()
                .unwrap();
            assert!(matches!(err, ProviderError::Core(CoreError::InvalidAddress(_))));
            assert!(matches!(
                Provider::open_memory(config),
                Err(ProviderError::Core(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_open_memory_sqlite() {
        let p = Provider::open_memory(ProviderConfig::default()).unwrap();
        let item = p
            .insert(p.collection_address(), NewMessage::new("a", "x"))
            .await
            .unwrap();
        assert_eq!(p.resolve(&item).unwrap(), Route::Item(MessageId(1)));
        assert_eq!(
            p.store().schema_version().await.unwrap(),
            CURRENT_VERSION
        );
    }
}
