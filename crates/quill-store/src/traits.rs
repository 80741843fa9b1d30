//! Store trait: the abstract interface for message persistence.
//!
//! This trait keeps the provider storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use quill_core::{Message, MessageId, MessagePatch, NewMessage, Query};

use crate::error::Result;

/// The Store trait: async interface for the messages table.
///
/// All methods are async so that blocking backends can move their work off
/// the runtime. For SQLite, every call runs under `spawn_blocking`.
///
/// # Design Notes
///
/// - **Serialized writes**: `insert`, `update`, `delete` and `upgrade` never
///   interleave with each other or with a read of the same table.
/// - **Missing rows are not errors**: `update` and `delete` on an unknown id
///   return `0`; callers check the count.
/// - **Empty strings are legal**: the store enforces presence, not content.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Row Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a row and return its assigned id.
    async fn insert(&self, message: &NewMessage) -> Result<MessageId>;

    /// Read matching rows as one consistent snapshot.
    ///
    /// Rows come back in ascending id order unless `query.sort` says
    /// otherwise.
    async fn query(&self, query: &Query) -> Result<Vec<Message>>;

    /// Replace the supplied columns on the row with `id`.
    ///
    /// Returns the number of rows changed (0 or 1). An empty patch changes
    /// nothing and returns 0.
    async fn update(&self, id: MessageId, patch: &MessagePatch) -> Result<u64>;

    /// Remove the row with `id`. Returns the number of rows removed (0 or 1).
    async fn delete(&self, id: MessageId) -> Result<u64>;

    /// Number of rows in the table.
    async fn count(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Schema Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// The schema version currently recorded.
    async fn schema_version(&self) -> Result<u32>;

    /// Move the schema from `old_version` to `new_version`.
    ///
    /// `old_version` must be the recorded version and `new_version` must be
    /// newer. What happens to existing rows depends on the store's
    /// [`UpgradePolicy`](crate::UpgradePolicy).
    async fn upgrade(&self, old_version: u32, new_version: u32) -> Result<()>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Fetch a single row by id.
    fn get(
        &self,
        id: MessageId,
    ) -> impl std::future::Future<Output = Result<Option<Message>>> + Send;

    /// Fetch every row in storage order.
    fn all(&self) -> impl std::future::Future<Output = Result<Vec<Message>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn get(&self, id: MessageId) -> Result<Option<Message>> {
        let mut rows = self.query(&Query::by_id(id)).await?;
        Ok(rows.pop())
    }

    async fn all(&self) -> Result<Vec<Message>> {
        self.query(&Query::all()).await
    }
}
