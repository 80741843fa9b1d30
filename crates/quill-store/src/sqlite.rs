//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Quill. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use tracing::{debug, info};

use quill_core::{Message, MessageId, MessagePatch, NewMessage, Query};

use crate::error::{Result, StoreError};
use crate::migration::{self, UpgradePolicy, CURRENT_VERSION};
use crate::traits::Store;

const SELECT_COLUMNS: &str = "SELECT id, text, author, favorite FROM messages";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex, which also serializes every write against
/// every read. All operations use spawn_blocking to avoid blocking the async
/// runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
    /// Applied by [`Store::upgrade`].
    policy: UpgradePolicy,
}

impl SqliteStore {
    /// Open a SQLite database at the given path at the current schema version.
    ///
    /// Creates the file and the schema if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, CURRENT_VERSION, UpgradePolicy::default())
    }

    /// Open a SQLite database at an explicit schema version.
    ///
    /// A database recorded at an older version is upgraded under `policy`;
    /// one recorded at a newer version is refused.
    pub fn open_with(path: impl AsRef<Path>, version: u32, policy: UpgradePolicy) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migration::open_schema(&mut conn, version, policy)?;

        info!(path = %path.display(), version, "opened message store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            policy,
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::open_memory_with(CURRENT_VERSION, UpgradePolicy::default())
    }

    /// Open an in-memory SQLite database at an explicit schema version.
    pub fn open_memory_with(version: u32, policy: UpgradePolicy) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::open_schema(&mut conn, version, policy)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            policy,
        })
    }

    /// The upgrade policy this store was opened with.
    pub fn policy(&self) -> UpgradePolicy {
        self.policy
    }

    /// Run `f` against the connection on the blocking thread pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StoreError::Lock(format!("connection mutex poisoned: {}", e)))
}

// Helper to convert a row to Message
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(row.get("id")?),
        text: row.get("text")?,
        author: row.get("author")?,
        favorite: row.get("favorite")?,
    })
}

/// Build the SELECT statement and its positional arguments for `query`.
fn select_sql(query: &Query) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();

    if let Some(id) = query.id {
        args.push(Value::Integer(id.get()));
        clauses.push(format!("id = ?{}", args.len()));
    }
    if let Some(text) = &query.filter.text {
        args.push(Value::Text(text.clone()));
        clauses.push(format!("text = ?{}", args.len()));
    }
    if let Some(author) = &query.filter.author {
        args.push(Value::Text(author.clone()));
        clauses.push(format!("author = ?{}", args.len()));
    }
    if let Some(favorite) = query.filter.favorite {
        args.push(Value::Integer(i64::from(favorite)));
        clauses.push(format!("favorite = ?{}", args.len()));
    }

    let mut sql = String::from(SELECT_COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY ");
    match &query.sort {
        Some(order) => sql.push_str(&order.to_sql()),
        None => sql.push_str("id ASC"),
    }
    (sql, args)
}

/// Build the UPDATE statement for a non-empty patch.
fn update_sql(id: MessageId, patch: &MessagePatch) -> (String, Vec<Value>) {
    let mut sets = Vec::new();
    let mut args = Vec::new();

    if let Some(text) = &patch.text {
        args.push(Value::Text(text.clone()));
        sets.push(format!("text = ?{}", args.len()));
    }
    if let Some(author) = &patch.author {
        args.push(Value::Text(author.clone()));
        sets.push(format!("author = ?{}", args.len()));
    }
    if let Some(favorite) = patch.favorite {
        args.push(Value::Integer(i64::from(favorite)));
        sets.push(format!("favorite = ?{}", args.len()));
    }
    args.push(Value::Integer(id.get()));
    let sql = format!(
        "UPDATE messages SET {} WHERE id = ?{}",
        sets.join(", "),
        args.len()
    );
    (sql, args)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert(&self, message: &NewMessage) -> Result<MessageId> {
        let message = message.clone();

        let id = self
            .blocking(move |conn| {
                conn.execute(
                    "INSERT INTO messages (text, author, favorite) VALUES (?1, ?2, ?3)",
                    params![message.text, message.author, message.favorite],
                )
                .map_err(StoreError::Write)?;
                Ok(MessageId(conn.last_insert_rowid()))
            })
            .await?;

        debug!(%id, "inserted message");
        Ok(id)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Message>> {
        let (sql, args) = select_sql(query);

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), row_to_message)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn update(&self, id: MessageId, patch: &MessagePatch) -> Result<u64> {
        if patch.is_empty() {
            return Ok(0);
        }
        let (sql, args) = update_sql(id, patch);

        let changed = self
            .blocking(move |conn| {
                conn.execute(&sql, params_from_iter(args.iter()))
                    .map(|n| n as u64)
                    .map_err(StoreError::Write)
            })
            .await?;

        debug!(%id, changed, "updated message");
        Ok(changed)
    }

    async fn delete(&self, id: MessageId) -> Result<u64> {
        let removed = self
            .blocking(move |conn| {
                conn.execute("DELETE FROM messages WHERE id = ?1", params![id.get()])
                    .map(|n| n as u64)
                    .map_err(StoreError::Write)
            })
            .await?;

        debug!(%id, removed, "deleted message");
        Ok(removed)
    }

    async fn count(&self) -> Result<u64> {
        self.blocking(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            u64::try_from(n).map_err(|_| StoreError::InvalidData(format!("negative count {}", n)))
        })
        .await
    }

    async fn schema_version(&self) -> Result<u32> {
        self.blocking(|conn| migration::recorded_version(conn)).await
    }

    async fn upgrade(&self, old_version: u32, new_version: u32) -> Result<()> {
        let policy = self.policy;
        self.blocking(move |conn| migration::upgrade(conn, old_version, new_version, policy))
            .await
    }
}
