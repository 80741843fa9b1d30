//! Database schema versioning for SQLite.
//!
//! The recorded version lives in `schema_migrations`. Opening a database
//! creates the `messages` table on first use, and moves an older recorded
//! version forward according to an [`UpgradePolicy`].

use rusqlite::{params, Connection, Transaction};
use tracing::info;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Name of the single data table.
pub const MESSAGES_TABLE: &str = "messages";

const CREATE_MESSAGES: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        author TEXT NOT NULL,
        favorite BOOLEAN NOT NULL DEFAULT 0
    )";

/// Additive steps on top of the version 1 table, keyed by the version that
/// introduces them. A version with no entry changes nothing structurally.
const ADDITIVE_STEPS: &[(u32, &str)] = &[
    (
        2,
        "CREATE INDEX IF NOT EXISTS idx_messages_author ON messages(author)",
    ),
];

/// What an upgrade does with existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpgradePolicy {
    /// Drop the table and recreate it empty. Ids restart at 1.
    #[default]
    Recreate,
    /// Apply the additive steps between the two versions and keep every row.
    Preserve,
}

/// Versions start at 1.
pub(crate) fn check_version(version: u32) -> Result<()> {
    if version == 0 {
        return Err(StoreError::Schema("schema version must be at least 1".into()));
    }
    Ok(())
}

/// Bring the schema to `target`, creating it if the database is fresh.
///
/// Idempotent: opening an up-to-date database again changes nothing.
pub fn open_schema(conn: &mut Connection, target: u32, policy: UpgradePolicy) -> Result<()> {
    check_version(target)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(schema)?;

    let recorded = recorded_version(conn)?;
    match recorded {
        0 => initialize(conn, target),
        v if v == target => Ok(()),
        v if v < target => upgrade(conn, v, target, policy),
        v => Err(StoreError::Schema(format!(
            "database is at schema version {}, newer than supported version {}",
            v, target
        ))),
    }
}

/// The highest recorded schema version, or 0 for a fresh database.
pub fn recorded_version(conn: &Connection) -> Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(schema)
}

/// Create the messages table at `version` on a fresh database.
pub fn initialize(conn: &mut Connection, version: u32) -> Result<()> {
    let tx = conn.transaction().map_err(schema)?;
    apply_steps(&tx, 0, version)?;
    record(&tx, version)?;
    tx.commit().map_err(schema)?;

    info!(version, "created messages schema");
    Ok(())
}

/// Move the schema from `old_version` to `new_version` in one transaction.
pub fn upgrade(
    conn: &mut Connection,
    old_version: u32,
    new_version: u32,
    policy: UpgradePolicy,
) -> Result<()> {
    if new_version <= old_version {
        return Err(StoreError::Schema(format!(
            "cannot upgrade from version {} to version {}",
            old_version, new_version
        )));
    }
    let recorded = recorded_version(conn)?;
    if recorded != old_version {
        return Err(StoreError::Schema(format!(
            "upgrade expected recorded version {}, found {}",
            old_version, recorded
        )));
    }

    let tx = conn.transaction().map_err(schema)?;
    match policy {
        UpgradePolicy::Recreate => {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", MESSAGES_TABLE))
                .map_err(schema)?;
            apply_steps(&tx, 0, new_version)?;
        }
        UpgradePolicy::Preserve => {
            apply_steps(&tx, old_version, new_version)?;
        }
    }
    record(&tx, new_version)?;
    tx.commit().map_err(schema)?;

    info!(old_version, new_version, ?policy, "upgraded messages schema");
    Ok(())
}

/// Apply every additive step in `(after, up_to]`.
fn apply_steps(tx: &Transaction<'_>, after: u32, up_to: u32) -> Result<()> {
    // Later steps assume the table, whatever range is applied.
    tx.execute_batch(CREATE_MESSAGES).map_err(schema)?;
    for (version, sql) in ADDITIVE_STEPS {
        if *version > after && *version <= up_to {
            tx.execute_batch(sql).map_err(schema)?;
        }
    }
    Ok(())
}

fn record(tx: &Transaction<'_>, version: u32) -> Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        params![version, now_millis()],
    )
    .map_err(schema)?;
    Ok(())
}

fn schema(e: rusqlite::Error) -> StoreError {
    StoreError::Schema(e.to_string())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    fn row_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_open_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        open_schema(&mut conn, CURRENT_VERSION, UpgradePolicy::Recreate).unwrap();

        let tables = tables(&conn);
        assert!(tables.contains(&"messages".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
        assert_eq!(recorded_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_open_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        open_schema(&mut conn, CURRENT_VERSION, UpgradePolicy::Recreate).unwrap();
        conn.execute(
            "INSERT INTO messages (text, author) VALUES ('t', 'a')",
            [],
        )
        .unwrap();

        open_schema(&mut conn, CURRENT_VERSION, UpgradePolicy::Recreate).unwrap();
        open_schema(&mut conn, CURRENT_VERSION, UpgradePolicy::Recreate).unwrap();

        assert_eq!(row_count(&conn), 1);
        assert_eq!(recorded_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_favorite_defaults_to_false() {
        let mut conn = Connection::open_in_memory().unwrap();
        open_schema(&mut conn, CURRENT_VERSION, UpgradePolicy::Recreate).unwrap();
        conn.execute("INSERT INTO messages (text, author) VALUES ('t', 'a')", [])
            .unwrap();
        let favorite: bool = conn
            .query_row("SELECT favorite FROM messages", [], |row| row.get(0))
            .unwrap();
        assert!(!favorite);
    }

    #[test]
    fn test_not_null_constraints() {
        let mut conn = Connection::open_in_memory().unwrap();
        open_schema(&mut conn, CURRENT_VERSION, UpgradePolicy::Recreate).unwrap();
        assert!(conn
            .execute("INSERT INTO messages (text) VALUES ('only text')", [])
            .is_err());
    }

    #[test]
    fn test_recreate_upgrade_drops_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        open_schema(&mut conn, 1, UpgradePolicy::Recreate).unwrap();
        conn.execute("INSERT INTO messages (text, author) VALUES ('t', 'a')", [])
            .unwrap();

        open_schema(&mut conn, 2, UpgradePolicy::Recreate).unwrap();
        assert_eq!(row_count(&conn), 0);
        assert_eq!(recorded_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_preserve_upgrade_keeps_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        open_schema(&mut conn, 1, UpgradePolicy::Preserve).unwrap();
        conn.execute("INSERT INTO messages (text, author) VALUES ('t', 'a')", [])
            .unwrap();

        open_schema(&mut conn, 2, UpgradePolicy::Preserve).unwrap();
        assert_eq!(row_count(&conn), 1);
        assert_eq!(recorded_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_downgrade_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        open_schema(&mut conn, 3, UpgradePolicy::Recreate).unwrap();
        let err = open_schema(&mut conn, 2, UpgradePolicy::Recreate).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_upgrade_checks_versions() {
        let mut conn = Connection::open_in_memory().unwrap();
        open_schema(&mut conn, 2, UpgradePolicy::Recreate).unwrap();

        assert!(upgrade(&mut conn, 2, 2, UpgradePolicy::Recreate).is_err());
        assert!(upgrade(&mut conn, 1, 3, UpgradePolicy::Recreate).is_err());
        upgrade(&mut conn, 2, 3, UpgradePolicy::Recreate).unwrap();
        assert_eq!(recorded_version(&conn).unwrap(), 3);
    }
}
