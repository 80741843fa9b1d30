//! # Quill Store
//!
//! Record store for Quill. Provides a trait-based interface over the single
//! `messages` table with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store abstracts message persistence behind the [`Store`] trait,
//! allowing the provider to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`UpgradePolicy`] - What a schema upgrade does with existing rows
//!
//! ## Usage
//!
//! ```rust,no_run
//! use quill_core::{NewMessage, Query};
//! use quill_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("quill.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let id = store.insert(&NewMessage::new("hello", "ana")).await.unwrap();
//!     let rows = store.query(&Query::by_id(id)).await.unwrap();
//!     assert_eq!(rows.len(), 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Monotonic ids**: ids come from SQLite `AUTOINCREMENT` and are never
//!   reused while the table exists
//! - **No-op on missing rows**: update/delete of an unknown id report 0 rows
//! - **Destructive upgrade by default**: [`UpgradePolicy::Recreate`] drops
//!   the table; [`UpgradePolicy::Preserve`] keeps rows

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use migration::{UpgradePolicy, CURRENT_VERSION};
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreExt};
