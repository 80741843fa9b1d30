//! # Quill
//!
//! The Quill messages data layer: addressed access to a local messages
//! table, change notification, and a list view that keeps itself current.
//!
//! ## Overview
//!
//! - **Provider**: the only way in. Resolves `content://` addresses, runs
//!   the store operation, and announces successful writes
//! - **Notifier**: address-keyed publish/subscribe, shared by `Arc`
//! - **MessageList**: the latest full read of the collection, refreshed off
//!   the writer's thread whenever a change is published
//!
//! ## Key Concepts
//!
//! - **Collection address**: `content://quill.messages.provider/messages`
//! - **Item address**: the collection address plus `/<id>`
//! - **Exactly once**: every write that changes rows notifies each
//!   subscriber once; reads and no-op writes notify nobody
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quill::{MessageList, Provider, ProviderConfig};
//! use quill::core::{MessagePatch, NewMessage};
//!
//! async fn example() {
//!     // Open storage
//!     let provider = Arc::new(Provider::open("quill.db", ProviderConfig::default()).unwrap());
//!
//!     // Observe the collection
//!     let list = MessageList::open(Arc::clone(&provider)).await;
//!
//!     // Write through the provider
//!     let item = provider
//!         .insert(provider.collection_address(), NewMessage::new("hello", "ana"))
//!         .await
//!         .unwrap();
//!     provider
//!         .update(&item, MessagePatch::new().favorite(true))
//!         .await
//!         .unwrap();
//!
//!     println!("{:?}", list.snapshot());
//!     list.teardown().await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `quill::core` - Records, addresses and queries
//! - `quill::store` - Storage abstraction and SQLite
//! - `quill::notify` - Change notification

pub mod error;
pub mod list;
pub mod provider;

// Re-export component crates
pub use quill_core as core;
pub use quill_notify as notify;
pub use quill_store as store;

// Re-export main types for convenience
pub use error::{ProviderError, Result};
pub use list::{ListState, MessageList};
pub use provider::{Provider, ProviderConfig};

// Re-export commonly used component types
pub use quill_core::{
    Address, Column, Filter, Message, MessageId, MessagePatch, NewMessage, Route, SortOrder,
};
pub use quill_notify::{ChangeNotifier, Subscription, SubscriptionId};
pub use quill_store::{MemoryStore, SqliteStore, Store, UpgradePolicy};
