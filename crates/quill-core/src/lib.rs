//! # Quill Core
//!
//! Pure types for Quill: message records, content addresses and query
//! descriptions.
//!
//! This crate contains no I/O and no storage. Everything here is plain data
//! plus the pure mappings between them (address routing, filter matching,
//! sort comparison, form validation).
//!
//! ## Key Types
//!
//! - [`Message`] - A persisted record
//! - [`NewMessage`] - A record before the store assigns its id
//! - [`MessagePatch`] - A partial update
//! - [`Address`] - A content address, `content://<authority>/messages[/<id>]`
//! - [`Contract`] - Resolves addresses to a [`Route`]
//! - [`Query`], [`Filter`], [`SortOrder`] - Read selection

pub mod address;
pub mod error;
pub mod message;
pub mod query;
pub mod types;
pub mod validation;

pub use address::{Address, Contract, Route, CONTENT_SCHEME, DEFAULT_AUTHORITY, PATH_MESSAGES};
pub use error::CoreError;
pub use message::{Message, MessagePatch, NewMessage};
pub use query::{Column, Filter, Query, SortOrder};
pub use types::MessageId;
pub use validation::{validate_form, validate_patch};
