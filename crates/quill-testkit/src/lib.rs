//! # Quill Testkit
//!
//! Testing utilities for Quill.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a provider over an in-memory store whose reads can be
//!   made to fail, plus an observer that records every change it hears
//! - **Generators**: Proptest strategies for messages, patches, filters and
//!   write sequences
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use quill_testkit::generators::WriteOp;
//!
//! proptest! {
//!     #[test]
//!     fn backends_agree(ops: Vec<WriteOp>) {
//!         // apply `ops` to two stores and compare
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use quill_testkit::TestFixture;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let fixture = TestFixture::new();
//! let observer = fixture.observe(true);
//! fixture.add("hello", "ana").await;
//! assert_eq!(observer.count(), 1);
//! # });
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{init_tracing, wait_for_state, FlakyStore, RecordingObserver, TestFixture};
pub use generators::{message_patch, new_message, write_ops, WriteOp};
