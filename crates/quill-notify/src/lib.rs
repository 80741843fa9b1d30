//! # Quill Notify
//!
//! Address-keyed change notification, decoupling writers from readers.
//!
//! ## Overview
//!
//! A [`ChangeNotifier`] is an ordinary value owned by the application's
//! composition root and passed by `Arc` to whoever writes or observes. There
//! is no process-wide instance.
//!
//! ## Key Properties
//!
//! - **Exactly once**: each matching subscription runs once per publish round
//! - **After the write**: writers publish only once their write has returned
//! - **Re-entrant**: callbacks run unlocked and may unsubscribe themselves
//! - **Hierarchical**: a subscription may include every address below its own
//!
//! ## Usage
//!
//! ```rust
//! use quill_core::{Contract, MessageId};
//! use quill_notify::ChangeNotifier;
//!
//! let contract = Contract::default();
//! let notifier = ChangeNotifier::new();
//!
//! let sub = notifier.subscribe(contract.collection().clone(), true, |changed| {
//!     println!("changed: {}", changed);
//! });
//!
//! assert_eq!(notifier.publish(&contract.item(MessageId(1))), 1);
//! assert!(sub.cancel());
//! ```
//!
//! ## Delivery
//!
//! ```text
//! writer            notifier                 subscriber
//!   |-- commit -->     |                         |
//!   |-- publish ------>|-- callback(address) --->|
//!   |                  |   (same thread, once)   |
//! ```

pub mod channel;
pub mod notifier;

pub use channel::ChangeStream;
pub use notifier::{Callback, ChangeNotifier, Subscription, SubscriptionId};
