//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use quill::{ListState, Provider, ProviderConfig};
use quill_core::{Address, Message, MessageId, MessagePatch, NewMessage, Query};
use quill_notify::{ChangeNotifier, Subscription};
use quill_store::{MemoryStore, Result, Store, StoreError};
use tokio::sync::watch;

/// Install a `tracing` subscriber for tests. Honors `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A memory store whose reads or writes can be made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `query` fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every following `insert`, `update` and `delete` fail with
    /// [`StoreError::Write`] (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            let readonly = rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY);
            return Err(StoreError::Write(rusqlite::Error::SqliteFailure(
                readonly,
                Some("injected write failure".into()),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn insert(&self, message: &NewMessage) -> Result<MessageId> {
        self.check_write()?;
        self.inner.insert(message).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Message>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidData("injected read failure".into()));
        }
        self.inner.query(query).await
    }

    async fn update(&self, id: MessageId, patch: &MessagePatch) -> Result<u64> {
        self.check_write()?;
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: MessageId) -> Result<u64> {
        self.check_write()?;
        self.inner.delete(id).await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn schema_version(&self) -> Result<u32> {
        self.inner.schema_version().await
    }

    async fn upgrade(&self, old_version: u32, new_version: u32) -> Result<()> {
        self.inner.upgrade(old_version, new_version).await
    }
}

/// A provider over a [`FlakyStore`] with a fresh notifier.
pub struct TestFixture {
    pub provider: Arc<Provider<FlakyStore>>,
}

impl TestFixture {
    pub fn new() -> Self {
        init_tracing();
        Self {
            provider: Arc::new(
                Provider::new(
                    FlakyStore::new(),
                    ChangeNotifier::new(),
                    ProviderConfig::default(),
                )
                .expect("default config"),
            ),
        }
    }

    pub fn collection(&self) -> Address {
        self.provider.collection_address().clone()
    }

    /// Insert a message through the provider.
    pub async fn add(&self, text: &str, author: &str) -> Address {
        self.provider
            .insert(&self.collection(), NewMessage::new(text, author))
            .await
            .expect("insert")
    }

    /// Record every change published under the collection.
    pub fn observe(&self, include_descendants: bool) -> RecordingObserver {
        RecordingObserver::attach(self.provider.notifier(), self.collection(), include_descendants)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscribes to an address and records what it was told.
pub struct RecordingObserver {
    seen: Arc<Mutex<Vec<Address>>>,
    subscription: Subscription,
}

impl RecordingObserver {
    pub fn attach(
        notifier: &Arc<ChangeNotifier>,
        address: Address,
        include_descendants: bool,
    ) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = notifier.subscribe(address, include_descendants, move |changed| {
            sink.lock().expect("observer lock").push(changed.clone());
        });
        Self { seen, subscription }
    }

    /// Number of callbacks received.
    pub fn count(&self) -> usize {
        self.seen.lock().expect("observer lock").len()
    }

    /// Every address received, in order.
    pub fn addresses(&self) -> Vec<Address> {
        self.seen.lock().expect("observer lock").clone()
    }

    pub fn cancel(self) -> bool {
        self.subscription.cancel()
    }
}

/// Wait until the watched list state satisfies `done`, for at most five
/// seconds. Returns the matching state.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<ListState>,
    done: impl Fn(&ListState) -> bool,
) -> ListState {
    let wait = async {
        loop {
            {
                let state = rx.borrow_and_update();
                if done(&state) {
                    return state.clone();
                }
            }
            rx.changed().await.expect("list state sender dropped");
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for list state")
}
