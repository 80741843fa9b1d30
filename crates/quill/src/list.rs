//! The live message list.
//!
//! A [`MessageList`] keeps the latest full read of the collection. It
//! subscribes to the collection address (descendants included), and a
//! background task re-reads the collection whenever a change is published.
//! Observers receive every new state through a `watch` channel.
//!
//! ```text
//! write ─► publish ─► callback ─► mpsc ─► worker ─► query ─► watch ─► observers
//! ```
//!
//! The notifier callback only forwards a signal, so the re-read never runs
//! on the writer's thread. Signals that pile up while a re-read is running
//! are coalesced into one.

use std::sync::Arc;

use quill_core::{Filter, Message, SortOrder};
use quill_notify::SubscriptionId;
use quill_store::Store;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::provider::Provider;

/// What the list currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListState {
    /// The first read has not finished.
    Loading,
    /// The result of the latest successful read.
    Ready(Arc<[Message]>),
    /// The latest read failed. `stale` keeps the last good rows.
    Failed {
        reason: String,
        stale: Arc<[Message]>,
    },
}

impl ListState {
    /// The rows to show: fresh, stale, or none while loading.
    pub fn messages(&self) -> &[Message] {
        match self {
            ListState::Loading => &[],
            ListState::Ready(rows) => rows,
            ListState::Failed { stale, .. } => stale,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ListState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ListState::Failed { .. })
    }

    fn rows(&self) -> Arc<[Message]> {
        match self {
            ListState::Loading => Arc::from(Vec::new()),
            ListState::Ready(rows) => Arc::clone(rows),
            ListState::Failed { stale, .. } => Arc::clone(stale),
        }
    }
}

/// State shared between the list handle and its worker.
struct Shared<S: Store> {
    provider: Arc<Provider<S>>,
    filter: Filter,
    sort: Option<SortOrder>,
    state: watch::Sender<ListState>,
    /// Held across query and publish so a slow read never overwrites a
    /// newer one.
    reload: Mutex<()>,
}

impl<S: Store> Shared<S> {
    async fn reload(&self) -> Result<usize> {
        let _guard = self.reload.lock().await;

        let collection = self.provider.collection_address();
        match self
            .provider
            .query(collection, self.filter.clone(), self.sort)
            .await
        {
            Ok(rows) => {
                let count = rows.len();
                self.state.send_replace(ListState::Ready(rows.into()));
                debug!(rows = count, "message list refreshed");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "message list refresh failed");
                let stale = self.state.borrow().rows();
                self.state.send_replace(ListState::Failed {
                    reason: e.to_string(),
                    stale,
                });
                Err(e)
            }
        }
    }
}

/// A self-refreshing view of the messages collection.
///
/// Call [`MessageList::teardown`] when done. Dropping the list without it
/// still unsubscribes and stops the worker, but logs a warning.
pub struct MessageList<S: Store + 'static> {
    shared: Arc<Shared<S>>,
    subscription: Option<SubscriptionId>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Store + 'static> MessageList<S> {
    /// Open a list over every message, in storage order.
    pub async fn open(provider: Arc<Provider<S>>) -> Self {
        Self::open_with(provider, Filter::all(), None).await
    }

    /// Open a list over the messages matching `filter`.
    ///
    /// The first read has finished when this returns; if it failed, the
    /// state is [`ListState::Failed`] and the next change retries.
    pub async fn open_with(
        provider: Arc<Provider<S>>,
        filter: Filter,
        sort: Option<SortOrder>,
    ) -> Self {
        let (state, _) = watch::channel(ListState::Loading);
        let mut changes = provider
            .notifier()
            .watch(provider.collection_address().clone(), true);
        let subscription = changes.id();

        let shared = Arc::new(Shared {
            provider,
            filter,
            sort,
            state,
            reload: Mutex::new(()),
        });
        let _ = shared.reload().await;

        let worker_shared = Arc::clone(&shared);
        let worker = tokio::spawn(async move {
            while changes.recv().await.is_some() {
                let coalesced = changes.drain();
                trace!(coalesced, "change signals received");
                // A failure is recorded in the state; keep listening.
                let _ = worker_shared.reload().await;
            }
            debug!("message list worker stopped");
        });

        debug!(%subscription, "message list opened");
        Self {
            shared,
            subscription: Some(subscription),
            worker: Some(worker),
        }
    }

    /// Re-read the collection now and replace the held rows.
    ///
    /// Returns the number of rows read. On failure the state becomes
    /// [`ListState::Failed`] and the error is returned as well.
    pub async fn refresh(&self) -> Result<usize> {
        self.shared.reload().await
    }

    /// The current state.
    pub fn snapshot(&self) -> ListState {
        self.shared.state.borrow().clone()
    }

    /// A receiver that sees every state replacement from now on.
    pub fn watch(&self) -> watch::Receiver<ListState> {
        self.shared.state.subscribe()
    }

    pub fn provider(&self) -> &Arc<Provider<S>> {
        &self.shared.provider
    }

    /// Unsubscribe and wait for the worker to finish.
    pub async fn teardown(mut self) {
        self.unsubscribe();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }

    fn unsubscribe(&mut self) -> bool {
        match self.subscription.take() {
            Some(id) => {
                self.shared.provider.notifier().unsubscribe(id);
                debug!(%id, "message list closed");
                true
            }
            None => false,
        }
    }
}

impl<S: Store + 'static> Drop for MessageList<S> {
    fn drop(&mut self) {
        if self.unsubscribe() {
            warn!("message list dropped without teardown");
        }
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
