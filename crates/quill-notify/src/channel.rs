//! Channel-backed subscriptions.
//!
//! A [`ChangeStream`] is a subscription whose callback only forwards the
//! published address into an unbounded channel. The work a change triggers
//! then runs wherever the stream is polled, never on the publishing thread.

use std::sync::Arc;

use quill_core::Address;
use tokio::sync::mpsc;

use crate::notifier::{ChangeNotifier, Subscription, SubscriptionId};

/// Receiving end of a channel-backed subscription.
#[derive(Debug)]
pub struct ChangeStream {
    subscription: Subscription,
    receiver: mpsc::UnboundedReceiver<Address>,
}

impl ChangeNotifier {
    /// Subscribe through a channel instead of a callback.
    pub fn watch(self: &Arc<Self>, address: Address, include_descendants: bool) -> ChangeStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(address, include_descendants, move |changed| {
            // The receiver may already be gone; the registration is then just
            // waiting to be cancelled.
            let _ = tx.send(changed.clone());
        });
        ChangeStream {
            subscription,
            receiver: rx,
        }
    }
}

impl ChangeStream {
    /// Wait for the next change. Returns `None` once the subscription has
    /// been cancelled and every pending change was received.
    pub async fn recv(&mut self) -> Option<Address> {
        self.receiver.recv().await
    }

    /// Take a pending change without waiting.
    pub fn try_recv(&mut self) -> Option<Address> {
        self.receiver.try_recv().ok()
    }

    /// Discard every pending change. Returns how many were discarded.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.receiver.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }

    pub fn id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    /// Unsubscribe and drop the receiver.
    pub fn close(self) -> bool {
        self.subscription.cancel()
    }
}
