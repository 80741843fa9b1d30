//! The change notifier: address-keyed fan-out of "something changed here".
//!
//! Writers call [`ChangeNotifier::publish`] after their write has committed.
//! Every subscription whose address matches runs its callback exactly once,
//! synchronously, on the publishing thread. Callbacks run with no lock held,
//! so a callback may subscribe, unsubscribe (itself included) or publish.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use quill_core::Address;
use tracing::{error, trace};

/// A change callback. Receives the published address.
pub type Callback = Arc<dyn Fn(&Address) + Send + Sync + 'static>;

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Entry {
    address: Address,
    include_descendants: bool,
    callback: Callback,
    /// Cleared by unsubscribe; checked right before each invocation.
    active: AtomicBool,
}

impl Entry {
    /// The first of `addresses` this entry cares about.
    fn first_match<'a>(&self, addresses: &'a [Address]) -> Option<&'a Address> {
        addresses
            .iter()
            .find(|a| a.notifies(&self.address, self.include_descendants))
    }
}

/// Publish/subscribe service keyed by [`Address`].
///
/// One instance is created by the composition root and shared by reference
/// (`Arc<ChangeNotifier>`) with the writers and readers that need it.
pub struct ChangeNotifier {
    entries: RwLock<BTreeMap<SubscriptionId, Arc<Entry>>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `callback` for publishes on `address`, and on any address
    /// below it when `include_descendants` is set.
    ///
    /// Dropping the returned [`Subscription`] does not unsubscribe; call
    /// [`Subscription::cancel`] or [`ChangeNotifier::unsubscribe`].
    pub fn subscribe<F>(
        self: &Arc<Self>,
        address: Address,
        include_descendants: bool,
        callback: F,
    ) -> Subscription
    where
        F: Fn(&Address) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(Entry {
            address,
            include_descendants,
            callback: Arc::new(callback),
            active: AtomicBool::new(true),
        });

        trace!(%id, address = %entry.address, include_descendants, "subscribed");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, entry);

        Subscription {
            id,
            notifier: Arc::downgrade(self),
        }
    }

    /// Remove a registration. Returns false if it was already gone.
    ///
    /// Once this returns, the callback will not run for any later publish.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        match removed {
            Some(entry) => {
                entry.active.store(false, Ordering::Release);
                trace!(%id, "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Notify subscribers of `address`. Returns how many callbacks ran.
    pub fn publish(&self, address: &Address) -> usize {
        self.publish_all(std::slice::from_ref(address))
    }

    /// Notify subscribers of several addresses in one round.
    ///
    /// Each subscription fires at most once per round, with the first of
    /// `addresses` that matches it, so list the most specific address first.
    pub fn publish_all(&self, addresses: &[Address]) -> usize {
        let matched: Vec<Arc<Entry>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.first_match(addresses).is_some())
            .cloned()
            .collect();

        let mut fired = 0;
        for entry in matched {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            let Some(address) = entry.first_match(addresses) else {
                continue;
            };
            let callback = Arc::clone(&entry.callback);
            if panic::catch_unwind(AssertUnwindSafe(|| callback(address))).is_err() {
                error!(%address, "change callback panicked");
            }
            fired += 1;
        }

        trace!(addresses = addresses.len(), fired, "published");
        fired
    }

    /// Number of live registrations.
    pub fn subscriber_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle for one registration.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    notifier: Weak<ChangeNotifier>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Unsubscribe. Returns false if the registration or the notifier was
    /// already gone.
    pub fn cancel(self) -> bool {
        self.notifier
            .upgrade()
            .map_or(false, |notifier| notifier.unsubscribe(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn counter() -> (Arc<AtomicU64>, impl Fn(&Address) + Send + Sync + 'static) {
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &Address| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_exact_and_descendant_matching() {
        let notifier = ChangeNotifier::new();
        let collection = addr("content://p/messages");
        let item = addr("content://p/messages/1");

        let (exact, cb) = counter();
        notifier.subscribe(collection.clone(), false, cb);
        let (deep, cb) = counter();
        notifier.subscribe(collection.clone(), true, cb);

        assert_eq!(notifier.publish(&item), 1);
        assert_eq!(exact.load(Ordering::SeqCst), 0);
        assert_eq!(deep.load(Ordering::SeqCst), 1);

        assert_eq!(notifier.publish(&collection), 2);
        assert_eq!(exact.load(Ordering::SeqCst), 1);
        assert_eq!(deep.load(Ordering::SeqCst), 2);

        assert_eq!(notifier.publish(&addr("content://p/authors")), 0);
    }

    #[test]
    fn test_publish_all_fires_once_per_subscriber() {
        let notifier = ChangeNotifier::new();
        let collection = addr("content://p/messages");
        let item = addr("content://p/messages/4");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        notifier.subscribe(collection.clone(), true, move |a| {
            s.lock().unwrap().push(a.to_string());
        });

        assert_eq!(notifier.publish_all(&[item.clone(), collection]), 1);
        assert_eq!(*seen.lock().unwrap(), vec![item.to_string()]);
    }

    #[test]
    fn test_unsubscribe_is_effective() {
        let notifier = ChangeNotifier::new();
        let collection = addr("content://p/messages");

        let (gone, cb) = counter();
        let sub = notifier.subscribe(collection.clone(), false, cb);
        let (kept, cb) = counter();
        notifier.subscribe(collection.clone(), false, cb);

        assert!(sub.cancel());
        notifier.publish(&collection);

        assert_eq!(gone.load(Ordering::SeqCst), 0);
        assert_eq!(kept.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 1);
    }

    #[test]
    fn test_unsubscribe_twice() {
        let notifier = ChangeNotifier::new();
        let sub = notifier.subscribe(addr("content://p/messages"), false, |_| {});
        let id = sub.id();
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        assert!(!sub.cancel());
    }

    #[test]
    fn test_unsubscribe_from_inside_callback() {
        let notifier = ChangeNotifier::new();
        let collection = addr("content://p/messages");

        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicU64::new(0));

        let weak = Arc::downgrade(&notifier);
        let (s, c) = (Arc::clone(&slot), Arc::clone(&count));
        let sub = notifier.subscribe(collection.clone(), false, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            let id = s.lock().unwrap().take();
            if let (Some(id), Some(notifier)) = (id, weak.upgrade()) {
                notifier.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(sub.id());

        notifier.publish(&collection);
        notifier.publish(&collection);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_later_subscriber_unsubscribed_mid_round_does_not_fire() {
        let notifier = ChangeNotifier::new();
        let collection = addr("content://p/messages");

        let victim_slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let weak = Arc::downgrade(&notifier);
        let slot = Arc::clone(&victim_slot);
        notifier.subscribe(collection.clone(), false, move |_| {
            if let (Some(id), Some(n)) = (*slot.lock().unwrap(), weak.upgrade()) {
                n.unsubscribe(id);
            }
        });

        let (victim, cb) = counter();
        let sub = notifier.subscribe(collection.clone(), false, cb);
        *victim_slot.lock().unwrap() = Some(sub.id());

        assert_eq!(notifier.publish(&collection), 1);
        assert_eq!(victim.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_callback_does_not_starve_others() {
        let notifier = ChangeNotifier::new();
        let collection = addr("content://p/messages");

        notifier.subscribe(collection.clone(), false, |_| panic!("boom"));
        let (count, cb) = counter();
        notifier.subscribe(collection.clone(), false, cb);

        assert_eq!(notifier.publish(&collection), 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    proptest::proptest! {
        #[test]
        fn test_publish_all_fires_each_subscriber_at_most_once(
            ids in proptest::collection::vec(1u32..6, 0..8),
            descendants in proptest::bool::ANY,
        ) {
            let notifier = ChangeNotifier::new();
            let collection = addr("content://p/messages");
            let (count, cb) = counter();
            notifier.subscribe(collection.clone(), descendants, cb);

            let mut addresses: Vec<Address> = ids.iter().map(|id| collection.join(id)).collect();
            addresses.push(collection.clone());

            proptest::prop_assert_eq!(notifier.publish_all(&addresses), 1);
            proptest::prop_assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_cancel_after_notifier_dropped() {
        let notifier = ChangeNotifier::new();
        let sub = notifier.subscribe(addr("content://p/messages"), false, |_| {});
        drop(notifier);
        assert!(!sub.cancel());
    }
}
