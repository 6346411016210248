//! Subscription tokens and registration tables.
//!
//! Every [`Signal`](crate::Signal) and [`Computed`](crate::Computed) keeps its
//! subscribers in a registration table. Subscribing returns a [`Subscription`]
//! token naming exactly one registration; registering the same closure twice
//! yields two independent tokens.
//!
//! Tokens do not unsubscribe on drop. Use [`Subscription::guard`] for RAII
//! teardown, or collect tokens in a [`SubscriptionSet`] to tear many down at
//! once.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::error::BoxError;
use crate::runtime::Delivery;

new_key_type! {
    /// Identifies one registration in a subscriber table.
    pub struct SubscriptionId;
}

pub(crate) type Callback<T> =
    Arc<dyn Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static>;

struct Table<T> {
    entries: SlotMap<SubscriptionId, Callback<T>>,
    /// Registration order; slot indices are reused, so slot order is not it.
    order: Vec<SubscriptionId>,
}

/// Type-erased removal interface held weakly by [`Subscription`].
trait Registrations: Send + Sync {
    fn remove(&self, id: SubscriptionId) -> bool;
    fn contains(&self, id: SubscriptionId) -> bool;
}

impl<T: 'static> Registrations for Mutex<Table<T>> {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut table = self.lock();
        if table.entries.remove(id).is_some() {
            table.order.retain(|entry| *entry != id);
            true
        } else {
            false
        }
    }

    fn contains(&self, id: SubscriptionId) -> bool {
        self.lock().entries.contains_key(id)
    }
}

/// The subscriber list of one node.
pub(crate) struct Subscribers<T> {
    table: Arc<Mutex<Table<T>>>,
}

impl<T: Send + Sync + 'static> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                entries: SlotMap::with_key(),
                order: Vec::new(),
            })),
        }
    }

    pub(crate) fn insert(&self, callback: Callback<T>) -> Subscription {
        let id = {
            let mut table = self.table.lock();
            let id = table.entries.insert(callback);
            table.order.push(id);
            id
        };
        let table: Arc<dyn Registrations> = self.table.clone();
        Subscription {
            id,
            table: Arc::downgrade(&table),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub(crate) fn clear(&self) {
        let mut table = self.table.lock();
        table.entries.clear();
        table.order.clear();
    }

    /// Invoke every subscriber in registration order.
    ///
    /// The list is snapshotted first, so callbacks may subscribe or
    /// unsubscribe freely. A registration removed by an earlier callback in
    /// the same delivery is skipped; one added during delivery waits for the
    /// next change.
    pub(crate) fn deliver(&self, value: &T, delivery: &mut Delivery) {
        let snapshot: Vec<(SubscriptionId, Callback<T>)> = {
            let table = self.table.lock();
            table
                .order
                .iter()
                .filter_map(|id| table.entries.get(*id).map(|cb| (*id, cb.clone())))
                .collect()
        };

        for (id, callback) in snapshot {
            if !self.table.lock().entries.contains_key(id) {
                continue;
            }
            if let Err(err) = callback(value) {
                delivery.record(id, err);
                if delivery.should_stop() {
                    break;
                }
            }
        }
    }
}

/// A token naming one subscriber registration.
///
/// Calling [`unsubscribe`](Self::unsubscribe) more than once is a no-op, as is
/// unsubscribing after the owning cell has been dropped or disposed.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    table: Weak<dyn Registrations>,
}

impl Subscription {
    /// The registration id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove this registration.
    ///
    /// Returns `true` if the registration was still present.
    pub fn unsubscribe(&self) -> bool {
        self.table
            .upgrade()
            .is_some_and(|table| table.remove(self.id))
    }

    /// Whether the registration is still present.
    pub fn is_active(&self) -> bool {
        self.table
            .upgrade()
            .is_some_and(|table| table.contains(self.id))
    }

    /// Convert into a guard that unsubscribes when dropped.
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard { inner: Some(self) }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Unsubscribes its registration when dropped.
#[derive(Debug)]
pub struct SubscriptionGuard {
    inner: Option<Subscription>,
}

impl SubscriptionGuard {
    /// Give up the guard without unsubscribing.
    pub fn release(mut self) -> Subscription {
        self.inner
            .take()
            .expect("guard holds its subscription until released or dropped")
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.inner.take() {
            subscription.unsubscribe();
        }
    }
}

/// A collection of subscriptions torn down together.
///
/// Everything still held is unsubscribed when the set is dropped.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription to the set.
    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Number of tokens held (active or not).
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the set holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Unsubscribe everything, returning how many registrations were still
    /// active.
    pub fn unsubscribe_all(&mut self) -> usize {
        self.subscriptions
            .drain(..)
            .filter(|subscription| subscription.unsubscribe())
            .count()
    }
}

impl Extend<Subscription> for SubscriptionSet {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}

impl FromIterator<Subscription> for SubscriptionSet {
    fn from_iter<I: IntoIterator<Item = Subscription>>(iter: I) -> Self {
        Self {
            subscriptions: iter.into_iter().collect(),
        }
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}
