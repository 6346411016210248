//! Observable mutable cells.
//!
//! A [`Signal<T>`] holds a value, a registration table of subscribers, and an
//! equality predicate. Writing a value that the predicate considers equal to
//! the current one stores it but notifies nobody; any other write notifies
//! every subscriber, in registration order, before [`Signal::set`] returns.
//!
//! # Example
//!
//! ```
//! use rowscope_core::{Runtime, Signal};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let rt = Runtime::new();
//! let total_rows = Signal::new(&rt, 0_usize);
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let seen_clone = seen.clone();
//! let sub = total_rows.subscribe(move |rows| seen_clone.store(*rows, Ordering::SeqCst));
//!
//! total_rows.set(1_000).unwrap();
//! assert_eq!(seen.load(Ordering::SeqCst), 1_000);
//!
//! sub.unsubscribe();
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::equality::{self, EqualsFn};
use crate::error::{BoxError, Result};
use crate::runtime::{Delivery, NodeId, NodeKind, ReactiveNode, Runtime};
use crate::subscription::{Subscribers, Subscription};

/// Anything a [`Computed`](crate::Computed) can depend on.
pub trait Source {
    /// The node id in the owning runtime.
    fn node_id(&self) -> NodeId;

    /// The owning runtime.
    fn runtime(&self) -> &Runtime;
}

struct SignalInner<T> {
    node: NodeId,
    value: Mutex<T>,
    equals: EqualsFn<T>,
    subscribers: Subscribers<T>,
    runtime: Runtime,
}

impl<T: Clone + Send + Sync + 'static> ReactiveNode for SignalInner<T> {
    fn process(&self, delivery: &mut Delivery) -> bool {
        let value = self.value.lock().clone();
        self.subscribers.deliver(&value, delivery);
        true
    }
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        self.runtime.unregister(self.node);
    }
}

/// A mutable observable cell with change-gated notification.
///
/// Cloning a `Signal` creates another handle to the same cell.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Signal<T> {
    /// Create a signal compared with `PartialEq`.
    ///
    /// Compound values compare structurally: setting a `Signal<Vec<_>>` to a
    /// fresh but equal vector does not notify. For identity semantics, hold
    /// the value in an `Arc` and use [`Signal::with_equality`] with
    /// [`equality::by_ptr`], so every newly allocated value counts as a change.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self::with_equality(runtime, value, equality::by_value())
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Create a signal with a custom equality predicate.
    ///
    /// See the [`equality`](crate::equality) module for ready-made predicates.
    pub fn with_equality(runtime: &Runtime, value: T, equals: EqualsFn<T>) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<SignalInner<T>>| {
            let node: Weak<dyn ReactiveNode> = weak.clone();
            SignalInner {
                node: runtime.register(node, NodeKind::Signal, &[]),
                value: Mutex::new(value),
                equals,
                subscribers: Subscribers::new(),
                runtime: runtime.clone(),
            }
        });
        Self { inner }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.lock().clone()
    }

    /// Access the value through a closure without cloning.
    ///
    /// The value is locked for the duration of `f`; writing this signal from
    /// inside `f` deadlocks.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.inner.value.lock())
    }

    /// Store a value, notifying subscribers if it changed.
    ///
    /// The value is always stored; the equality predicate only gates
    /// notification. Returns `Ok(true)` if the write was a change.
    ///
    /// Outside a batch and outside propagation, every subscriber and every
    /// downstream [`Computed`](crate::Computed) has observed the write when this
    /// returns. Inside a [`batch`](Runtime::batch), delivery waits for the
    /// outermost batch to close. From inside a subscriber, delivery is
    /// performed by the propagation already in progress.
    ///
    /// # Errors
    ///
    /// Returns [`ReactiveError::SubscriberFailure`](crate::ReactiveError::SubscriberFailure)
    /// if any subscriber reached by this write returned an error, or
    /// [`ReactiveError::FlushLimitExceeded`](crate::ReactiveError::FlushLimitExceeded)
    /// if propagation did not settle. The value stays stored either way.
    pub fn set(&self, value: T) -> Result<bool> {
        let changed = {
            let mut current = self.inner.value.lock();
            let changed = !(self.inner.equals)(&current, &value);
            *current = value;
            changed
        };

        if !changed {
            tracing::trace!(target: "rowscope_core::signal", node = ?self.inner.node, "write unchanged, not notifying");
            return Ok(false);
        }

        tracing::trace!(target: "rowscope_core::signal", node = ?self.inner.node, "signal changed");
        self.inner.runtime.notify_changed(self.inner.node)?;
        Ok(true)
    }

    /// Replace the value with `f(current)`.
    pub fn update<F>(&self, f: F) -> Result<bool>
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.with(f);
        self.set(next)
    }

    /// Register an infallible subscriber.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.subscribers.insert(Arc::new(move |value: &T| {
            callback(value);
            Ok(())
        }))
    }

    /// Register a subscriber that may fail.
    ///
    /// Failures are handled according to the runtime's
    /// [`FailurePolicy`](crate::FailurePolicy).
    pub fn try_subscribe<F, E>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.inner
            .subscribers
            .insert(Arc::new(move |value: &T| callback(value).map_err(Into::into)))
    }

    /// Number of callback registrations.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Number of computed values attached downstream of this signal.
    pub fn dependent_count(&self) -> usize {
        self.inner.runtime.dependent_count(self.inner.node)
    }

    /// Returns `true` if both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Signal<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Source for Signal<T> {
    fn node_id(&self) -> NodeId {
        self.inner.node
    }

    fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("node", &self.inner.node)
            .field("value", &*self.inner.value.lock())
            .finish()
    }
}

static_assertions::assert_impl_all!(Signal<usize>: Send, Sync, Clone);
