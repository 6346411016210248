//! Derived, memoized cells.
//!
//! A [`Computed<T>`] caches the result of a compute function over an explicit,
//! fixed list of dependencies. It is recomputed eagerly: whenever a
//! dependency changes, the runtime reruns the function during propagation,
//! never lazily on [`get`](Computed::get).
//!
//! # Invariants
//!
//! 1. The cached value is always the result of the last recompute.
//! 2. Subscribers are notified only when a recompute produces a value the
//!    equality predicate considers different from the cached one.
//! 3. A recompute observes every upstream `Computed` already settled for the
//!    write that triggered it.
//! 4. A `Computed` with no dependencies is computed once and never again.
//!
//! Disposing a `Computed` detaches it from its dependencies and clears its
//! subscribers. The cached value remains readable.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::equality::{self, EqualsFn};
use crate::error::{BoxError, ReactiveError, Result};
use crate::runtime::{Delivery, NodeId, NodeKind, ReactiveNode, Runtime};
use crate::signal::Source;
use crate::subscription::{Subscribers, Subscription};

struct ComputedInner<T> {
    node: NodeId,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: Mutex<T>,
    equals: EqualsFn<T>,
    subscribers: Subscribers<T>,
    dependency_count: usize,
    disposed: AtomicBool,
    runtime: Runtime,
}

impl<T: Clone + Send + Sync + 'static> ReactiveNode for ComputedInner<T> {
    fn process(&self, delivery: &mut Delivery) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }

        let next = (self.compute)();
        {
            let mut cached = self.value.lock();
            if (self.equals)(&cached, &next) {
                tracing::trace!(target: "rowscope_core::computed", node = ?self.node, "recomputed, unchanged");
                return false;
            }
            *cached = next.clone();
        }

        tracing::trace!(target: "rowscope_core::computed", node = ?self.node, "recomputed, changed");
        self.subscribers.deliver(&next, delivery);
        true
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::Acquire) {
            self.runtime.unregister(self.node);
        }
    }
}

/// A derived, memoized cell recomputed eagerly from explicit dependencies.
///
/// Cloning a `Computed` creates another handle to the same cell.
///
/// # Example
///
/// ```
/// use rowscope_core::{Computed, Runtime, Signal};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 5);
/// let doubled = Computed::new(&rt, &[&count], {
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 10);
///
/// count.set(10).unwrap();
/// assert_eq!(doubled.get(), 20);
///
/// doubled.dispose();
/// count.set(30).unwrap();
/// assert_eq!(doubled.get(), 20);
/// ```
pub struct Computed<T> {
    inner: Arc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Computed<T> {
    /// Create a computed value compared with `PartialEq`.
    ///
    /// `compute` runs once immediately to populate the cache. It should read
    /// only the listed dependencies; reads of anything else are not tracked.
    ///
    /// # Panics
    ///
    /// Panics if a dependency belongs to a different [`Runtime`].
    pub fn new<F>(runtime: &Runtime, dependencies: &[&dyn Source], compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_equality(runtime, dependencies, equality::by_value(), compute)
    }
}

impl<T: Clone + Send + Sync + 'static> Computed<T> {
    /// Create a computed value with a custom equality predicate.
    ///
    /// # Panics
    ///
    /// Panics if a dependency belongs to a different [`Runtime`].
    pub fn with_equality<F>(
        runtime: &Runtime,
        dependencies: &[&dyn Source],
        equals: EqualsFn<T>,
        compute: F,
    ) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        assert!(
            dependencies
                .iter()
                .all(|dep| dep.runtime().ptr_eq(runtime)),
            "computed dependencies must belong to the same runtime"
        );

        let dependency_ids: Vec<NodeId> = dependencies.iter().map(|dep| dep.node_id()).collect();
        let initial = compute();

        let inner = Arc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let node: Weak<dyn ReactiveNode> = weak.clone();
            ComputedInner {
                node: runtime.register(node, NodeKind::Computed, &dependency_ids),
                compute: Box::new(compute),
                value: Mutex::new(initial),
                equals,
                subscribers: Subscribers::new(),
                dependency_count: dependency_ids.len(),
                disposed: AtomicBool::new(false),
                runtime: runtime.clone(),
            }
        });
        Self { inner }
    }

    /// Get a clone of the cached value.
    ///
    /// Never recomputes; after [`dispose`](Self::dispose) this keeps
    /// returning the last cached value.
    pub fn get(&self) -> T {
        self.inner.value.lock().clone()
    }

    /// Access the cached value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.inner.value.lock())
    }

    /// Register an infallible subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`ReactiveError::Disposed`] if this value has been disposed.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.ensure_live()?;
        Ok(self.inner.subscribers.insert(Arc::new(move |value: &T| {
            callback(value);
            Ok(())
        })))
    }

    /// Register a subscriber that may fail.
    ///
    /// # Errors
    ///
    /// Returns [`ReactiveError::Disposed`] if this value has been disposed.
    pub fn try_subscribe<F, E>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&T) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.ensure_live()?;
        Ok(self
            .inner
            .subscribers
            .insert(Arc::new(move |value: &T| callback(value).map_err(Into::into))))
    }

    /// Number of callback registrations.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Number of dependencies this value was created with.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependency_count
    }

    /// Number of computed values attached downstream of this one.
    pub fn dependent_count(&self) -> usize {
        self.inner.runtime.dependent_count(self.inner.node)
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Permanently detach from dependencies and drop all subscribers.
    ///
    /// Idempotent. Downstream values that depend on this one stop receiving
    /// updates from it.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.runtime.unregister(self.inner.node);
        self.inner.subscribers.clear();
        tracing::debug!(target: "rowscope_core::computed", node = ?self.inner.node, "disposed computed");
    }

    /// Returns `true` if both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Computed<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            Err(ReactiveError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl<T> Source for Computed<T> {
    fn node_id(&self) -> NodeId {
        self.inner.node
    }

    fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("node", &self.inner.node)
            .field("value", &*self.inner.value.lock())
            .field("disposed", &self.inner.disposed.load(Ordering::Acquire))
            .finish()
    }
}

static_assertions::assert_impl_all!(Computed<usize>: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Signal;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_initial_compute_is_synchronous() {
        let rt = Runtime::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let source = Signal::new(&rt, 3);
        let source_clone = source.clone();

        let tripled = Computed::new(&rt, &[&source], move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            source_clone.get() * 3
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(tripled.get(), 9);
        // Reads never recompute.
        let _ = tripled.get();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recomputes_eagerly_on_change() {
        let rt = Runtime::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let source = Signal::new(&rt, 1);
        let source_clone = source.clone();

        let _plus_one = Computed::new(&rt, &[&source], move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            source_clone.get() + 1
        });

        source.set(2).unwrap();
        // Recomputed without anybody calling get().
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unchanged_result_suppresses_notification() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 4);
        let source_clone = source.clone();
        let is_even = Computed::new(&rt, &[&source], move || source_clone.get() % 2 == 0);

        let notified = Arc::new(AtomicUsize::new(0));
        let notified_clone = notified.clone();
        let _sub = is_even
            .subscribe(move |_| {
                notified_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        source.set(6).unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        source.set(7).unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert!(!is_even.get());
    }

    #[test]
    fn test_multiple_dependencies() {
        let rt = Runtime::new();
        let width = Signal::new(&rt, 10);
        let height = Signal::new(&rt, 20);
        let area = Computed::new(&rt, &[&width, &height], {
            let (w, h) = (width.clone(), height.clone());
            move || w.get() * h.get()
        });

        assert_eq!(area.get(), 200);
        width.set(5).unwrap();
        assert_eq!(area.get(), 100);
        height.set(30).unwrap();
        assert_eq!(area.get(), 150);
        assert_eq!(area.dependency_count(), 2);
    }

    #[test]
    fn test_chain_propagates_fully() {
        let rt = Runtime::new();
        let s = Signal::new(&rt, 1);
        let c1 = Computed::new(&rt, &[&s], {
            let s = s.clone();
            move || s.get() + 1
        });
        let c2 = Computed::new(&rt, &[&c1], {
            let c1 = c1.clone();
            move || c1.get() * 10
        });
        let c3 = Computed::new(&rt, &[&c2], {
            let c2 = c2.clone();
            move || c2.get() - 3
        });

        assert_eq!(c3.get(), 17);
        s.set(4).unwrap();
        assert_eq!(c1.get(), 5);
        assert_eq!(c2.get(), 50);
        assert_eq!(c3.get(), 47);
    }

    #[test]
    fn test_diamond_recomputes_once_with_settled_inputs() {
        // a -> b, a -> c, (b, c) -> d
        let rt = Runtime::new();
        let a = Signal::new(&rt, 10);
        let b = Computed::new(&rt, &[&a], {
            let a = a.clone();
            move || a.get() + 1
        });
        let c = Computed::new(&rt, &[&a], {
            let a = a.clone();
            move || a.get() * 2
        });

        let d_runs = Arc::new(Mutex::new(Vec::new()));
        let d = Computed::new(&rt, &[&b, &c], {
            let (b, c, runs) = (b.clone(), c.clone(), d_runs.clone());
            move || {
                let sum = b.get() + c.get();
                runs.lock().push(sum);
                sum
            }
        });

        assert_eq!(d.get(), 31);
        a.set(5).unwrap();
        assert_eq!(d.get(), 16);
        // Initial compute plus exactly one recompute that saw both inputs.
        assert_eq!(*d_runs.lock(), vec![31, 16]);
    }

    #[test]
    fn test_zero_dependency_computed_is_frozen() {
        let rt = Runtime::new();
        let external = Signal::new(&rt, 1);
        let external_clone = external.clone();
        let frozen = Computed::new(&rt, &[], move || external_clone.get());

        external.set(99).unwrap();
        assert_eq!(frozen.get(), 1);
        assert_eq!(frozen.dependency_count(), 0);
    }

    #[test]
    fn test_dispose_detaches_and_is_idempotent() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 5);
        let doubled = Computed::new(&rt, &[&source], {
            let source = source.clone();
            move || source.get() * 2
        });
        let _sub = doubled.subscribe(|_| {}).unwrap();
        assert_eq!(source.dependent_count(), 1);

        source.set(10).unwrap();
        assert_eq!(doubled.get(), 20);

        for _ in 0..3 {
            doubled.dispose();
            assert!(doubled.is_disposed());
            assert_eq!(doubled.subscriber_count(), 0);
        }
        assert_eq!(source.dependent_count(), 0);

        source.set(30).unwrap();
        assert_eq!(doubled.get(), 20);

        assert!(matches!(
            doubled.subscribe(|_| {}),
            Err(ReactiveError::Disposed)
        ));
        assert!(matches!(
            doubled.try_subscribe(|_: &i32| Ok::<(), BoxError>(())),
            Err(ReactiveError::Disposed)
        ));
    }

    #[test]
    fn test_dispose_freezes_downstream() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 1);
        let mid = Computed::new(&rt, &[&source], {
            let source = source.clone();
            move || source.get() + 1
        });
        let tail = Computed::new(&rt, &[&mid], {
            let mid = mid.clone();
            move || mid.get() * 2
        });

        mid.dispose();
        source.set(50).unwrap();
        assert_eq!(mid.get(), 2);
        assert_eq!(tail.get(), 4);
    }

    #[test]
    fn test_computed_subscriber_sees_new_value() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, "a".to_string());
        let upper = Computed::new(&rt, &[&source], {
            let source = source.clone();
            move || source.get().to_uppercase()
        });
        let seen = Arc::new(Mutex::new(String::new()));
        let seen_clone = seen.clone();
        let _sub = upper
            .subscribe(move |v| *seen_clone.lock() = v.clone())
            .unwrap();

        source.set("grid".to_string()).unwrap();
        assert_eq!(*seen.lock(), "GRID");
    }

    #[test]
    #[should_panic(expected = "same runtime")]
    fn test_foreign_runtime_dependency_panics() {
        let rt = Runtime::new();
        let other = Runtime::new();
        let source = Signal::new(&other, 1);
        let _ = Computed::new(&rt, &[&source], || 0);
    }
}
