//! Propagation runtime for the reactive graph.
//!
//! A [`Runtime`] owns the registration table of every [`Signal`](crate::Signal)
//! and [`Computed`](crate::Computed) created against it, and the worklist used
//! to deliver changes. There is no global runtime: construct one and pass it to
//! every cell that should share a propagation order.
//!
//! # Propagation
//!
//! A write stores its value, then enqueues the written node. The worklist is
//! drained iteratively in `(rank, enqueue order)` order, where a node's rank is
//! one more than the highest rank among its dependencies. Because every
//! upstream node has a strictly lower rank, a `Computed` is recomputed only
//! after all of its upstream `Computed`s have settled for the same write.
//!
//! Writes issued from inside a subscriber (reentrant writes) do not recurse.
//! They store their value and join the worklist of the drain that is already
//! running, so the call stack does not grow with the length of a reactive
//! chain.
//!
//! # Threading
//!
//! Cells are `Send + Sync`, but the runtime is designed to be driven from one
//! thread at a time. A write from another thread while a drain is running is
//! stored and delivered by that drain, on the draining thread.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::error::{BoxError, ReactiveError, Result, SubscriberFailure};
use crate::subscription::SubscriptionId;

new_key_type! {
    /// Identifies a node (a signal or a computed value) in a [`Runtime`].
    pub struct NodeId;
}

/// The kind of a registered node, used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A writable [`Signal`](crate::Signal).
    Signal,
    /// A derived [`Computed`](crate::Computed).
    Computed,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("signal"),
            Self::Computed => f.write_str("computed"),
        }
    }
}

/// What happens when a subscriber callback returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure, keep delivering to every other subscriber, and
    /// report all failures once propagation has finished.
    #[default]
    Isolate,
    /// Stop delivering to the failing node's remaining subscribers. Other
    /// nodes are still delivered and every computed value still settles.
    FailFast,
}

/// Configuration for a [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How subscriber failures are handled.
    pub failure_policy: FailurePolicy,
    /// Maximum number of node deliveries for a single external write.
    pub max_flush_steps: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Isolate,
            max_flush_steps: 100_000,
        }
    }
}

impl RuntimeConfig {
    /// Set the subscriber failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the per-write delivery limit. A limit of zero is raised to one.
    pub fn with_max_flush_steps(mut self, steps: usize) -> Self {
        self.max_flush_steps = steps.max(1);
        self
    }
}

/// A node the runtime can deliver changes for.
pub(crate) trait ReactiveNode: Send + Sync {
    /// Deliver the node's pending change.
    ///
    /// Returns `true` when downstream nodes must be recomputed.
    fn process(&self, delivery: &mut Delivery) -> bool;
}

/// Per-node delivery context collecting subscriber failures.
pub(crate) struct Delivery {
    node: NodeId,
    policy: FailurePolicy,
    failures: Vec<SubscriberFailure>,
}

impl Delivery {
    fn new(node: NodeId, policy: FailurePolicy) -> Self {
        Self {
            node,
            policy,
            failures: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, subscription: SubscriptionId, error: BoxError) {
        let failure = SubscriberFailure::new(self.node, subscription, error);
        tracing::warn!(
            target: "rowscope_core::runtime",
            node = ?failure.node,
            subscription = ?failure.subscription,
            error = %failure.message(),
            "subscriber failed"
        );
        self.failures.push(failure);
    }

    /// Whether the node's remaining subscribers must be skipped.
    pub(crate) fn should_stop(&self) -> bool {
        self.policy == FailurePolicy::FailFast && !self.failures.is_empty()
    }
}

struct NodeEntry {
    node: Weak<dyn ReactiveNode>,
    kind: NodeKind,
    rank: u32,
    downstream: Vec<NodeId>,
}

#[derive(Default)]
struct Scheduler {
    nodes: SlotMap<NodeId, NodeEntry>,
    pending: BinaryHeap<Reverse<(u32, u64, NodeId)>>,
    queued: SecondaryMap<NodeId, ()>,
    sequence: u64,
    batch_depth: usize,
    flushing: bool,
}

impl Scheduler {
    fn enqueue(&mut self, id: NodeId) {
        let Some(entry) = self.nodes.get(id) else {
            return;
        };
        if self.queued.insert(id, ()).is_some() {
            return;
        }
        self.sequence += 1;
        self.pending.push(Reverse((entry.rank, self.sequence, id)));
    }

    fn enqueue_downstream(&mut self, id: NodeId) {
        let downstream = match self.nodes.get(id) {
            Some(entry) => entry.downstream.clone(),
            None => return,
        };
        for child in downstream {
            self.enqueue(child);
        }
    }

    /// Pop the next pending node. Dead nodes are pruned and yield `None` in
    /// the inner option.
    fn pop(&mut self) -> Option<(NodeId, Option<Arc<dyn ReactiveNode>>)> {
        let Reverse((_, _, id)) = self.pending.pop()?;
        self.queued.remove(id);
        let node = self.nodes.get(id).and_then(|entry| entry.node.upgrade());
        if node.is_none() {
            self.remove(id);
        }
        Some((id, node))
    }

    fn discard_pending(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        self.queued.clear();
        discarded
    }

    fn remove(&mut self, id: NodeId) {
        if self.nodes.remove(id).is_none() {
            return;
        }
        self.queued.remove(id);
        for (_, entry) in self.nodes.iter_mut() {
            entry.downstream.retain(|child| *child != id);
        }
    }
}

struct RuntimeInner {
    config: RuntimeConfig,
    state: Mutex<Scheduler>,
}

/// Owner of a reactive graph and its propagation order.
///
/// Cloning a `Runtime` creates another handle to the same graph.
///
/// # Example
///
/// ```
/// use rowscope_core::{Computed, Runtime, Signal};
///
/// let rt = Runtime::new();
/// let rows = Signal::new(&rt, 10_usize);
/// let pages = Computed::new(&rt, &[&rows], {
///     let rows = rows.clone();
///     move || rows.get().div_ceil(4)
/// });
///
/// assert_eq!(pages.get(), 3);
/// rows.set(17).unwrap();
/// assert_eq!(pages.get(), 5);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("nodes", &state.nodes.len())
            .field("pending", &state.pending.len())
            .field("batch_depth", &state.batch_depth)
            .field("flushing", &state.flushing)
            .finish()
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with a custom configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                state: Mutex::new(Scheduler::default()),
            }),
        }
    }

    /// The runtime's configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Returns `true` if both handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live nodes registered with this runtime.
    pub fn node_count(&self) -> usize {
        self.inner.state.lock().nodes.len()
    }

    /// Whether a batch scope is currently open.
    pub fn is_batching(&self) -> bool {
        self.inner.state.lock().batch_depth > 0
    }

    /// Whether the worklist is currently being drained.
    pub fn is_flushing(&self) -> bool {
        self.inner.state.lock().flushing
    }

    /// A snapshot of the registration table, ordered by rank.
    pub fn nodes(&self) -> Vec<NodeInfo> {
        let state = self.inner.state.lock();
        let mut nodes: Vec<NodeInfo> = state
            .nodes
            .iter()
            .map(|(id, entry)| NodeInfo {
                id,
                kind: entry.kind,
                rank: entry.rank,
                downstream: entry.downstream.clone(),
            })
            .collect();
        nodes.sort_by_key(|info| info.rank);
        nodes
    }

    pub(crate) fn register(
        &self,
        node: Weak<dyn ReactiveNode>,
        kind: NodeKind,
        dependencies: &[NodeId],
    ) -> NodeId {
        let mut state = self.inner.state.lock();
        let rank = dependencies
            .iter()
            .filter_map(|dep| state.nodes.get(*dep))
            .map(|entry| entry.rank + 1)
            .max()
            .unwrap_or(0);
        let id = state.nodes.insert(NodeEntry {
            node,
            kind,
            rank,
            downstream: Vec::new(),
        });
        for dep in dependencies {
            if let Some(entry) = state.nodes.get_mut(*dep) {
                entry.downstream.push(id);
            }
        }
        tracing::trace!(target: "rowscope_core::runtime", ?id, %kind, rank, "registered node");
        id
    }

    /// Remove a node and every edge pointing at it.
    pub(crate) fn unregister(&self, id: NodeId) {
        self.inner.state.lock().remove(id);
        tracing::trace!(target: "rowscope_core::runtime", ?id, "unregistered node");
    }

    pub(crate) fn dependent_count(&self, id: NodeId) -> usize {
        self.inner
            .state
            .lock()
            .nodes
            .get(id)
            .map_or(0, |entry| entry.downstream.len())
    }

    /// Schedule delivery of a changed node.
    ///
    /// Delivers immediately unless a batch is open or a drain is already
    /// running, in which case the node joins the pending worklist.
    pub(crate) fn notify_changed(&self, id: NodeId) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            state.enqueue(id);
            if state.batch_depth > 0 || state.flushing {
                return Ok(());
            }
            state.flushing = true;
        }
        self.drain()
    }

    pub(crate) fn enter_batch(&self) {
        self.inner.state.lock().batch_depth += 1;
    }

    /// Close a batch scope, draining if it was the outermost one.
    pub(crate) fn exit_batch(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            state.batch_depth = state.batch_depth.saturating_sub(1);
            if state.batch_depth > 0 || state.flushing || state.pending.is_empty() {
                return Ok(());
            }
            state.flushing = true;
        }
        self.drain()
    }

    /// Deliver pending nodes until the worklist is empty.
    ///
    /// A failing or panicking subscriber never leaves work behind: the
    /// remaining nodes are still processed, so every computed value is
    /// settled when this returns. A panic is resumed once the worklist is
    /// empty. Only the step limit discards pending work.
    #[tracing::instrument(skip_all, target = "rowscope_core::runtime", level = "trace")]
    fn drain(&self) -> Result<()> {
        let _flushing = FlushingReset(self);
        let policy = self.inner.config.failure_policy;
        let limit = self.inner.config.max_flush_steps;
        let mut failures = Vec::new();
        let mut panicked = None;
        let mut steps = 0usize;

        loop {
            let next = self.inner.state.lock().pop();
            let Some((id, node)) = next else {
                break;
            };
            let Some(node) = node else {
                continue;
            };

            steps += 1;
            if steps > limit {
                let discarded = self.inner.state.lock().discard_pending();
                tracing::warn!(
                    target: "rowscope_core::runtime",
                    limit,
                    discarded,
                    "propagation step limit exceeded"
                );
                if let Some(payload) = panicked {
                    panic::resume_unwind(payload);
                }
                return Err(ReactiveError::FlushLimitExceeded { limit });
            }

            let mut delivery = Delivery::new(id, policy);
            let changed = match panic::catch_unwind(AssertUnwindSafe(|| node.process(&mut delivery))) {
                Ok(changed) => changed,
                Err(payload) => {
                    tracing::warn!(
                        target: "rowscope_core::runtime",
                        ?id,
                        "subscriber panicked; settling the graph before resuming"
                    );
                    panicked.get_or_insert(payload);
                    // The stored value may have changed before the panic.
                    true
                }
            };
            drop(node);
            failures.append(&mut delivery.failures);

            if changed {
                self.inner.state.lock().enqueue_downstream(id);
            }
        }

        tracing::trace!(target: "rowscope_core::runtime", steps, "drain complete");
        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ReactiveError::SubscriberFailure { failures })
        }
    }
}

/// Clears the flushing flag when a drain ends, including by unwinding.
struct FlushingReset<'a>(&'a Runtime);

impl Drop for FlushingReset<'_> {
    fn drop(&mut self) {
        self.0.inner.state.lock().flushing = false;
    }
}

/// Diagnostic snapshot of one registered node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// The node's id.
    pub id: NodeId,
    /// Whether the node is a signal or a computed value.
    pub kind: NodeKind,
    /// Propagation rank; dependencies always have a lower rank.
    pub rank: u32,
    /// Computed values that depend on this node.
    pub downstream: Vec<NodeId>,
}

static_assertions::assert_impl_all!(Runtime: Send, Sync, Clone);
