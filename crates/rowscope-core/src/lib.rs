//! Reactive value-propagation graph for Rowscope.
//!
//! This crate provides the state substrate every table control reads from and
//! writes to:
//!
//! - **Signal**: a mutable observable cell with change-gated notification
//! - **Computed**: a derived, memoized cell recomputed eagerly from explicit
//!   dependencies
//! - **Batch**: a write-grouping scope that delivers each change once
//! - **Runtime**: the explicitly constructed owner of a graph and its
//!   propagation order
//! - **Subscription**: explicit tokens for registrations, with RAII and bulk
//!   teardown helpers
//!
//! Propagation is synchronous and iterative: a write returns only after every
//! reachable subscriber and computed value has observed it, and reentrant
//! writes from subscribers join the running propagation instead of recursing.
//!
//! # Example
//!
//! ```
//! use rowscope_core::{Computed, Runtime, Signal};
//!
//! let rt = Runtime::new();
//! let count = Signal::new(&rt, 5);
//! let doubled = Computed::new(&rt, &[&count], {
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! let sub = doubled
//!     .subscribe(|value| println!("doubled is now {value}"))
//!     .unwrap();
//!
//! count.set(10).unwrap();
//! assert_eq!(doubled.get(), 20);
//!
//! sub.unsubscribe();
//! ```
//!
//! # Subscriber failures
//!
//! Subscribers registered with `try_subscribe` may return errors. By default
//! ([`FailurePolicy::Isolate`]) a failure does not stop delivery to other
//! subscribers; the write that triggered it returns
//! [`ReactiveError::SubscriberFailure`] listing every failure once propagation
//! has finished. [`FailurePolicy::FailFast`] skips only the failing node's
//! remaining subscribers. A panicking subscriber is resumed after the graph
//! has settled, so derived values never go stale.

mod batch;
mod computed;
pub mod equality;
mod error;
pub mod logging;
mod runtime;
mod signal;
mod subscription;

pub use computed::Computed;
pub use equality::EqualsFn;
pub use error::{BoxError, ReactiveError, Result, SubscriberFailure};
pub use runtime::{FailurePolicy, NodeId, NodeInfo, NodeKind, Runtime, RuntimeConfig};
pub use signal::{Signal, Source};
pub use subscription::{Subscription, SubscriptionGuard, SubscriptionId, SubscriptionSet};
