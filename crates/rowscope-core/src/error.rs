//! Error types for the reactive graph.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::runtime::NodeId;
use crate::subscription::SubscriptionId;

/// Boxed error returned by fallible subscriber callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for reactive graph operations.
#[derive(Error, Debug, Clone)]
pub enum ReactiveError {
    /// A subscription was attempted on a disposed [`Computed`](crate::Computed).
    #[error("computed value has been disposed")]
    Disposed,

    /// One or more subscriber callbacks returned an error while a write was
    /// being delivered.
    #[error("{} subscriber(s) failed during notification", failures.len())]
    SubscriberFailure {
        /// Every recorded failure, in delivery order.
        failures: Vec<SubscriberFailure>,
    },

    /// A single write caused more node deliveries than the runtime allows.
    ///
    /// This almost always means two subscribers keep writing each other's
    /// sources with values that never settle.
    #[error("propagation exceeded {limit} steps; pending work was discarded")]
    FlushLimitExceeded {
        /// The configured step limit.
        limit: usize,
    },
}

impl ReactiveError {
    /// Returns the subscriber failures carried by this error, if any.
    pub fn failures(&self) -> &[SubscriberFailure] {
        match self {
            Self::SubscriberFailure { failures } => failures,
            _ => &[],
        }
    }
}

/// A subscriber callback that returned an error.
#[derive(Clone)]
pub struct SubscriberFailure {
    /// The node whose value was being delivered.
    pub node: NodeId,
    /// The registration that failed.
    pub subscription: SubscriptionId,
    /// The error returned by the callback.
    pub error: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl SubscriberFailure {
    pub(crate) fn new(node: NodeId, subscription: SubscriptionId, error: BoxError) -> Self {
        Self {
            node,
            subscription,
            error: Arc::from(error),
        }
    }

    /// The failure message.
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl fmt::Debug for SubscriberFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberFailure")
            .field("node", &self.node)
            .field("subscription", &self.subscription)
            .field("error", &self.message())
            .finish()
    }
}

impl fmt::Display for SubscriberFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subscriber {:?} on node {:?} failed: {}",
            self.subscription, self.node, self.error
        )
    }
}

/// A specialized Result type for reactive graph operations.
pub type Result<T> = std::result::Result<T, ReactiveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn failure(msg: &str) -> SubscriberFailure {
        SubscriberFailure::new(
            NodeId::from(KeyData::from_ffi(1)),
            SubscriptionId::from(KeyData::from_ffi(2)),
            msg.into(),
        )
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ReactiveError::Disposed.to_string(),
            "computed value has been disposed"
        );

        let err = ReactiveError::SubscriberFailure {
            failures: vec![failure("a"), failure("b")],
        };
        assert_eq!(err.to_string(), "2 subscriber(s) failed during notification");

        let err = ReactiveError::FlushLimitExceeded { limit: 10 };
        assert!(err.to_string().contains("10 steps"));
    }

    #[test]
    fn test_failures_accessor() {
        let err = ReactiveError::SubscriberFailure {
            failures: vec![failure("boom")],
        };
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].message(), "boom");
        assert!(ReactiveError::Disposed.failures().is_empty());
    }
}
