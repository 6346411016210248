//! Equality predicates deciding whether a write is a change.
//!
//! [`Signal::new`](crate::Signal::new) and [`Computed::new`](crate::Computed::new)
//! compare with `PartialEq`. For shared compound values, [`by_ptr`] gives
//! reference semantics: two structurally identical but separately allocated
//! values are *not* equal, and mutating a value in place then writing the same
//! `Arc` back does not notify.

use std::sync::Arc;

/// A shared equality predicate.
pub type EqualsFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync + 'static>;

/// Compare with `PartialEq`.
pub fn by_value<T: PartialEq + 'static>() -> EqualsFn<T> {
    Arc::new(|a: &T, b: &T| a == b)
}

/// Compare `Arc`s by allocation identity.
pub fn by_ptr<T: ?Sized + 'static>() -> EqualsFn<Arc<T>> {
    Arc::new(|a: &Arc<T>, b: &Arc<T>| Arc::ptr_eq(a, b))
}

/// Never equal: every write and every recompute notifies.
pub fn never<T: 'static>() -> EqualsFn<T> {
    Arc::new(|_: &T, _: &T| false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_value() {
        let eq = by_value::<Vec<i32>>();
        assert!(eq(&vec![1, 2], &vec![1, 2]));
        assert!(!eq(&vec![1, 2], &vec![2, 1]));
    }

    #[test]
    fn test_by_ptr_distinguishes_allocations() {
        let eq = by_ptr::<Vec<i32>>();
        let a = Arc::new(vec![1, 2, 3]);
        let b = Arc::new(vec![1, 2, 3]);
        assert!(eq(&a, &a.clone()));
        assert!(!eq(&a, &b));
    }

    #[test]
    fn test_never() {
        let eq = never::<u8>();
        assert!(!eq(&1, &1));
    }
}
