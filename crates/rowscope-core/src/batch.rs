//! Write-grouping scopes with coalesced notification.
//!
//! Inside [`Runtime::batch`], every write is stored immediately, so reads in
//! and after the batch see it, but delivery is deferred. When the outermost
//! batch closes, each changed node is delivered once, carrying its final
//! value. A subscriber therefore fires at most once per batch no matter how
//! many writes its sources received.

use std::panic::{self, AssertUnwindSafe};

use crate::error::Result;
use crate::runtime::Runtime;

impl Runtime {
    /// Run `f` with delivery deferred until the outermost batch closes.
    ///
    /// `f`'s return value is handed back unmodified, including any `Result`
    /// it produces. Nested calls join the enclosing batch. A batch opened from
    /// inside a subscriber joins the propagation already in progress.
    ///
    /// If `f` panics, the writes it stored are still delivered before the
    /// panic is resumed, so no computed value is left stale.
    ///
    /// # Errors
    ///
    /// Returns the propagation error of the deferred delivery, as
    /// [`Signal::set`](crate::Signal::set) would. `f`'s output is dropped in
    /// that case; use [`batch_with_output`](Self::batch_with_output) to keep it.
    ///
    /// # Example
    ///
    /// ```
    /// use rowscope_core::{Runtime, Signal};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// let rt = Runtime::new();
    /// let offset = Signal::new(&rt, 0.0_f64);
    /// let calls = Arc::new(AtomicUsize::new(0));
    /// let calls_clone = calls.clone();
    /// let _sub = offset.subscribe(move |_| {
    ///     calls_clone.fetch_add(1, Ordering::SeqCst);
    /// });
    ///
    /// rt.batch(|| {
    ///     for step in 1..=10 {
    ///         offset.set(step as f64 * 32.0).unwrap();
    ///     }
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(calls.load(Ordering::SeqCst), 1);
    /// assert_eq!(offset.get(), 320.0);
    /// ```
    pub fn batch<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R,
    {
        let (output, delivered) = self.batch_with_output(f);
        delivered.map(|()| output)
    }

    /// Like [`batch`](Self::batch), but hands back `f`'s output together with
    /// the delivery result, so the output survives a failed delivery.
    pub fn batch_with_output<R, F>(&self, f: F) -> (R, Result<()>)
    where
        F: FnOnce() -> R,
    {
        self.enter_batch();
        let output = panic::catch_unwind(AssertUnwindSafe(f));
        let delivered = self.exit_batch();
        match output {
            Ok(output) => (output, delivered),
            Err(payload) => {
                if let Err(err) = delivered {
                    tracing::warn!(target: "rowscope_core::runtime", error = %err, "delivery failed while a batch unwound");
                }
                panic::resume_unwind(payload)
            }
        }
    }
}
