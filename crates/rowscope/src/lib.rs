//! Rowscope: virtual row windows for tabular data widgets.
//!
//! This crate turns "total rows + scroll position + viewport size" into the
//! rows a renderer must materialize, on top of the reactive graph from
//! [`rowscope_core`]:
//!
//! - [`window`]: the pure visible-range arithmetic
//! - [`ScrollController`]: live scroll geometry and programmatic scrolling
//! - [`TableState`]: sort, filter, selection, and row-count signals
//! - [`RowFeed`]: request/reply correlation with the query collaborator
//!
//! # Example
//!
//! ```
//! use rowscope::{Runtime, ScrollController, TableState, WindowConfig};
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! let rt = Runtime::new();
//! let table = TableState::new(&rt);
//! let scroll = ScrollController::new(&rt, WindowConfig::default(), table.total_rows().clone())
//!     .unwrap();
//! scroll.resize(160.0).unwrap();
//!
//! let painted = Arc::new(Mutex::new(Vec::new()));
//! let _sub = scroll
//!     .on_scroll({
//!         let painted = painted.clone();
//!         move |range| painted.lock().push(range.rows())
//!     })
//!     .unwrap();
//!
//! table.set_total_rows(100).unwrap();
//! scroll.handle_scroll(320.0).unwrap();
//! assert_eq!(*painted.lock(), vec![0..10, 5..20]);
//! ```
//!
//! The reactive primitives are re-exported, so most applications depend on
//! this crate alone.

mod error;
mod feed;
pub mod logging;
mod scroll;
mod table;
pub mod window;

pub use error::{ConfigError, Error, Result};
pub use feed::{RequestId, RowBlock, RowFeed, RowRequest, RowSource};
pub use scroll::{
    Alignment, DEFAULT_ROW_HEIGHT, ParseAlignmentError, ScrollController, ScrollHost, WindowConfig,
};
pub use table::{ColumnFilter, SortDirection, SortKey, TableState};
pub use window::{DEFAULT_BUFFER_ROWS, VisibleRange, WindowParams, compute_visible_range};

pub use rowscope_core::{
    Computed, FailurePolicy, ReactiveError, Runtime, RuntimeConfig, Signal, Source, Subscription,
    SubscriptionGuard, SubscriptionSet, equality,
};
