//! Log targets for this crate.
//!
//! The reactive graph logs under [`rowscope_core::logging::targets`].
//!
//! ```
//! let _ = tracing_subscriber::fmt()
//!     .with_env_filter("rowscope::feed=debug,rowscope_core=warn")
//!     .try_init();
//! ```

/// Target names for log filtering.
pub mod targets {
    /// Scroll events, resizes, and programmatic scrolls.
    pub const SCROLL: &str = "rowscope::scroll";
    /// Row requests and replies.
    pub const FEED: &str = "rowscope::feed";

    pub use rowscope_core::logging::targets::{COMPUTED, CORE, RUNTIME, SIGNAL};
}
