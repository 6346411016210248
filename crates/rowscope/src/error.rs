//! Error types for the rowscope crate.

use rowscope_core::ReactiveError;
use thiserror::Error;

/// A rejected window configuration value.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Row height must be finite and greater than zero.
    #[error("invalid row height {0}: must be finite and greater than zero")]
    InvalidRowHeight(f64),
}

/// Errors from scroll and table operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A configuration value was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Propagating a state write failed.
    #[error(transparent)]
    Reactive(#[from] ReactiveError),
}

/// Result type for rowscope operations.
pub type Result<T> = std::result::Result<T, Error>;
