//! Scroll control over a virtual row window.
//!
//! [`ScrollController`] keeps the live geometry of a scrolling table (scroll
//! offset and viewport height) in signals, derives the [`VisibleRange`] from
//! them and the shared total-row signal, and implements programmatic
//! scrolling with [`Alignment`].
//!
//! # Example
//!
//! ```
//! use rowscope::{Alignment, Runtime, ScrollController, Signal, WindowConfig};
//!
//! let rt = Runtime::new();
//! let total_rows = Signal::new(&rt, 100_usize);
//! let scroll = ScrollController::new(&rt, WindowConfig::default(), total_rows).unwrap();
//!
//! scroll.resize(160.0).unwrap();
//! let offset = scroll.scroll_to_row(20, Alignment::Center).unwrap();
//! assert_eq!(offset, Some(576.0));
//! assert_eq!(scroll.visible_range().rows(), 13..28);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rowscope_core::{Computed, Runtime, Signal, Subscription, SubscriptionGuard, equality};

use crate::error::{ConfigError, Result};
use crate::window::{DEFAULT_BUFFER_ROWS, VisibleRange, WindowParams, compute_visible_range};

/// Default row height in pixels.
pub const DEFAULT_ROW_HEIGHT: f64 = 32.0;

/// Fixed geometry of a virtual window.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WindowConfig {
    row_height: f64,
    buffer_rows: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            row_height: DEFAULT_ROW_HEIGHT,
            buffer_rows: DEFAULT_BUFFER_ROWS,
        }
    }
}

impl WindowConfig {
    /// Create a configuration with the given row height and default buffer.
    pub fn new(row_height: f64) -> std::result::Result<Self, ConfigError> {
        Self::default().with_row_height(row_height)
    }

    /// Set the row height.
    pub fn with_row_height(mut self, row_height: f64) -> std::result::Result<Self, ConfigError> {
        self.row_height = row_height;
        self.validate()?;
        Ok(self)
    }

    /// Set the number of buffer rows kept beyond each viewport edge.
    pub fn with_buffer_rows(mut self, buffer_rows: usize) -> Self {
        self.buffer_rows = buffer_rows;
        self
    }

    /// Height of one row in pixels.
    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    /// Buffer rows beyond each viewport edge.
    pub fn buffer_rows(&self) -> usize {
        self.buffer_rows
    }

    /// Check the configuration. Deserialized values bypass the builders, so
    /// [`ScrollController::new`] validates again.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.row_height.is_finite() && self.row_height > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidRowHeight(self.row_height))
        }
    }
}

/// Where a programmatically scrolled-to row lands in the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Alignment {
    /// Row at the top edge (default).
    #[default]
    Start,
    /// Row centered vertically.
    Center,
    /// Row at the bottom edge.
    End,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Alignment::Start => "start",
            Alignment::Center => "center",
            Alignment::End => "end",
        })
    }
}

/// Error returned when parsing an unknown [`Alignment`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown alignment {0:?}: expected \"start\", \"center\" or \"end\"")]
pub struct ParseAlignmentError(String);

impl FromStr for Alignment {
    type Err = ParseAlignmentError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "start" => Ok(Alignment::Start),
            "center" => Ok(Alignment::Center),
            "end" => Ok(Alignment::End),
            other => Err(ParseAlignmentError(other.to_owned())),
        }
    }
}

/// The host scroll surface.
///
/// Writing the host's scroll position is the only side effect a
/// [`ScrollController`] performs.
pub trait ScrollHost: Send + Sync {
    /// Move the host's vertical scroll position to `offset` pixels.
    fn set_scroll_offset(&self, offset: f64);
}

impl<F> ScrollHost for F
where
    F: Fn(f64) + Send + Sync,
{
    fn set_scroll_offset(&self, offset: f64) {
        self(offset)
    }
}

/// Live scroll state of a virtual table.
pub struct ScrollController {
    config: WindowConfig,
    runtime: Runtime,
    total_rows: Signal<usize>,
    scroll_offset: Signal<f64>,
    viewport_height: Signal<f64>,
    range: Computed<VisibleRange>,
    host: Option<Arc<dyn ScrollHost>>,
    _reclamp: SubscriptionGuard,
}

impl ScrollController {
    /// Create a controller over `total_rows` with a zero-height viewport
    /// scrolled to the top.
    ///
    /// When `total_rows` shrinks, the stored scroll offset is clamped to the
    /// new `max_scroll` within the same propagation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if `config` is invalid.
    pub fn new(runtime: &Runtime, config: WindowConfig, total_rows: Signal<usize>) -> Result<Self> {
        config.validate()?;

        let scroll_offset = Signal::new(runtime, 0.0_f64);
        let viewport_height = Signal::new(runtime, 0.0_f64);
        let range = Computed::with_equality(
            runtime,
            &[&total_rows, &scroll_offset, &viewport_height],
            equality::never(),
            {
                let (total_rows, scroll_offset, viewport_height) =
                    (total_rows.clone(), scroll_offset.clone(), viewport_height.clone());
                move || {
                    compute_visible_range(&WindowParams {
                        total_rows: total_rows.get(),
                        row_height: config.row_height,
                        viewport_height: viewport_height.get(),
                        scroll_offset: scroll_offset.get(),
                        buffer_rows: config.buffer_rows,
                    })
                }
            },
        );

        // A shrinking row count pulls the stored offset back into range.
        let reclamp = total_rows
            .try_subscribe({
                let (scroll_offset, viewport_height) =
                    (scroll_offset.clone(), viewport_height.clone());
                move |&total_rows: &usize| -> rowscope_core::Result<()> {
                    let offset = scroll_offset.get();
                    let clamped = WindowParams {
                        total_rows,
                        row_height: config.row_height,
                        viewport_height: viewport_height.get(),
                        scroll_offset: offset,
                        buffer_rows: config.buffer_rows,
                    }
                    .clamp_scroll(offset);
                    if clamped != offset {
                        tracing::trace!(target: "rowscope::scroll", total_rows, offset, clamped, "row count shrank");
                        scroll_offset.set(clamped)?;
                    }
                    Ok(())
                }
            })
            .guard();

        Ok(Self {
            config,
            runtime: runtime.clone(),
            total_rows,
            scroll_offset,
            viewport_height,
            range,
            host: None,
            _reclamp: reclamp,
        })
    }

    /// Attach the host scroll surface written by programmatic scrolls.
    pub fn with_host(mut self, host: impl ScrollHost + 'static) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    /// The window configuration.
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// The shared total-row signal.
    pub fn total_rows(&self) -> &Signal<usize> {
        &self.total_rows
    }

    /// Current scroll offset signal.
    pub fn scroll_offset(&self) -> &Signal<f64> {
        &self.scroll_offset
    }

    /// Current viewport height signal.
    pub fn viewport_height(&self) -> &Signal<f64> {
        &self.viewport_height
    }

    /// The derived visible range.
    pub fn range(&self) -> &Computed<VisibleRange> {
        &self.range
    }

    /// `total_rows * row_height`.
    pub fn content_height(&self) -> f64 {
        self.params().content_height()
    }

    /// `max(0, content_height - viewport_height)`.
    pub fn max_scroll(&self) -> f64 {
        self.params().max_scroll()
    }

    /// The range for the current geometry.
    pub fn visible_range(&self) -> VisibleRange {
        self.range.get()
    }

    /// Record a scroll event from the host.
    ///
    /// The offset is clamped to `[0, max_scroll]`. Returns `true` if the stored
    /// offset changed.
    pub fn handle_scroll(&self, offset: f64) -> Result<bool> {
        let clamped = self.params().clamp_scroll(offset);
        tracing::trace!(target: "rowscope::scroll", offset, clamped, "scroll event");
        Ok(self.scroll_offset.set(clamped)?)
    }

    /// Record a viewport resize.
    ///
    /// The stored scroll offset is re-clamped in the same batch, so listeners
    /// see one recompute.
    pub fn resize(&self, viewport_height: f64) -> Result<bool> {
        let height = if viewport_height.is_finite() && viewport_height > 0.0 {
            viewport_height
        } else {
            0.0
        };
        tracing::trace!(target: "rowscope::scroll", height, "viewport resized");

        let changed = self.runtime.batch(|| -> Result<bool> {
            let changed = self.viewport_height.set(height)?;
            let clamped = self.params().clamp_scroll(self.scroll_offset.get());
            self.scroll_offset.set(clamped)?;
            Ok(changed)
        })??;
        Ok(changed)
    }

    /// Scroll so that row `index` lands at `alignment`.
    ///
    /// `index` is clamped to the last row. Returns the offset written to the
    /// host, or `None` if the table is empty.
    pub fn scroll_to_row(&self, index: usize, alignment: Alignment) -> Result<Option<f64>> {
        let params = self.params();
        if params.total_rows == 0 {
            return Ok(None);
        }

        let row_height = self.config.row_height;
        let viewport_height = params.viewport_height;
        let top = index.min(params.total_rows - 1) as f64 * row_height;
        let target = match alignment {
            Alignment::Start => top,
            Alignment::Center => top - viewport_height / 2.0 + row_height / 2.0,
            Alignment::End => top - viewport_height + row_height,
        };

        let offset = params.clamp_scroll(target);
        tracing::debug!(target: "rowscope::scroll", index, %alignment, offset, "scroll to row");
        self.write_offset(offset)?;
        Ok(Some(offset))
    }

    /// Scroll to the first row.
    pub fn scroll_to_top(&self) -> Result<()> {
        self.write_offset(0.0)
    }

    /// Scroll to the last page.
    pub fn scroll_to_bottom(&self) -> Result<()> {
        self.write_offset(self.max_scroll())
    }

    /// Listen for visible-range recomputes.
    ///
    /// If the table already has rows, `callback` runs immediately with the
    /// current range. It then runs on every total-row change, scroll, and
    /// resize.
    pub fn on_scroll<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&VisibleRange) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let subscription = self.range.subscribe({
            let callback = Arc::clone(&callback);
            move |range| callback(range)
        })?;
        if self.total_rows.get() > 0 {
            callback(&self.range.get());
        }
        Ok(subscription)
    }

    fn write_offset(&self, offset: f64) -> Result<()> {
        self.scroll_offset.set(offset)?;
        if let Some(host) = &self.host {
            host.set_scroll_offset(offset);
        }
        Ok(())
    }

    fn params(&self) -> WindowParams {
        WindowParams {
            total_rows: self.total_rows.get(),
            row_height: self.config.row_height,
            viewport_height: self.viewport_height.get(),
            scroll_offset: self.scroll_offset.get(),
            buffer_rows: self.config.buffer_rows,
        }
    }
}

impl fmt::Debug for ScrollController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollController")
            .field("config", &self.config)
            .field("total_rows", &self.total_rows.get())
            .field("scroll_offset", &self.scroll_offset.get())
            .field("viewport_height", &self.viewport_height.get())
            .field("has_host", &self.host.is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(ScrollController: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn controller(rows: usize) -> (Runtime, ScrollController) {
        let rt = Runtime::new();
        let total_rows = Signal::new(&rt, rows);
        let scroll = ScrollController::new(&rt, WindowConfig::default(), total_rows).unwrap();
        scroll.resize(160.0).unwrap();
        (rt, scroll)
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = WindowConfig::default();
        assert_eq!(config.row_height(), 32.0);
        assert_eq!(config.buffer_rows(), 5);

        assert_eq!(
            WindowConfig::new(0.0),
            Err(ConfigError::InvalidRowHeight(0.0))
        );
        assert!(WindowConfig::new(f64::NAN).is_err());
        let config = WindowConfig::new(24.0).unwrap().with_buffer_rows(2);
        assert_eq!((config.row_height(), config.buffer_rows()), (24.0, 2));
    }

    #[test]
    fn test_alignment_parse() {
        assert_eq!("start".parse::<Alignment>(), Ok(Alignment::Start));
        assert_eq!("center".parse::<Alignment>(), Ok(Alignment::Center));
        assert_eq!("end".parse::<Alignment>(), Ok(Alignment::End));
        assert!("middle".parse::<Alignment>().is_err());
        assert_eq!(Alignment::default(), Alignment::Start);
        assert_eq!(Alignment::Center.to_string(), "center");
    }

    #[test]
    fn test_geometry() {
        let (_rt, scroll) = controller(100);
        assert_eq!(scroll.content_height(), 3200.0);
        assert_eq!(scroll.max_scroll(), 3040.0);
    }

    #[test]
    fn test_scroll_to_row_alignments() {
        let (_rt, scroll) = controller(100);
        assert_eq!(scroll.scroll_to_row(20, Alignment::Start).unwrap(), Some(640.0));
        assert_eq!(scroll.scroll_to_row(20, Alignment::Center).unwrap(), Some(576.0));
        assert_eq!(scroll.scroll_to_row(20, Alignment::End).unwrap(), Some(512.0));
        assert_eq!(scroll.scroll_offset().get(), 512.0);
    }

    #[test]
    fn test_scroll_to_row_clamps() {
        let (_rt, scroll) = controller(100);
        assert_eq!(scroll.scroll_to_row(0, Alignment::Center).unwrap(), Some(0.0));
        assert_eq!(scroll.scroll_to_row(99, Alignment::Start).unwrap(), Some(3040.0));
        assert_eq!(scroll.scroll_to_row(5000, Alignment::End).unwrap(), Some(3040.0));
    }

    #[test]
    fn test_scroll_to_row_on_empty_table() {
        let (_rt, scroll) = controller(0);
        assert_eq!(scroll.scroll_to_row(3, Alignment::Start).unwrap(), None);
        assert_eq!(scroll.scroll_offset().get(), 0.0);
    }

    #[test]
    fn test_host_receives_programmatic_scrolls() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let rt = Runtime::new();
        let total_rows = Signal::new(&rt, 100_usize);
        let scroll = ScrollController::new(&rt, WindowConfig::default(), total_rows)
            .unwrap()
            .with_host({
                let writes = writes.clone();
                move |offset: f64| writes.lock().push(offset)
            });
        scroll.resize(160.0).unwrap();

        scroll.handle_scroll(100.0).unwrap();
        scroll.scroll_to_row(20, Alignment::Start).unwrap();
        scroll.scroll_to_bottom().unwrap();
        scroll.scroll_to_top().unwrap();

        // Host-originated scroll events are not echoed back.
        assert_eq!(*writes.lock(), vec![640.0, 3040.0, 0.0]);
    }

    #[test]
    fn test_handle_scroll_clamps() {
        let (_rt, scroll) = controller(100);
        assert!(!scroll.handle_scroll(-20.0).unwrap());
        scroll.handle_scroll(1e6).unwrap();
        assert_eq!(scroll.scroll_offset().get(), 3040.0);
        assert_eq!(scroll.visible_range().rows(), 90..100);
    }

    #[test]
    fn test_resize_reclamps_offset() {
        let (_rt, scroll) = controller(10);
        scroll.handle_scroll(160.0).unwrap();
        assert_eq!(scroll.scroll_offset().get(), 160.0);

        scroll.resize(320.0).unwrap();
        assert_eq!(scroll.max_scroll(), 0.0);
        assert_eq!(scroll.scroll_offset().get(), 0.0);
    }

    #[test]
    fn test_on_scroll_fires_immediately_when_rows_exist() {
        let (_rt, scroll) = controller(100);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = scroll
            .on_scroll({
                let seen = seen.clone();
                move |range: &VisibleRange| seen.lock().push(range.rows())
            })
            .unwrap();
        assert_eq!(*seen.lock(), vec![0..10]);

        scroll.handle_scroll(320.0).unwrap();
        assert_eq!(*seen.lock(), vec![0..10, 5..20]);
    }

    #[test]
    fn test_on_scroll_waits_for_rows() {
        let (_rt, scroll) = controller(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = scroll
            .on_scroll({
                let seen = seen.clone();
                move |range: &VisibleRange| seen.lock().push(range.rows())
            })
            .unwrap();
        assert!(seen.lock().is_empty());

        scroll.total_rows().set(50).unwrap();
        assert_eq!(*seen.lock(), vec![0..10]);

        sub.unsubscribe();
        scroll.total_rows().set(60).unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_shrinking_rows_reclamps_offset() {
        let (_rt, scroll) = controller(1_000);
        scroll.scroll_to_bottom().unwrap();
        assert_eq!(scroll.scroll_offset().get(), 31_840.0);

        scroll.total_rows().set(20).unwrap();
        assert_eq!(scroll.scroll_offset().get(), 480.0);
        assert_eq!(scroll.visible_range().rows(), 10..20);

        // Growing back keeps the clamped position instead of jumping.
        scroll.total_rows().set(1_000).unwrap();
        assert_eq!(scroll.scroll_offset().get(), 480.0);
        assert_eq!(scroll.visible_range().rows(), 10..25);
    }

    #[test]
    fn test_resize_notifies_once() {
        let (_rt, scroll) = controller(10);
        scroll.handle_scroll(160.0).unwrap();
        let calls = Arc::new(Mutex::new(0));
        let _sub = scroll
            .on_scroll({
                let calls = calls.clone();
                move |_: &VisibleRange| *calls.lock() += 1
            })
            .unwrap();
        assert_eq!(*calls.lock(), 1);

        // Viewport and offset both change; one recompute reaches listeners.
        scroll.resize(320.0).unwrap();
        assert_eq!(*calls.lock(), 2);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let rt = Runtime::new();
        let total_rows = Signal::new(&rt, 10_usize);
        let mut config = WindowConfig::default();
        config.row_height = -1.0;
        let err = ScrollController::new(&rt, config, total_rows).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::InvalidRowHeight(_))
        ));
    }
}
