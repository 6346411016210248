//! Virtual row-window arithmetic.
//!
//! [`compute_visible_range`] turns "total rows + scroll position + viewport
//! size" into the half-open interval of row indices that must exist in the
//! rendered surface, plus the pixel offset at which the first of them is
//! placed. It is a pure function: the caller owns the recompute triggers
//! (total-row change, scroll, resize).
//!
//! ```
//! use rowscope::window::{WindowParams, compute_visible_range};
//!
//! let range = compute_visible_range(&WindowParams {
//!     total_rows: 100,
//!     row_height: 32.0,
//!     viewport_height: 160.0,
//!     scroll_offset: 320.0,
//!     buffer_rows: 5,
//! });
//! assert_eq!((range.start, range.end, range.offset_y), (5, 20, 160.0));
//! ```

use std::ops::Range;

/// Rows rendered beyond each edge of the viewport by default.
pub const DEFAULT_BUFFER_ROWS: usize = 5;

/// Inputs of one window computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowParams {
    /// Number of rows in the data set.
    pub total_rows: usize,
    /// Height of one row in pixels.
    pub row_height: f64,
    /// Height of the viewport in pixels.
    pub viewport_height: f64,
    /// Vertical scroll position in pixels.
    pub scroll_offset: f64,
    /// Extra rows kept materialized above and below the viewport.
    pub buffer_rows: usize,
}

impl WindowParams {
    /// Total height of all rows.
    pub fn content_height(&self) -> f64 {
        if !valid_row_height(self.row_height) {
            return 0.0;
        }
        self.total_rows as f64 * self.row_height
    }

    /// Largest scroll offset that still fills the viewport.
    pub fn max_scroll(&self) -> f64 {
        (self.content_height() - non_negative(self.viewport_height)).max(0.0)
    }

    /// Clamp `offset` to `[0, max_scroll]`.
    pub fn clamp_scroll(&self, offset: f64) -> f64 {
        non_negative(offset).min(self.max_scroll())
    }
}

/// The rows that must be materialized, `[start, end)`, and where the first
/// one is placed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VisibleRange {
    /// First materialized row.
    pub start: usize,
    /// One past the last materialized row.
    pub end: usize,
    /// Pixel offset of `start`, i.e. `start * row_height`.
    pub offset_y: f64,
}

impl VisibleRange {
    /// The range that materializes nothing.
    pub const EMPTY: VisibleRange = VisibleRange {
        start: 0,
        end: 0,
        offset_y: 0.0,
    };

    /// Number of rows in the range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if no rows are materialized.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns `true` if `row` is materialized.
    pub fn contains(&self, row: usize) -> bool {
        (self.start..self.end).contains(&row)
    }

    /// The row indices as a `Range`.
    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Compute the visible range for `params`.
///
/// Never fails. Negative, NaN, or infinite scroll and viewport values are
/// treated as zero, scroll beyond the last page is clamped to it, and a row
/// height that is not finite and positive yields [`VisibleRange::EMPTY`].
/// The result always satisfies `start <= end <= total_rows`.
pub fn compute_visible_range(params: &WindowParams) -> VisibleRange {
    let row_height = params.row_height;
    let viewport_height = non_negative(params.viewport_height);
    if params.total_rows == 0 || viewport_height == 0.0 || !valid_row_height(row_height) {
        return VisibleRange::EMPTY;
    }

    let scroll_offset = params.clamp_scroll(params.scroll_offset);
    let raw_start = (scroll_offset / row_height).floor() as usize;
    let raw_visible = (viewport_height / row_height).ceil() as usize;

    let end = raw_start
        .saturating_add(raw_visible)
        .saturating_add(params.buffer_rows)
        .min(params.total_rows);
    let start = raw_start.saturating_sub(params.buffer_rows).min(end);

    VisibleRange {
        start,
        end,
        offset_y: start as f64 * row_height,
    }
}

fn valid_row_height(row_height: f64) -> bool {
    row_height.is_finite() && row_height > 0.0
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
