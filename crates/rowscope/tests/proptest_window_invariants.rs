//! Property-based invariant tests for the virtual row window.
//!
//! 1. The visible range is structurally valid for any inputs.
//! 2. The range covers every row intersecting the viewport.
//! 3. Programmatic scroll offsets stay within `[0, max_scroll]`.

use proptest::prelude::*;
use rowscope::{
    Alignment, Runtime, ScrollController, Signal, VisibleRange, WindowConfig, WindowParams,
    compute_visible_range,
};

fn params_strategy() -> impl Strategy<Value = WindowParams> {
    (
        0usize..100_000,
        0.5f64..200.0,
        0.0f64..4_000.0,
        -1_000.0f64..5_000_000.0,
        0usize..50,
    )
        .prop_map(
            |(total_rows, row_height, viewport_height, scroll_offset, buffer_rows)| WindowParams {
                total_rows,
                row_height,
                viewport_height,
                scroll_offset,
                buffer_rows,
            },
        )
}

fn alignment_strategy() -> impl Strategy<Value = Alignment> {
    prop_oneof![
        Just(Alignment::Start),
        Just(Alignment::Center),
        Just(Alignment::End),
    ]
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Structural validity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn range_is_always_valid(params in params_strategy()) {
        let range = compute_visible_range(&params);
        prop_assert!(range.start <= range.end);
        prop_assert!(range.end <= params.total_rows);
        prop_assert_eq!(range.offset_y, range.start as f64 * params.row_height);
    }

    #[test]
    fn arbitrary_floats_never_break_the_range(
        total_rows in 0usize..1_000,
        row_height in any::<f64>(),
        viewport_height in any::<f64>(),
        scroll_offset in any::<f64>(),
    ) {
        let range = compute_visible_range(&WindowParams {
            total_rows,
            row_height,
            viewport_height,
            scroll_offset,
            buffer_rows: 5,
        });
        prop_assert!(range.start <= range.end);
        prop_assert!(range.end <= total_rows);
    }

    #[test]
    fn empty_table_is_empty_range(params in params_strategy()) {
        let range = compute_visible_range(&WindowParams { total_rows: 0, ..params });
        prop_assert_eq!(range, VisibleRange::EMPTY);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Coverage
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn range_covers_rows_starting_in_viewport(params in params_strategy()) {
        let range = compute_visible_range(&params);
        if params.total_rows == 0 || params.viewport_height == 0.0 {
            prop_assert!(range.is_empty());
            return Ok(());
        }

        let scroll = params.clamp_scroll(params.scroll_offset);
        let first = (scroll / params.row_height).floor() as usize;
        let last = ((scroll + params.viewport_height) / params.row_height).floor() as usize;
        // Rows whose top edge lies strictly inside the viewport, clipped to the table.
        for row in first..last.min(params.total_rows) {
            if (row as f64) * params.row_height < scroll + params.viewport_height - params.row_height {
                prop_assert!(range.contains(row), "row {} missing from {:?}", row, range);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Programmatic scrolling
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn scroll_to_row_stays_in_bounds(
        total_rows in 1usize..10_000,
        viewport_height in 1.0f64..2_000.0,
        index in 0usize..20_000,
        alignment in alignment_strategy(),
    ) {
        let rt = Runtime::new();
        let rows = Signal::new(&rt, total_rows);
        let scroll = ScrollController::new(&rt, WindowConfig::default(), rows).unwrap();
        scroll.resize(viewport_height).unwrap();

        let offset = scroll.scroll_to_row(index, alignment).unwrap().unwrap();
        prop_assert!(offset >= 0.0);
        prop_assert!(offset <= scroll.max_scroll());
        prop_assert_eq!(scroll.scroll_offset().get(), offset);

        let target = index.min(total_rows - 1);
        if alignment == Alignment::Start && offset < scroll.max_scroll() {
            prop_assert!(scroll.visible_range().contains(target));
        }
    }
}
