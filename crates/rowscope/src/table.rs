//! Table state substrate.
//!
//! [`TableState`] holds the signals an action layer writes into (row count,
//! sort, filters, selection) and the aggregates derived from them. Higher-level
//! semantics such as sort cycling or multi-select modes belong to the action
//! layer; the writers here only store values.

use std::collections::BTreeSet;
use std::fmt;

use rowscope_core::{Computed, Runtime, Signal};

use crate::error::Result;

/// Sort order of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// The column a table is sorted by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortKey {
    /// Column name.
    pub column: String,
    /// Sort order.
    pub direction: SortDirection,
}

impl SortKey {
    /// Sort `column` ascending.
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Sort `column` descending.
    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// A filter applied to one column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnFilter {
    /// Column name.
    pub column: String,
    /// Filter expression, interpreted by the query collaborator.
    pub value: String,
}

impl ColumnFilter {
    /// Create a filter.
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Reactive state of one table.
///
/// # Signals
///
/// - `total_rows`: row count reported by the query collaborator
/// - `sort`: the active sort, if any
/// - `filters`: active column filters, in application order
/// - `selection`: selected row indices
///
/// # Derived
///
/// - `active_filter_count`, `selected_count`, `has_selection`, `is_sorted`
pub struct TableState {
    runtime: Runtime,
    total_rows: Signal<usize>,
    sort: Signal<Option<SortKey>>,
    filters: Signal<Vec<ColumnFilter>>,
    selection: Signal<BTreeSet<usize>>,
    active_filter_count: Computed<usize>,
    selected_count: Computed<usize>,
    has_selection: Computed<bool>,
    is_sorted: Computed<bool>,
}

impl TableState {
    /// Create an empty, unsorted, unfiltered table state.
    pub fn new(runtime: &Runtime) -> Self {
        let total_rows = Signal::new(runtime, 0_usize);
        let sort = Signal::new(runtime, None::<SortKey>);
        let filters = Signal::new(runtime, Vec::<ColumnFilter>::new());
        let selection = Signal::new(runtime, BTreeSet::<usize>::new());

        let active_filter_count = Computed::new(runtime, &[&filters], {
            let filters = filters.clone();
            move || filters.with(Vec::len)
        });
        let selected_count = Computed::new(runtime, &[&selection], {
            let selection = selection.clone();
            move || selection.with(BTreeSet::len)
        });
        let has_selection = Computed::new(runtime, &[&selected_count], {
            let selected_count = selected_count.clone();
            move || selected_count.get() > 0
        });
        let is_sorted = Computed::new(runtime, &[&sort], {
            let sort = sort.clone();
            move || sort.with(Option::is_some)
        });

        Self {
            runtime: runtime.clone(),
            total_rows,
            sort,
            filters,
            selection,
            active_filter_count,
            selected_count,
            has_selection,
            is_sorted,
        }
    }

    /// Row count signal, shared with a [`ScrollController`](crate::ScrollController).
    pub fn total_rows(&self) -> &Signal<usize> {
        &self.total_rows
    }

    /// Active sort signal.
    pub fn sort(&self) -> &Signal<Option<SortKey>> {
        &self.sort
    }

    /// Active filters signal.
    pub fn filters(&self) -> &Signal<Vec<ColumnFilter>> {
        &self.filters
    }

    /// Selected rows signal.
    pub fn selection(&self) -> &Signal<BTreeSet<usize>> {
        &self.selection
    }

    /// Number of active filters.
    pub fn active_filter_count(&self) -> &Computed<usize> {
        &self.active_filter_count
    }

    /// Number of selected rows.
    pub fn selected_count(&self) -> &Computed<usize> {
        &self.selected_count
    }

    /// Whether any row is selected.
    pub fn has_selection(&self) -> &Computed<bool> {
        &self.has_selection
    }

    /// Whether a sort is active.
    pub fn is_sorted(&self) -> &Computed<bool> {
        &self.is_sorted
    }

    /// Store the row count reported by the query collaborator.
    ///
    /// Returns whether the value changed.
    pub fn set_total_rows(&self, total_rows: usize) -> Result<bool> {
        Ok(self.total_rows.set(total_rows)?)
    }

    /// Sort by `sort`, replacing any active sort.
    pub fn set_sort(&self, sort: SortKey) -> Result<bool> {
        Ok(self.sort.set(Some(sort))?)
    }

    /// Remove the active sort.
    pub fn clear_sort(&self) -> Result<bool> {
        Ok(self.sort.set(None)?)
    }

    /// Replace the active filters. An equal list does not notify.
    pub fn set_filters(&self, filters: Vec<ColumnFilter>) -> Result<bool> {
        Ok(self.filters.set(filters)?)
    }

    /// Replace the selection with `rows`. Duplicates collapse.
    pub fn set_selection<I>(&self, rows: I) -> Result<bool>
    where
        I: IntoIterator<Item = usize>,
    {
        Ok(self.selection.set(rows.into_iter().collect())?)
    }

    /// Deselect every row.
    pub fn clear_selection(&self) -> Result<bool> {
        Ok(self.selection.set(BTreeSet::new())?)
    }

    /// Clear sort, filters, and selection in one batch.
    ///
    /// The row count is owned by the query collaborator and is left alone.
    pub fn reset(&self) -> Result<()> {
        self.runtime.batch(|| -> Result<()> {
            self.sort.set(None)?;
            self.filters.set(Vec::new())?;
            self.selection.set(BTreeSet::new())?;
            Ok(())
        })??;
        Ok(())
    }
}

impl fmt::Debug for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableState")
            .field("total_rows", &self.total_rows.get())
            .field("sort", &self.sort.get())
            .field("filters", &self.active_filter_count.get())
            .field("selected", &self.selected_count.get())
            .finish()
    }
}

static_assertions::assert_impl_all!(TableState: Send, Sync);
