//! Row fetching for a virtual window.
//!
//! A [`RowFeed`] sits between the visible range and the query collaborator. It
//! asks its [`RowSource`] for rows whenever the range leaves what is already
//! loaded, and correlates replies by [`RequestId`] so that a reply overtaken by
//! a newer request never overwrites newer data.
//!
//! Replies may arrive in any order and from any thread.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use rowscope_core::{Runtime, Signal, Subscription, equality};

use crate::error::Result;
use crate::scroll::ScrollController;
use crate::window::VisibleRange;

/// Identifies one row request. Ids increase monotonically per feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// The raw id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A request for the rows `[range.start, range.end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRequest {
    /// Correlation id to pass back to [`RowFeed::receive`].
    pub id: RequestId,
    /// Requested row indices.
    pub range: Range<usize>,
}

/// The query collaborator that produces rows.
///
/// `request_rows` must not block on the reply; deliver it later through
/// [`RowFeed::receive`].
pub trait RowSource: Send + Sync {
    /// Start fetching the rows of `request`.
    fn request_rows(&self, request: RowRequest);
}

impl<F> RowSource for F
where
    F: Fn(RowRequest) + Send + Sync,
{
    fn request_rows(&self, request: RowRequest) {
        self(request)
    }
}

/// A loaded block of consecutive rows.
pub struct RowBlock<R> {
    /// Row indices covered by `rows`.
    pub range: Range<usize>,
    /// The rows, `rows[i]` being row `range.start + i`.
    pub rows: Arc<[R]>,
}

impl<R> RowBlock<R> {
    /// The row at absolute index `row`, if loaded.
    pub fn get(&self, row: usize) -> Option<&R> {
        row.checked_sub(self.range.start)
            .and_then(|index| self.rows.get(index))
    }
}

impl<R> Clone for RowBlock<R> {
    fn clone(&self) -> Self {
        Self {
            range: self.range.clone(),
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for RowBlock<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowBlock")
            .field("range", &self.range)
            .field("rows", &self.rows.len())
            .finish()
    }
}

#[derive(Default)]
struct FeedState {
    next_id: u64,
    latest: Option<RowRequest>,
    loaded: Option<Range<usize>>,
    last_visible: Option<VisibleRange>,
}

struct FeedInner<R> {
    source: Arc<dyn RowSource>,
    total_rows: Signal<usize>,
    rows: Signal<Option<RowBlock<R>>>,
    state: Mutex<FeedState>,
}

/// Requests rows for the visible range and publishes the latest reply.
///
/// Cloning a `RowFeed` creates another handle to the same feed.
pub struct RowFeed<R> {
    inner: Arc<FeedInner<R>>,
}

impl<R> Clone for RowFeed<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Send + Sync + 'static> RowFeed<R> {
    /// Create a feed writing row counts into `total_rows`.
    pub fn new(runtime: &Runtime, total_rows: Signal<usize>, source: impl RowSource + 'static) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                source: Arc::new(source),
                total_rows,
                rows: Signal::with_equality(runtime, None, equality::never()),
                state: Mutex::new(FeedState::default()),
            }),
        }
    }

    /// The most recently accepted block. Every accepted reply notifies.
    pub fn rows(&self) -> &Signal<Option<RowBlock<R>>> {
        &self.inner.rows
    }

    /// The id of the request whose reply would currently be accepted.
    pub fn pending(&self) -> Option<RequestId> {
        self.inner.state.lock().latest.as_ref().map(|request| request.id)
    }

    /// Request rows for `range` unless they are already loaded or requested.
    ///
    /// Returns the id of the new request, if one was issued.
    pub fn request(&self, range: &VisibleRange) -> Option<RequestId> {
        let request = {
            let mut state = self.inner.state.lock();
            state.last_visible = Some(*range);
            if range.is_empty() {
                return None;
            }
            let covered = |loaded: &Range<usize>| loaded.start <= range.start && range.end <= loaded.end;
            if state.latest.as_ref().is_some_and(|pending| covered(&pending.range)) {
                return None;
            }
            if state.latest.is_none() && state.loaded.as_ref().is_some_and(covered) {
                return None;
            }
            issue(&mut state, range.rows())
        };
        Some(self.dispatch(request))
    }

    /// Forget what is loaded and re-request the last visible range.
    ///
    /// Call after the query changes (sort, filter, new data set). A reply to
    /// any earlier request is dropped from now on.
    pub fn invalidate(&self) -> Option<RequestId> {
        let request = {
            let mut state = self.inner.state.lock();
            state.loaded = None;
            state.latest = None;
            let visible = state.last_visible.filter(|range| !range.is_empty())?;
            issue(&mut state, visible.rows())
        };
        tracing::debug!(target: "rowscope::feed", "row feed invalidated");
        Some(self.dispatch(request))
    }

    /// Deliver the reply to request `id`.
    ///
    /// Returns `Ok(false)` and drops the rows if `id` is not the latest
    /// request.
    pub fn receive(&self, id: RequestId, rows: impl Into<Arc<[R]>>) -> Result<bool> {
        let block = {
            let mut state = self.inner.state.lock();
            match state.latest.take() {
                Some(request) if request.id == id => {
                    state.loaded = Some(request.range.clone());
                    RowBlock {
                        range: request.range,
                        rows: rows.into(),
                    }
                }
                latest => {
                    tracing::debug!(
                        target: "rowscope::feed",
                        %id,
                        latest = ?latest.as_ref().map(|request| request.id),
                        "dropping stale row reply"
                    );
                    state.latest = latest;
                    return Ok(false);
                }
            }
        };

        if block.rows.len() != block.range.len() {
            tracing::warn!(
                target: "rowscope::feed",
                %id,
                requested = block.range.len(),
                received = block.rows.len(),
                "row reply length differs from request"
            );
        }
        self.inner.rows.set(Some(block))?;
        Ok(true)
    }

    /// Deliver a new total row count.
    pub fn receive_total_rows(&self, total_rows: usize) -> Result<bool> {
        tracing::trace!(target: "rowscope::feed", total_rows, "total rows received");
        Ok(self.inner.total_rows.set(total_rows)?)
    }

    /// Request rows whenever `scroll`'s visible range changes.
    pub fn follow(&self, scroll: &ScrollController) -> Result<Subscription> {
        let feed = self.clone();
        scroll.on_scroll(move |range| {
            feed.request(range);
        })
    }

    fn dispatch(&self, request: RowRequest) -> RequestId {
        let id = request.id;
        tracing::trace!(target: "rowscope::feed", %id, range = ?request.range, "requesting rows");
        self.inner.source.request_rows(request);
        id
    }
}

fn issue(state: &mut FeedState, range: Range<usize>) -> RowRequest {
    state.next_id += 1;
    let request = RowRequest {
        id: RequestId(state.next_id),
        range,
    };
    state.latest = Some(request.clone());
    request
}

impl<R> fmt::Debug for RowFeed<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RowFeed")
            .field("pending", &state.latest)
            .field("loaded", &state.loaded)
            .finish()
    }
}

static_assertions::assert_impl_all!(RowFeed<String>: Send, Sync, Clone);
