//! Virtualized windowing over an ordered snapshot.
//!
//! [`compute_view_window`] is a pure function: it keeps no state between
//! calls, so callers pass the current scroll position every time.

use serde::Serialize;

/// Scroll geometry for one windowing call, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    pub scroll_offset_px: f64,
    pub viewport_height_px: f64,
    pub item_height_px: f64,
    /// Extra items rendered above and below the visible area
    pub overscan: usize,
}

impl ViewportGeometry {
    pub fn new(scroll_offset_px: f64, viewport_height_px: f64, item_height_px: f64) -> Self {
        Self {
            scroll_offset_px,
            viewport_height_px,
            item_height_px,
            overscan: 0,
        }
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }
}

/// The slice of a snapshot to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewWindow<'a, T> {
    /// Items in `[start, end)` of the snapshot.
    pub items: &'a [T],
    /// First rendered index, overscan included (inclusive).
    pub start: usize,
    /// Last rendered index, overscan included (exclusive).
    pub end: usize,
    /// First index actually inside the viewport.
    pub visible_start: usize,
    /// End of the indices inside the viewport (exclusive).
    pub visible_end: usize,
    /// Height of the whole snapshot if every item were rendered.
    pub total_height_px: f64,
    /// Vertical offset at which `items[0]` should be drawn.
    pub offset_y_px: f64,
}

impl<T> ViewWindow<'_, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Clone> ViewWindow<'_, T> {
    /// Copy the window out of the snapshot it borrows from.
    pub fn into_owned(self) -> OwnedViewWindow<T> {
        OwnedViewWindow {
            items: self.items.to_vec(),
            start: self.start,
            end: self.end,
            visible_start: self.visible_start,
            visible_end: self.visible_end,
            total_height_px: self.total_height_px,
            offset_y_px: self.offset_y_px,
        }
    }
}

/// A [`ViewWindow`] detached from its snapshot, for sending across tasks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnedViewWindow<T> {
    pub items: Vec<T>,
    pub start: usize,
    pub end: usize,
    pub visible_start: usize,
    pub visible_end: usize,
    pub total_height_px: f64,
    pub offset_y_px: f64,
}

/// Compute the rendered range of `snapshot` for the given geometry.
///
/// A non-positive or non-finite item height yields an empty window with
/// zero total height. Negative scroll offsets are treated as zero. Scrolling
/// more than `overscan` items past the end yields an empty window.
pub fn compute_view_window<T>(snapshot: &[T], geometry: ViewportGeometry) -> ViewWindow<'_, T> {
    let len = snapshot.len();
    let item_height = geometry.item_height_px;

    if !(item_height.is_finite() && item_height > 0.0) {
        return ViewWindow {
            items: &snapshot[..0],
            start: 0,
            end: 0,
            visible_start: 0,
            visible_end: 0,
            total_height_px: 0.0,
            offset_y_px: 0.0,
        };
    }

    let scroll = sanitize_px(geometry.scroll_offset_px);
    let viewport = sanitize_px(geometry.viewport_height_px);

    let first = (scroll / item_height).floor() as usize;
    let visible_count = (viewport / item_height).ceil() as usize;
    let visible_end = first.saturating_add(visible_count).min(len);
    let visible_start = first.min(visible_end);

    // Overscan extends from the unclamped first row, so a scroll far past
    // the end renders nothing instead of the tail.
    let end = visible_end.saturating_add(geometry.overscan).min(len);
    let start = first.saturating_sub(geometry.overscan).min(end);

    ViewWindow {
        items: &snapshot[start..end],
        start,
        end,
        visible_start,
        visible_end,
        total_height_px: len as f64 * item_height,
        offset_y_px: start as f64 * item_height,
    }
}

fn sanitize_px(px: f64) -> f64 {
    if px.is_finite() && px > 0.0 {
        px
    } else {
        0.0
    }
}
