use std::ops::RangeInclusive;

/// Extra rows kept mounted on each side of the visible range.
pub const DEFAULT_BUFFER: usize = 10;

/// Viewport geometry for a uniform-extent list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowGeometry {
    /// Extent of one item. Always positive.
    pub item_extent: f64,
    pub viewport_extent: f64,
    pub buffer: usize,
}

impl WindowGeometry {
    /// Non-positive or non-finite extents fall back to 1.0.
    pub fn new(item_extent: f64, viewport_extent: f64, buffer: usize) -> Self {
        WindowGeometry {
            item_extent: sanitize_extent(item_extent),
            viewport_extent: viewport_extent.max(0.0),
            buffer,
        }
    }

    /// Indices intersecting `[scroll, scroll + viewport]`, or `None` for an
    /// empty list.
    pub fn visible_range(&self, scroll: f64, len: usize) -> Option<RangeInclusive<usize>> {
        if len == 0 {
            return None;
        }
        let last = len - 1;
        let scroll = scroll.max(0.0);
        let start = ((scroll / self.item_extent).floor() as usize).min(last);
        let end = (((scroll + self.viewport_extent) / self.item_extent).floor() as usize).min(last);
        Some(start..=end)
    }

    /// The visible range widened by `buffer` on both sides, clamped to the list.
    pub fn render_range(&self, scroll: f64, len: usize) -> Option<RangeInclusive<usize>> {
        self.visible_range(scroll, len).map(|visible| {
            let start = visible.start().saturating_sub(self.buffer);
            let end = visible.end().saturating_add(self.buffer).min(len - 1);
            start..=end
        })
    }

    pub fn content_extent(&self, len: usize) -> f64 {
        len as f64 * self.item_extent
    }

    /// Largest scroll offset that still shows a full viewport.
    pub fn max_scroll(&self, len: usize) -> f64 {
        (self.content_extent(len) - self.viewport_extent).max(0.0)
    }
}

pub(crate) fn sanitize_extent(extent: f64) -> f64 {
    if extent.is_finite() && extent > 0.0 {
        extent
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_range_formula() {
        let g = WindowGeometry::new(20.0, 100.0, 10);
        assert_eq!(g.visible_range(0.0, 1000), Some(0..=5));
        assert_eq!(g.visible_range(210.0, 1000), Some(10..=15));
        assert_eq!(g.visible_range(0.0, 3), Some(0..=2));
        assert_eq!(g.visible_range(0.0, 0), None);
    }

    #[test]
    fn test_render_range_is_clamped() {
        let g = WindowGeometry::new(20.0, 100.0, 10);
        assert_eq!(g.render_range(0.0, 1000), Some(0..=15));
        assert_eq!(g.render_range(2000.0, 1000), Some(90..=115));
        assert_eq!(g.render_range(19_900.0, 1000), Some(985..=999));
    }

    #[test]
    fn test_scroll_past_end_stays_in_bounds() {
        let g = WindowGeometry::new(10.0, 50.0, 2);
        assert_eq!(g.visible_range(1e9, 7), Some(6..=6));
        assert_eq!(g.render_range(1e9, 7), Some(4..=6));
        assert_eq!(g.visible_range(-40.0, 7), Some(0..=5));
    }

    #[test]
    fn test_bad_extent_is_sanitized() {
        let g = WindowGeometry::new(0.0, 10.0, 0);
        assert_eq!(g.item_extent, 1.0);
        let g = WindowGeometry::new(f64::NAN, 10.0, 0);
        assert_eq!(g.item_extent, 1.0);
    }

    #[test]
    fn test_content_extent_and_max_scroll() {
        let g = WindowGeometry::new(20.0, 100.0, 10);
        assert_eq!(g.content_extent(50), 1000.0);
        assert_eq!(g.max_scroll(50), 900.0);
        assert_eq!(g.max_scroll(2), 0.0);
    }
}
