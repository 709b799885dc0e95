//! Windowed rendering of the projected list.
//!
//! Three layers, kept apart so the index math never depends on how rows are
//! drawn:
//! - [`RowView`]: pure record → view-model mapping
//! - [`WindowGeometry`]: which indices intersect the viewport (plus buffer)
//! - [`WindowedRenderer`]: keeps a [`RenderBackend`]'s mounted nodes in step
//!   with the geometry, touching only the indices that enter or leave

mod renderer;
mod text;
mod window;

pub use renderer::WindowedRenderer;
pub use text::TextBackend;
pub use window::{WindowGeometry, DEFAULT_BUFFER};

use crate::model::{Record, RecordId};
use serde::Serialize;

/// What a single list row displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    pub id: RecordId,
    pub title: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars: u64,
    pub tags: Vec<String>,
    pub favorite: bool,
    pub has_notes: bool,
    pub html_url: String,
    pub avatar_url: String,
}

impl RowView {
    pub fn from_record(record: &Record) -> Self {
        RowView {
            id: record.id,
            title: record.display_name().to_string(),
            full_name: record.full_name.clone(),
            description: record.description.clone().filter(|d| !d.trim().is_empty()),
            language: record.language.clone(),
            stars: record.stargazers_count,
            tags: record.user_tags().map(str::to_string).collect(),
            favorite: record.is_favorite(),
            has_notes: record
                .notes
                .as_deref()
                .map(|n| !n.trim().is_empty())
                .unwrap_or(false),
            html_url: record.html_url.clone(),
            avatar_url: record.owner.avatar_url.clone(),
        }
    }
}

/// Map an ordered view list to row view-models, preserving order.
pub fn rows_for(records: &[&Record]) -> Vec<RowView> {
    records.iter().map(|r| RowView::from_record(r)).collect()
}

/// Input the renderer reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportEvent {
    /// New scroll offset, in the same unit as item extents.
    Scroll(f64),
    /// Viewport extent changed.
    Resize(f64),
    /// Layout changed without a size change (breakpoint, orientation, font).
    LayoutChanged,
}

/// The concrete display technology behind the renderer.
///
/// Every `mount` creates a fresh node; nodes are never reused across indices.
pub trait RenderBackend {
    type Node;

    /// Create the node for list position `index`, placed at `offset`.
    fn mount(&mut self, index: usize, row: &RowView, offset: f64) -> Self::Node;

    fn unmount(&mut self, node: Self::Node);

    /// Create the node shown instead of rows when the list is empty.
    fn mount_placeholder(&mut self) -> Self::Node;

    /// Size the scrollable area to `extent`.
    fn set_content_extent(&mut self, extent: f64);

    fn set_scroll_offset(&mut self, offset: f64);

    /// Lay out `row` off-screen and report its extent.
    fn measure(&mut self, row: &RowView) -> f64;
}
