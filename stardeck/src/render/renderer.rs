use super::window::{sanitize_extent, WindowGeometry};
use super::{RenderBackend, RowView, ViewportEvent};
use crate::model::ViewMode;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Keeps a backend's mounted nodes equal to the rows the viewport needs.
///
/// In list mode only the render range is mounted and each scroll or resize
/// mounts/unmounts the difference, so work per event is bounded by the
/// window size rather than the list length. Card mode mounts everything.
pub struct WindowedRenderer<B: RenderBackend> {
    backend: B,
    rows: Vec<RowView>,
    geometry: WindowGeometry,
    scroll_offset: f64,
    mode: ViewMode,
    mounted: BTreeMap<usize, B::Node>,
    placeholder: Option<B::Node>,
}

impl<B: RenderBackend> WindowedRenderer<B> {
    pub fn new(backend: B, geometry: WindowGeometry) -> Self {
        let mut renderer = WindowedRenderer {
            backend,
            rows: Vec::new(),
            geometry,
            scroll_offset: 0.0,
            mode: ViewMode::List,
            mounted: BTreeMap::new(),
            placeholder: None,
        };
        renderer.backend.set_content_extent(0.0);
        renderer.sync();
        renderer
    }

    /// Replace the backing list. Always opens the new list at the top.
    pub fn set_data(&mut self, rows: Vec<RowView>) {
        self.rows = rows;
        self.unmount_all();
        self.backend
            .set_content_extent(self.geometry.content_extent(self.rows.len()));
        self.scroll_offset = 0.0;
        self.backend.set_scroll_offset(0.0);
        self.sync();
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if self.mode == mode {
            return;
        }
        log::debug!("Renderer switching to {mode:?} mode");
        self.mode = mode;
        self.unmount_all();
        self.sync();
    }

    /// `set_data` under `mode`, with a single mount pass for both changes.
    pub fn set_data_in_mode(&mut self, rows: Vec<RowView>, mode: ViewMode) {
        if self.mode != mode {
            log::debug!("Renderer switching to {mode:?} mode");
            self.mode = mode;
        }
        self.set_data(rows);
    }

    pub fn handle(&mut self, event: ViewportEvent) {
        match event {
            ViewportEvent::Scroll(offset) => self.scroll_to(offset),
            ViewportEvent::Resize(extent) => {
                self.geometry.viewport_extent = extent.max(0.0);
                if !self.update_item_extent() {
                    self.sync();
                }
            }
            ViewportEvent::LayoutChanged => {
                self.update_item_extent();
            }
        }
    }

    pub fn scroll_to(&mut self, offset: f64) {
        let offset = if offset.is_finite() {
            offset.clamp(0.0, self.geometry.max_scroll(self.rows.len()))
        } else {
            0.0
        };
        self.scroll_offset = offset;
        self.backend.set_scroll_offset(offset);
        self.sync();
    }

    /// Measure a representative row and, if the extent changed, resize the
    /// content and remount what is mounted at the new extent.
    /// Returns whether the extent changed.
    pub fn update_item_extent(&mut self) -> bool {
        let Some(sample) = self.rows.first() else {
            return false;
        };
        let measured = sanitize_extent(self.backend.measure(sample));
        if (measured - self.geometry.item_extent).abs() < f64::EPSILON {
            return false;
        }
        log::debug!(
            "Item extent changed {} -> {}",
            self.geometry.item_extent,
            measured
        );
        self.geometry.item_extent = measured;
        self.backend
            .set_content_extent(self.geometry.content_extent(self.rows.len()));
        self.scroll_offset = self
            .scroll_offset
            .min(self.geometry.max_scroll(self.rows.len()));
        self.unmount_all();
        self.sync();
        true
    }

    pub fn visible_range(&self) -> Option<RangeInclusive<usize>> {
        self.geometry
            .visible_range(self.scroll_offset, self.rows.len())
    }

    pub fn render_range(&self) -> Option<RangeInclusive<usize>> {
        match self.mode {
            ViewMode::Card if !self.rows.is_empty() => Some(0..=self.rows.len() - 1),
            ViewMode::Card => None,
            ViewMode::List => self
                .geometry
                .render_range(self.scroll_offset, self.rows.len()),
        }
    }

    pub fn mounted_indices(&self) -> Vec<usize> {
        self.mounted.keys().copied().collect()
    }

    pub fn mounted_count(&self) -> usize {
        self.mounted.len()
    }

    pub fn has_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    pub fn rows(&self) -> &[RowView] {
        &self.rows
    }

    pub fn geometry(&self) -> &WindowGeometry {
        &self.geometry
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Bring mounted nodes in line with the current render range.
    fn sync(&mut self) {
        let Some(needed) = self.render_range() else {
            self.unmount_all();
            if self.placeholder.is_none() {
                self.placeholder = Some(self.backend.mount_placeholder());
            }
            return;
        };

        if let Some(node) = self.placeholder.take() {
            self.backend.unmount(node);
        }

        let stale: Vec<usize> = self
            .mounted
            .keys()
            .filter(|i| !needed.contains(*i))
            .copied()
            .collect();
        for index in stale {
            if let Some(node) = self.mounted.remove(&index) {
                self.backend.unmount(node);
            }
        }

        for index in needed {
            if self.mounted.contains_key(&index) {
                continue;
            }
            let offset = index as f64 * self.geometry.item_extent;
            let node = self.backend.mount(index, &self.rows[index], offset);
            self.mounted.insert(index, node);
        }
    }

    fn unmount_all(&mut self) {
        for (_, node) in std::mem::take(&mut self.mounted) {
            self.backend.unmount(node);
        }
    }
}
