use super::{RenderBackend, RowView};
use crate::i18n::Translate;
use std::collections::BTreeMap;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Below this many columns rows collapse to a single line.
const COMPACT_BREAKPOINT: usize = 72;

struct TextNode {
    index: usize,
    offset: f64,
    lines: Vec<String>,
}

/// Line-oriented backend for terminals. One extent unit is one line.
pub struct TextBackend {
    width: usize,
    empty_text: String,
    nodes: BTreeMap<u64, TextNode>,
    placeholder: Option<u64>,
    next_id: u64,
    content_extent: f64,
    scroll_offset: f64,
    mounts: usize,
    unmounts: usize,
}

impl TextBackend {
    /// The empty-state line comes from `translator`.
    pub fn new(width: usize, translator: &dyn Translate) -> Self {
        TextBackend {
            width: width.max(1),
            empty_text: translator.translate("list.empty", &[]),
            nodes: BTreeMap::new(),
            placeholder: None,
            next_id: 0,
            content_extent: 0.0,
            scroll_offset: 0.0,
            mounts: 0,
            unmounts: 0,
        }
    }

    /// Change the terminal width. Returns true when the row layout class
    /// changed, in which case the caller should remeasure.
    pub fn set_width(&mut self, width: usize) -> bool {
        let was_compact = self.is_compact();
        self.width = width.max(1);
        was_compact != self.is_compact()
    }

    pub fn is_compact(&self) -> bool {
        self.width < COMPACT_BREAKPOINT
    }

    pub fn lines_per_row(&self) -> usize {
        if self.is_compact() {
            1
        } else {
            2
        }
    }

    /// The `height` lines currently inside the viewport.
    pub fn frame(&self, height: usize) -> Vec<String> {
        if self.placeholder.is_some() {
            return vec![truncate_to_width(&self.empty_text, self.width)];
        }
        let top = self.scroll_offset.floor() as usize;
        let mut out = vec![String::new(); height];
        for node in self.nodes.values() {
            let base = node.offset.round() as usize;
            for (k, line) in node.lines.iter().enumerate() {
                let line_no = base + k;
                if line_no >= top && line_no < top + height {
                    out[line_no - top] = line.clone();
                }
            }
        }
        while out.last().is_some_and(|l| l.is_empty()) {
            out.pop();
        }
        out
    }

    /// List indices that currently have a node.
    pub fn mounted_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.nodes.values().map(|n| n.index).collect();
        indices.sort_unstable();
        indices
    }

    pub fn content_extent(&self) -> f64 {
        self.content_extent
    }

    pub fn mounts(&self) -> usize {
        self.mounts
    }

    pub fn unmounts(&self) -> usize {
        self.unmounts
    }

    fn format_row(&self, row: &RowView) -> Vec<String> {
        let marker = if row.favorite { '★' } else { ' ' };
        let mut head = format!("{marker} {}", row.title);
        if let Some(lang) = &row.language {
            head.push_str(&format!("  [{lang}]"));
        }
        head.push_str(&format!("  ☆{}", row.stars));
        if row.has_notes {
            head.push_str("  ✎");
        }
        for tag in &row.tags {
            head.push_str(&format!(" #{tag}"));
        }

        let mut lines = vec![truncate_to_width(&head, self.width)];
        if !self.is_compact() {
            let detail = row.description.as_deref().unwrap_or(&row.full_name);
            let detail = detail.replace(['\n', '\r'], " ");
            lines.push(truncate_to_width(&format!("    {detail}"), self.width));
        }
        lines
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for TextBackend {
    type Node = u64;

    fn mount(&mut self, index: usize, row: &RowView, offset: f64) -> u64 {
        let id = self.allocate();
        let lines = self.format_row(row);
        self.nodes.insert(id, TextNode { index, offset, lines });
        self.mounts += 1;
        id
    }

    fn unmount(&mut self, node: u64) {
        if self.placeholder == Some(node) {
            self.placeholder = None;
            return;
        }
        if self.nodes.remove(&node).is_some() {
            self.unmounts += 1;
        }
    }

    fn mount_placeholder(&mut self) -> u64 {
        let id = self.allocate();
        self.placeholder = Some(id);
        id
    }

    fn set_content_extent(&mut self, extent: f64) {
        self.content_extent = extent;
    }

    fn set_scroll_offset(&mut self, offset: f64) {
        self.scroll_offset = offset;
    }

    fn measure(&mut self, row: &RowView) -> f64 {
        self.format_row(row).len() as f64
    }
}

/// Cut `s` to at most `width` display columns, marking the cut with `…`.
pub(crate) fn truncate_to_width(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}
