use crate::model::{Record, RecordId};
use crate::query::SidebarCounts;

/// Told what changed; draws it.
pub trait Presenter: Send + Sync {
    /// The visible ordering after filter, search and sort.
    fn render_ordered_list(&self, ids: &[RecordId]);

    fn render_sidebar_counts(&self, counts: &SidebarCounts);

    /// Redraw only the detail panel. `None` closes it.
    fn render_detail(&self, record: Option<&Record>);

    /// Non-blocking failure notice.
    fn notify_error(&self, message: &str);

    fn notify_info(&self, message: &str);

    /// Ask before a destructive action. `false` cancels it.
    fn confirm(&self, prompt: &str) -> bool;
}
