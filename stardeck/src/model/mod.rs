mod ordered_list;
mod record;
mod view_state;

pub use ordered_list::{apply_custom_order, ListKind, Metadata, OrderedList};
pub use record::{parse_timestamp, Owner, Record, RecordId, FAVORITE_TAG};
pub use view_state::{Filter, SortKey, SystemFilter, ViewMode, ViewState};
