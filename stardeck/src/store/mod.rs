use crate::model::{
    Filter, ListKind, Metadata, OrderedList, Record, RecordId, SortKey, ViewMode, ViewState,
};
use std::collections::HashMap;

/// A piece of state a write touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    Records,
    Metadata,
    Filter,
    Sort,
    SearchQuery,
    ViewMode,
    Selection,
    PanelOpen,
}

/// How much of the presentation a state change invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Refresh {
    None,
    /// Only the detail panel needs redrawing.
    Detail,
    /// Re-run the query pipeline and reset the list.
    Full,
}

impl Refresh {
    /// Selection and panel state only affect the detail panel; anything else
    /// changes what the list shows.
    pub fn for_keys(keys: &[StateKey]) -> Refresh {
        if keys.is_empty() {
            return Refresh::None;
        }
        let detail_only = keys
            .iter()
            .all(|k| matches!(k, StateKey::Selection | StateKey::PanelOpen));
        if detail_only {
            Refresh::Detail
        } else {
            Refresh::Full
        }
    }

    pub fn merge(self, other: Refresh) -> Refresh {
        self.max(other)
    }
}

/// A pre-mutation copy of one record, plus the tag list when the
/// mutation touches tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackSnapshot {
    pub record: Record,
    pub tags: Option<OrderedList>,
}

/// The only holder of records, metadata and view state. Every write
/// reports how much of the presentation has to be refreshed.
#[derive(Debug, Default)]
pub struct Store {
    records: Vec<Record>,
    index: HashMap<RecordId, usize>,
    metadata: Metadata,
    view: ViewState,
    revision: u64,
}

impl Store {
    pub fn new(view: ViewState) -> Self {
        Store {
            view,
            ..Store::default()
        }
    }

    /// Replace all records and metadata. Later duplicates of an id are dropped.
    /// Tag and language values seen in the records but missing from the
    /// metadata are appended to the ordered lists.
    pub fn load(&mut self, records: Vec<Record>, metadata: Metadata) -> Refresh {
        let mut index = HashMap::with_capacity(records.len());
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if index.contains_key(&record.id) {
                log::warn!("Dropping duplicate record id {} on load", record.id);
                continue;
            }
            index.insert(record.id, kept.len());
            kept.push(record);
        }

        let mut metadata = metadata;
        metadata.absorb_observed(&kept);

        // A selection pointing at a record that vanished is cleared.
        if let Some(selected) = self.view.selection {
            if !index.contains_key(&selected) {
                self.view.selection = None;
                self.view.panel_open = false;
            }
        }

        log::debug!(
            "Store loaded {} records, {} tags, {} languages",
            kept.len(),
            metadata.tags.len(),
            metadata.languages.len()
        );

        self.records = kept;
        self.index = index;
        self.metadata = metadata;
        self.bump(&[StateKey::Records, StateKey::Metadata])
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.index.get(&id).map(|&i| &self.records[i])
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn ordered_list(&self, kind: ListKind) -> &OrderedList {
        self.metadata.list(kind)
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Monotonic counter bumped on every effective write.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn selected_record(&self) -> Option<&Record> {
        self.view.selection.and_then(|id| self.get(id))
    }

    // ── Record writes ──────────────────────────────────────────────

    /// Apply `f` to the record in place. Returns `None` when the id is unknown.
    pub fn update_record<F>(&mut self, id: RecordId, f: F) -> Option<Refresh>
    where
        F: FnOnce(&mut Record),
    {
        let idx = *self.index.get(&id)?;
        let record = &mut self.records[idx];
        f(record);
        // The id is immutable whatever the closure did.
        record.id = id;
        Some(self.bump(&[StateKey::Records]))
    }

    /// Replace a record wholesale with the server's canonical copy.
    pub fn replace_record(&mut self, record: Record) -> Option<Refresh> {
        let idx = *self.index.get(&record.id)?;
        if self.records[idx] == record {
            return Some(Refresh::None);
        }
        self.records[idx] = record;
        Some(self.bump(&[StateKey::Records]))
    }

    /// Deep copy of a record (and the tag list if `with_tags`) for rollback.
    pub fn snapshot(&self, id: RecordId, with_tags: bool) -> Option<RollbackSnapshot> {
        let record = self.get(id)?.clone();
        let tags = with_tags.then(|| self.metadata.tags.clone());
        Some(RollbackSnapshot { record, tags })
    }

    /// Put the record back as captured. Tag entries appended since the
    /// snapshot that no record uses any more are dropped; the order of the
    /// remaining entries is left alone, so a reorder made meanwhile survives.
    pub fn restore(&mut self, snapshot: RollbackSnapshot) -> Refresh {
        let mut keys = Vec::new();
        if let Some(&idx) = self.index.get(&snapshot.record.id) {
            self.records[idx] = snapshot.record;
            keys.push(StateKey::Records);
        } else {
            log::warn!(
                "Rollback target {} no longer in store; skipping record restore",
                snapshot.record.id
            );
        }
        if let Some(before) = snapshot.tags {
            let stale: Vec<String> = self
                .metadata
                .tags
                .iter()
                .filter(|t| !before.contains(t) && !self.records.iter().any(|r| r.has_tag(t)))
                .map(str::to_string)
                .collect();
            for tag in &stale {
                self.metadata.tags.remove(tag);
            }
            if !stale.is_empty() {
                keys.push(StateKey::Metadata);
            }
        }
        self.bump(&keys)
    }

    /// Number of records that still carry `tag`.
    pub fn tag_usage(&self, tag: &str) -> usize {
        self.records.iter().filter(|r| r.has_tag(tag)).count()
    }

    // ── Metadata writes ────────────────────────────────────────────

    /// Overwrite an ordered list. The caller is responsible for validation.
    pub fn set_order(&mut self, kind: ListKind, order: Vec<String>) -> Refresh {
        let list = OrderedList::new(order);
        if self.metadata.list(kind) == &list {
            return Refresh::None;
        }
        *self.metadata.list_mut(kind) = list;
        self.bump(&[StateKey::Metadata])
    }

    /// Append values the lists have not seen yet. Returns the kinds that grew.
    pub fn absorb_record_values(&mut self, id: RecordId) -> Vec<ListKind> {
        let Some(&idx) = self.index.get(&id) else {
            return Vec::new();
        };
        let grown = self.metadata.absorb_observed([&self.records[idx]]);
        if !grown.is_empty() {
            self.bump(&[StateKey::Metadata]);
        }
        grown
    }

    pub fn remove_tag_entry(&mut self, name: &str) -> Refresh {
        if self.metadata.tags.remove(name) {
            self.bump(&[StateKey::Metadata])
        } else {
            Refresh::None
        }
    }

    // ── View state ─────────────────────────────────────────────────

    pub fn set_filter(&mut self, filter: Filter) -> Refresh {
        if self.view.filter == filter {
            return Refresh::None;
        }
        self.view.filter = filter;
        self.bump(&[StateKey::Filter])
    }

    pub fn set_sort(&mut self, sort: SortKey) -> Refresh {
        if self.view.sort == sort {
            return Refresh::None;
        }
        self.view.sort = sort;
        self.bump(&[StateKey::Sort])
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) -> Refresh {
        let query = query.into();
        if self.view.search_query == query {
            return Refresh::None;
        }
        self.view.search_query = query;
        self.bump(&[StateKey::SearchQuery])
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> Refresh {
        if self.view.view_mode == mode {
            return Refresh::None;
        }
        self.view.view_mode = mode;
        self.bump(&[StateKey::ViewMode])
    }

    /// Select a record (or clear the selection). Opening the panel follows
    /// the selection.
    pub fn select(&mut self, id: Option<RecordId>) -> Refresh {
        let id = id.filter(|id| self.index.contains_key(id));
        let panel_open = id.is_some();
        let mut keys = Vec::new();
        if self.view.selection != id {
            self.view.selection = id;
            keys.push(StateKey::Selection);
        }
        if self.view.panel_open != panel_open {
            self.view.panel_open = panel_open;
            keys.push(StateKey::PanelOpen);
        }
        self.bump(&keys)
    }

    pub fn set_panel_open(&mut self, open: bool) -> Refresh {
        if self.view.panel_open == open {
            return Refresh::None;
        }
        self.view.panel_open = open;
        self.bump(&[StateKey::PanelOpen])
    }

    fn bump(&mut self, keys: &[StateKey]) -> Refresh {
        let refresh = Refresh::for_keys(keys);
        if refresh != Refresh::None {
            self.revision += 1;
        }
        refresh
    }
}
