pub mod app;
pub mod config;
pub mod error;
pub mod i18n;
pub mod model;
pub mod mutation;
pub mod presenter;
pub mod query;
pub mod remote;
pub mod render;
pub mod reorder;
pub mod store;

pub use app::{App, AppEvent, Host};
pub use config::Preferences;
pub use error::{Error, Result};
pub use i18n::{Catalog, Language, Translate};
pub use model::{Filter, ListKind, Metadata, Record, RecordId, SortKey, ViewMode, ViewState};
pub use mutation::{Edit, MutationOutcome};
pub use presenter::Presenter;
pub use remote::{MemoryRemote, Remote, RemoteError, SqliteRemote, SyncStats};
pub use render::{RenderBackend, TextBackend, WindowedRenderer};
pub use store::{Refresh, Store};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::app::{App, Host};
    use crate::i18n::{Catalog, Language};
    use crate::model::{ListKind, Owner, Record, RecordId, ViewState};
    use crate::presenter::Presenter;
    use crate::query::SidebarCounts;
    use crate::remote::{derive_metadata, MemoryRemote};
    use crate::render::{TextBackend, WindowGeometry, WindowedRenderer};
    use crate::store::{Refresh, Store};
    use std::sync::{Arc, Mutex};

    /// A record for `owner/name` with fixed timestamps and no user data.
    pub fn record(id: RecordId, full_name: &str) -> Record {
        let (owner, name) = full_name.split_once('/').unwrap_or(("owner", full_name));
        Record {
            id,
            name: name.to_string(),
            full_name: full_name.to_string(),
            alias: None,
            description: None,
            notes: None,
            ai_summary: None,
            tags: Vec::new(),
            language: None,
            stargazers_count: 0,
            pushed_at: "2024-01-01T00:00:00Z".to_string(),
            starred_at: "2024-01-01T00:00:00Z".to_string(),
            owner: Owner {
                login: owner.to_string(),
                avatar_url: format!("https://avatars.example.com/{owner}"),
            },
            html_url: format!("https://github.com/{full_name}"),
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum Shown {
        List(Vec<RecordId>),
        Counts(SidebarCounts),
        Detail(Option<RecordId>),
    }

    pub struct RecordingPresenter {
        shown: Mutex<Vec<Shown>>,
        errors: Mutex<Vec<String>>,
        infos: Mutex<Vec<String>>,
        confirms: Mutex<Vec<String>>,
        answer: Mutex<bool>,
    }

    impl Default for RecordingPresenter {
        fn default() -> Self {
            RecordingPresenter {
                shown: Mutex::new(Vec::new()),
                errors: Mutex::new(Vec::new()),
                infos: Mutex::new(Vec::new()),
                confirms: Mutex::new(Vec::new()),
                answer: Mutex::new(true),
            }
        }
    }

    impl RecordingPresenter {
        pub fn shown(&self) -> Vec<Shown> {
            self.shown.lock().unwrap().clone()
        }

        pub fn last_list(&self) -> Option<Vec<RecordId>> {
            self.shown().into_iter().rev().find_map(|s| match s {
                Shown::List(ids) => Some(ids),
                _ => None,
            })
        }

        pub fn errors(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }

        pub fn infos(&self) -> Vec<String> {
            self.infos.lock().unwrap().clone()
        }

        pub fn confirms(&self) -> Vec<String> {
            self.confirms.lock().unwrap().clone()
        }

        pub fn answer_confirm(&self, answer: bool) {
            *self.answer.lock().unwrap() = answer;
        }

        pub fn clear(&self) {
            self.shown.lock().unwrap().clear();
            self.errors.lock().unwrap().clear();
            self.infos.lock().unwrap().clear();
            self.confirms.lock().unwrap().clear();
        }
    }

    impl Presenter for RecordingPresenter {
        fn render_ordered_list(&self, ids: &[RecordId]) {
            self.shown.lock().unwrap().push(Shown::List(ids.to_vec()));
        }

        fn render_sidebar_counts(&self, counts: &SidebarCounts) {
            self.shown.lock().unwrap().push(Shown::Counts(counts.clone()));
        }

        fn render_detail(&self, record: Option<&Record>) {
            self.shown
                .lock()
                .unwrap()
                .push(Shown::Detail(record.map(|r| r.id)));
        }

        fn notify_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }

        fn notify_info(&self, message: &str) {
            self.infos.lock().unwrap().push(message.to_string());
        }

        fn confirm(&self, prompt: &str) -> bool {
            self.confirms.lock().unwrap().push(prompt.to_string());
            *self.answer.lock().unwrap()
        }
    }

    pub type Fixture = (App<TextBackend>, Arc<MemoryRemote>, Arc<RecordingPresenter>);

    /// An app over a memory remote holding `records`, already loaded and
    /// rendered, with the presenter log cleared.
    pub fn fixture_app(records: Vec<Record>) -> Fixture {
        fixture_app_with(MemoryRemote::new(records))
    }

    pub fn fixture_app_with(remote: MemoryRemote) -> Fixture {
        let remote = Arc::new(remote);
        let presenter = Arc::new(RecordingPresenter::default());

        let records = remote.records();
        let metadata = derive_metadata(
            &records,
            &remote.order(ListKind::Tags),
            &remote.order(ListKind::Languages),
        );
        let mut store = Store::new(ViewState::default());
        store.load(records, metadata);

        let catalog = Catalog::new(Language::En);
        let backend = TextBackend::new(100, &catalog);
        let renderer = WindowedRenderer::new(backend, WindowGeometry::new(1.0, 10.0, 2));
        let app = App::new(store, renderer, remote.clone(), presenter.clone(), Arc::new(catalog));
        app.refresh(Refresh::Full);
        presenter.clear();
        (app, remote, presenter)
    }
}
