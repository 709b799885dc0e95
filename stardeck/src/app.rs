use crate::error::Result;
use crate::i18n::Translate;
use crate::model::{Filter, ListKind, Record, RecordId, SortKey, ViewMode};
use crate::mutation::{Edit, MutationEngine, MutationOutcome};
use crate::presenter::Presenter;
use crate::query::{project, sidebar_counts};
use crate::remote::{Remote, RemoteError, SyncStats};
use crate::render::{rows_for, RenderBackend, ViewportEvent, WindowedRenderer};
use crate::reorder::ReorderController;
use crate::store::{Refresh, Store};
use std::sync::{Arc, Mutex, MutexGuard};

/// What the mutation and reorder flows need from whoever owns the state.
pub trait Host {
    /// Run `f` with exclusive access to the store. Must not be called
    /// re-entrantly and never spans a remote call.
    fn with_store<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R;

    /// Bring the presentation up to date after a store write.
    fn refresh(&self, scope: Refresh);

    fn remote(&self) -> &dyn Remote;

    fn presenter(&self) -> &dyn Presenter;

    fn translator(&self) -> &dyn Translate;

    fn notify_error(&self, key: &str, params: &[(&str, &str)]) {
        let message = self.translator().translate(key, params);
        self.presenter().notify_error(&message);
    }

    fn notify_info(&self, key: &str, params: &[(&str, &str)]) {
        let message = self.translator().translate(key, params);
        self.presenter().notify_info(&message);
    }

    /// User-facing text for a remote failure. Rejections carry the server's
    /// own message.
    fn describe(&self, err: &RemoteError) -> String {
        match err {
            RemoteError::Rejected { message, .. } => message.clone(),
            RemoteError::Unreachable(_) => self.translator().translate("error.network", &[]),
            RemoteError::Server(message) => self
                .translator()
                .translate("error.server", &[("message", message.as_str())]),
        }
    }
}

/// A UI event.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    SetFilter(Filter),
    SetSort(SortKey),
    Search(String),
    SetViewMode(ViewMode),
    Select(Option<RecordId>),
    ClosePanel,
    Viewport(ViewportEvent),
    Edit { id: RecordId, edit: Edit },
    ToggleFavorite(RecordId),
    Reorder { kind: ListKind, order: Vec<String> },
    MoveItem { kind: ListKind, name: String, to: usize },
    DeleteTag(String),
    Reload,
    Sync,
}

/// Owns the store, the renderer and the collaborators. Every UI event
/// enters through [`App::dispatch`].
pub struct App<B: RenderBackend> {
    store: Mutex<Store>,
    renderer: Mutex<WindowedRenderer<B>>,
    remote: Arc<dyn Remote>,
    presenter: Arc<dyn Presenter>,
    translator: Arc<dyn Translate>,
    mutations: MutationEngine,
    reorder: ReorderController,
}

impl<B: RenderBackend> App<B> {
    pub fn new(
        store: Store,
        renderer: WindowedRenderer<B>,
        remote: Arc<dyn Remote>,
        presenter: Arc<dyn Presenter>,
        translator: Arc<dyn Translate>,
    ) -> Self {
        App {
            store: Mutex::new(store),
            renderer: Mutex::new(renderer),
            remote,
            presenter,
            translator,
            mutations: MutationEngine::new(),
            reorder: ReorderController::new(),
        }
    }

    pub async fn dispatch(&self, event: AppEvent) -> Result<()> {
        log::debug!("Dispatching {event:?}");
        match event {
            AppEvent::SetFilter(filter) => self.update_view(|s| s.set_filter(filter)),
            AppEvent::SetSort(sort) => self.update_view(|s| s.set_sort(sort)),
            AppEvent::Search(query) => self.update_view(|s| s.set_search_query(query)),
            AppEvent::SetViewMode(mode) => self.update_view(|s| s.set_view_mode(mode)),
            AppEvent::Select(id) => self.update_view(|s| s.select(id)),
            AppEvent::ClosePanel => self.update_view(|s| s.set_panel_open(false)),
            AppEvent::Viewport(event) => lock(&self.renderer).handle(event),
            AppEvent::Edit { id, edit } => {
                self.mutate(id, edit).await?;
            }
            AppEvent::ToggleFavorite(id) => {
                self.toggle_favorite(id).await?;
            }
            AppEvent::Reorder { kind, order } => self.reorder.drop_order(self, kind, order).await?,
            AppEvent::MoveItem { kind, name, to } => {
                self.reorder.move_item(self, kind, &name, to).await?
            }
            AppEvent::DeleteTag(name) => {
                self.reorder.delete_tag(self, &name).await?;
            }
            AppEvent::Reload => self.load().await?,
            AppEvent::Sync => {
                self.sync().await?;
            }
        }
        Ok(())
    }

    /// Fetch everything from the remote and replace the store contents.
    pub async fn load(&self) -> Result<()> {
        reload(self).await
    }

    pub async fn mutate(&self, id: RecordId, edit: Edit) -> Result<MutationOutcome> {
        self.mutations.mutate(self, id, edit).await
    }

    pub async fn toggle_favorite(&self, id: RecordId) -> Result<MutationOutcome> {
        self.mutations.toggle_favorite(self, id).await
    }

    /// Ask the remote to reconcile with upstream, then reload.
    pub async fn sync(&self) -> Result<SyncStats> {
        match self.remote.trigger_sync().await {
            Ok(stats) => {
                log::info!(
                    "Sync finished: added={} updated={} removed={}",
                    stats.added,
                    stats.updated,
                    stats.removed
                );
                let (added, updated, removed) = (
                    stats.added.to_string(),
                    stats.updated.to_string(),
                    stats.removed.to_string(),
                );
                self.notify_info(
                    "sync.done",
                    &[
                        ("added", added.as_str()),
                        ("updated", updated.as_str()),
                        ("removed", removed.as_str()),
                    ],
                );
                self.load().await?;
                Ok(stats)
            }
            Err(err) => {
                log::warn!("Sync failed: {err}");
                let message = self.describe(&err);
                self.notify_error("sync.failed", &[("message", message.as_str())]);
                Err(err.into())
            }
        }
    }

    pub fn mutations(&self) -> &MutationEngine {
        &self.mutations
    }

    pub fn reorder(&self) -> &ReorderController {
        &self.reorder
    }

    /// Run `f` with the renderer.
    pub fn with_renderer<R>(&self, f: impl FnOnce(&mut WindowedRenderer<B>) -> R) -> R {
        f(&mut lock(&self.renderer))
    }

    fn update_view(&self, f: impl FnOnce(&mut Store) -> Refresh) {
        let scope = self.with_store(f);
        self.refresh(scope);
    }

    fn refresh_full(&self) {
        let (ids, rows, counts, mode, selected) = {
            let store = lock(&self.store);
            let visible = project(store.records(), store.view());
            let ids: Vec<RecordId> = visible.iter().map(|r| r.id).collect();
            (
                ids,
                rows_for(&visible),
                sidebar_counts(store.records(), store.metadata()),
                store.view().view_mode,
                store
                    .view()
                    .panel_open
                    .then(|| store.selected_record().cloned())
                    .flatten(),
            )
        };
        lock(&self.renderer).set_data_in_mode(rows, mode);
        self.presenter.render_ordered_list(&ids);
        self.presenter.render_sidebar_counts(&counts);
        self.presenter.render_detail(selected.as_ref());
    }

    fn refresh_detail(&self) {
        let selected: Option<Record> = {
            let store = lock(&self.store);
            if store.view().panel_open {
                store.selected_record().cloned()
            } else {
                None
            }
        };
        self.presenter.render_detail(selected.as_ref());
    }
}

impl<B: RenderBackend> Host for App<B> {
    fn with_store<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        f(&mut lock(&self.store))
    }

    fn refresh(&self, scope: Refresh) {
        match scope {
            Refresh::None => {}
            Refresh::Detail => self.refresh_detail(),
            Refresh::Full => self.refresh_full(),
        }
    }

    fn remote(&self) -> &dyn Remote {
        self.remote.as_ref()
    }

    fn presenter(&self) -> &dyn Presenter {
        self.presenter.as_ref()
    }

    fn translator(&self) -> &dyn Translate {
        self.translator.as_ref()
    }
}

/// Replace the store with a fresh remote snapshot.
pub(crate) async fn reload<H: Host>(host: &H) -> Result<()> {
    let snapshot = host.remote().fetch_all().await?;
    log::info!("Fetched {} records", snapshot.records.len());
    let scope = host.with_store(|store| store.load(snapshot.records, snapshot.metadata));
    host.refresh(scope);
    Ok(())
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SystemFilter;
    use crate::remote::{RemoteOp, MemoryRemote};
    use crate::test_support::{fixture_app, fixture_app_with, record, Shown};
    use pretty_assertions::assert_eq;

    fn two_records() -> Vec<Record> {
        let mut a = record(1, "o/a");
        a.tags = vec!["_favorite".into()];
        a.starred_at = "2024-01-01T00:00:00Z".into();
        let mut b = record(2, "o/b");
        b.starred_at = "2024-06-01T00:00:00Z".into();
        vec![a, b]
    }

    #[tokio::test]
    async fn test_two_record_scenario() {
        let (app, _, presenter) = fixture_app(two_records());

        app.dispatch(AppEvent::SetFilter(Filter::System(SystemFilter::Constellation)))
            .await
            .unwrap();
        assert_eq!(presenter.last_list(), Some(vec![1]));

        app.dispatch(AppEvent::SetFilter(Filter::System(SystemFilter::All)))
            .await
            .unwrap();
        assert_eq!(presenter.last_list(), Some(vec![2, 1]));
        assert_eq!(app.with_renderer(|r| r.rows().len()), 2);
    }

    #[tokio::test]
    async fn test_selection_only_refreshes_detail() {
        let (app, _, presenter) = fixture_app(two_records());
        presenter.clear();

        app.dispatch(AppEvent::Select(Some(2))).await.unwrap();
        let shown = presenter.shown();
        assert_eq!(shown.len(), 1);
        assert!(matches!(&shown[0], Shown::Detail(Some(2))));

        app.dispatch(AppEvent::ClosePanel).await.unwrap();
        assert!(matches!(presenter.shown().last(), Some(Shown::Detail(None))));
    }

    #[tokio::test]
    async fn test_full_refresh_keeps_closed_panel_closed() {
        let (app, _, presenter) = fixture_app(two_records());
        app.dispatch(AppEvent::Select(Some(2))).await.unwrap();
        app.dispatch(AppEvent::ClosePanel).await.unwrap();
        presenter.clear();

        app.dispatch(AppEvent::Search("o".into())).await.unwrap();
        assert!(matches!(presenter.shown().last(), Some(Shown::Detail(None))));

        app.dispatch(AppEvent::Select(Some(1))).await.unwrap();
        app.dispatch(AppEvent::SetSort(SortKey::Name)).await.unwrap();
        assert!(matches!(presenter.shown().last(), Some(Shown::Detail(Some(1)))));
    }

    #[tokio::test]
    async fn test_view_mode_change_mounts_only_the_new_window() {
        let records = (1..=100).map(|i| record(i, &format!("o/repo-{i}"))).collect();
        let (app, _, _) = fixture_app(records);
        app.dispatch(AppEvent::SetViewMode(ViewMode::Card)).await.unwrap();
        assert_eq!(app.with_renderer(|r| r.mounted_count()), 100);

        let before = app.with_renderer(|r| r.backend().mounts());
        app.dispatch(AppEvent::SetViewMode(ViewMode::List)).await.unwrap();
        let (mounts, mounted) = app.with_renderer(|r| (r.backend().mounts(), r.mounted_count()));
        assert!(mounted < 100);
        assert_eq!(mounts - before, mounted);
    }

    #[tokio::test]
    async fn test_search_event_resets_scroll() {
        let records = (1..=100).map(|i| record(i, &format!("o/repo-{i}"))).collect();
        let (app, _, _) = fixture_app(records);
        app.dispatch(AppEvent::Viewport(ViewportEvent::Scroll(40.0)))
            .await
            .unwrap();
        assert_eq!(app.with_renderer(|r| r.scroll_offset()), 40.0);

        app.dispatch(AppEvent::Search("repo-1".into())).await.unwrap();
        assert_eq!(app.with_renderer(|r| r.scroll_offset()), 0.0);
    }

    #[tokio::test]
    async fn test_load_replaces_store() {
        let remote = MemoryRemote::new(two_records());
        let (app, _, presenter) = fixture_app_with(remote);
        app.with_store(|s| s.load(Vec::new(), Default::default()));

        app.dispatch(AppEvent::Reload).await.unwrap();
        assert_eq!(app.with_store(|s| s.len()), 2);
        assert_eq!(presenter.last_list(), Some(vec![2, 1]));
    }

    #[tokio::test]
    async fn test_sync_reports_and_reloads() {
        let (app, remote, presenter) = fixture_app(two_records());
        remote.set_upstream(vec![record(2, "o/b"), record(3, "o/c")]);

        let stats = app.sync().await.unwrap();
        assert_eq!((stats.added, stats.removed), (1, 1));
        assert_eq!(app.with_store(|s| s.len()), 2);
        assert!(app.with_store(|s| s.get(3).is_some()));
        assert_eq!(presenter.infos().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_failure_is_surfaced() {
        let (app, remote, presenter) = fixture_app(two_records());
        remote.set_upstream(Vec::new());
        remote.fail_next(RemoteOp::TriggerSync, RemoteError::Unreachable("dns".into()));

        assert!(app.dispatch(AppEvent::Sync).await.is_err());
        assert_eq!(app.with_store(|s| s.len()), 2);
        assert_eq!(
            presenter.errors(),
            vec!["Sync failed: Network unreachable, please check your connection".to_string()]
        );
    }
}
