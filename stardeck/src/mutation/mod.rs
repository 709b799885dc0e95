//! Optimistic field edits with remote commit and rollback.
//!
//! An edit is validated, applied to the store at once, then sent to the
//! remote. The server's answer replaces the local record; any failure puts
//! back exactly what the edit changed. Edits to the same record run one
//! after another, edits to different records run concurrently.

use crate::app::{lock, Host};
use crate::error::{Error, Result};
use crate::model::{ListKind, Record, RecordId};
use crate::store::Refresh;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const MAX_ALIAS_CHARS: usize = 50;
pub const MAX_NOTES_CHARS: usize = 65_535;
pub const MAX_TAG_CHARS: usize = 30;

/// One user-editable field and its new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edit {
    Alias(Option<String>),
    Notes(Option<String>),
    /// The full replacement tag set, in display order.
    Tags(Vec<String>),
}

impl Edit {
    pub fn field(&self) -> &'static str {
        match self {
            Edit::Alias(_) => "alias",
            Edit::Notes(_) => "notes",
            Edit::Tags(_) => "tags",
        }
    }

    pub fn touches_tags(&self) -> bool {
        matches!(self, Edit::Tags(_))
    }

    /// Check the value against the field limits.
    pub fn validate(&self) -> Result<()> {
        match self {
            Edit::Alias(Some(alias)) => check_length("alias", alias, MAX_ALIAS_CHARS),
            Edit::Notes(Some(notes)) => check_length("notes", notes, MAX_NOTES_CHARS),
            Edit::Alias(None) | Edit::Notes(None) => Ok(()),
            Edit::Tags(tags) => {
                let mut seen = HashSet::with_capacity(tags.len());
                for tag in tags {
                    if tag.trim().is_empty() {
                        return Err(Error::Validation("tags must not be blank".into()));
                    }
                    check_length("tag", tag, MAX_TAG_CHARS)?;
                    if !seen.insert(tag.as_str()) {
                        return Err(Error::Validation(format!("duplicate tag '{tag}'")));
                    }
                }
                Ok(())
            }
        }
    }

    pub fn apply(&self, record: &mut Record) {
        match self {
            Edit::Alias(alias) => record.alias = alias.clone(),
            Edit::Notes(notes) => record.notes = notes.clone(),
            Edit::Tags(tags) => record.tags = tags.clone(),
        }
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(Error::Validation(format!(
            "{field} is {len} characters long, at most {max} allowed"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The server accepted the edit; carries its canonical record.
    Applied(Record),
    /// No record with that id is loaded. Nothing was sent.
    Missing,
}

type Turn = Arc<tokio::sync::Mutex<()>>;

/// Runs edits, one at a time per record id.
#[derive(Default)]
pub struct MutationEngine {
    turns: Mutex<HashMap<RecordId, Turn>>,
}

impl MutationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `edit`, apply it optimistically and commit it remotely.
    ///
    /// Validation failures change nothing and are returned as
    /// [`Error::Validation`]. Remote failures roll the record back and are
    /// returned as [`Error::Remote`]; both are also reported to the presenter.
    pub async fn mutate<H: Host>(
        &self,
        host: &H,
        id: RecordId,
        edit: Edit,
    ) -> Result<MutationOutcome> {
        if let Err(err) = edit.validate() {
            let message = err.to_string();
            host.notify_error("validation.failed", &[("message", message.as_str())]);
            return Err(err);
        }
        self.serialized(host, id, move |_| edit).await
    }

    /// Add or remove the favorite marker. The new tag set is computed from
    /// the record as it stands once earlier edits on it have settled.
    pub async fn toggle_favorite<H: Host>(&self, host: &H, id: RecordId) -> Result<MutationOutcome> {
        self.serialized(host, id, |record| Edit::Tags(record.toggled_favorite_tags()))
            .await
    }

    /// Number of records with an edit in flight or queued.
    pub fn busy_records(&self) -> usize {
        lock(&self.turns).len()
    }

    async fn serialized<H, F>(&self, host: &H, id: RecordId, build: F) -> Result<MutationOutcome>
    where
        H: Host,
        F: FnOnce(&Record) -> Edit,
    {
        let turn = self.turn_for(id);
        let outcome = {
            let _turn = turn.lock().await;
            run(host, id, build).await
        };
        self.release(id, &turn);
        outcome
    }

    fn turn_for(&self, id: RecordId) -> Turn {
        lock(&self.turns).entry(id).or_default().clone()
    }

    /// Drop the id's entry once nobody else is queued on it.
    fn release(&self, id: RecordId, turn: &Turn) {
        let mut turns = lock(&self.turns);
        // One reference in the map, one held by the caller.
        if Arc::strong_count(turn) <= 2 {
            turns.remove(&id);
        }
    }
}

async fn run<H, F>(host: &H, id: RecordId, build: F) -> Result<MutationOutcome>
where
    H: Host,
    F: FnOnce(&Record) -> Edit,
{
    let prepared = host.with_store(|store| {
        let edit = build(store.get(id)?);
        let snapshot = store.snapshot(id, edit.touches_tags())?;
        Some((edit, snapshot))
    });
    let Some((edit, snapshot)) = prepared else {
        log::debug!("Edit on unknown record {id} ignored");
        return Ok(MutationOutcome::Missing);
    };
    if let Err(err) = edit.validate() {
        let message = err.to_string();
        host.notify_error("validation.failed", &[("message", message.as_str())]);
        return Err(err);
    }

    let refresh = host.with_store(|store| {
        let refresh = store.update_record(id, |r| edit.apply(r)).unwrap_or(Refresh::None);
        if store.absorb_record_values(id).is_empty() {
            refresh
        } else {
            Refresh::Full
        }
    });
    host.refresh(refresh);

    match host.remote().patch_record(id, &edit).await {
        Ok(canonical) => {
            let (refresh, grown) = host.with_store(|store| {
                let mut refresh = store.replace_record(canonical.clone()).unwrap_or(Refresh::None);
                let mut grown = store.absorb_record_values(id);
                if !grown.is_empty() {
                    refresh = Refresh::Full;
                }
                // entries appended by the optimistic write still need persisting
                if let Some(before) = &snapshot.tags {
                    let appended = store
                        .ordered_list(ListKind::Tags)
                        .iter()
                        .any(|t| !before.contains(t));
                    if appended && !grown.contains(&ListKind::Tags) {
                        grown.push(ListKind::Tags);
                    }
                }
                (refresh, grown)
            });
            host.refresh(refresh);
            persist_grown_lists(host, &grown).await;
            log::debug!("Edit of {} on record {id} committed", edit.field());
            Ok(MutationOutcome::Applied(canonical))
        }
        Err(err) => {
            log::warn!("Edit of {} on record {id} failed, rolling back: {err}", edit.field());
            let refresh = host.with_store(|store| store.restore(snapshot));
            host.refresh(refresh);
            let message = host.describe(&err);
            host.notify_error(
                "mutation.failed",
                &[("field", edit.field()), ("message", message.as_str())],
            );
            Err(err.into())
        }
    }
}

/// Best effort: a failure here is logged and leaves the edit in place.
async fn persist_grown_lists<H: Host>(host: &H, grown: &[ListKind]) {
    for &kind in grown {
        let order = host.with_store(|store| store.ordered_list(kind).as_slice().to_vec());
        if let Err(err) = host.remote().set_order(kind, &order).await {
            log::warn!("Could not persist the grown {kind} order: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteCall, RemoteError, RemoteOp};
    use crate::test_support::{fixture_app, fixture_app_with, record, Shown};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_validate_limits() {
        assert!(Edit::Alias(Some("a".repeat(50))).validate().is_ok());
        assert!(Edit::Alias(Some("a".repeat(51))).validate().is_err());
        assert!(Edit::Notes(Some("n".repeat(65_536))).validate().is_err());
        assert!(Edit::Tags(vec!["ok".into(), "  ".into()]).validate().is_err());
        assert!(Edit::Tags(vec!["x".repeat(31)]).validate().is_err());
        assert!(Edit::Tags(vec!["dup".into(), "dup".into()]).validate().is_err());
        // Case-sensitive set.
        assert!(Edit::Tags(vec!["Dup".into(), "dup".into()]).validate().is_ok());
        // Limits count characters, not bytes.
        assert!(Edit::Alias(Some("星".repeat(50))).validate().is_ok());
    }

    #[tokio::test]
    async fn test_validation_failure_changes_nothing() {
        let (app, remote, presenter) = fixture_app(vec![record(1, "o/a")]);
        let before = app.with_store(|s| s.get(1).cloned());

        let err = app
            .mutate(1, Edit::Tags(vec!["a".into(), "a".into()]))
            .await
            .unwrap_err();
        assert!(err.is_local_rejection());
        assert_eq!(app.with_store(|s| s.get(1).cloned()), before);
        assert!(remote.calls().iter().all(|c| !matches!(c, RemoteCall::PatchRecord(..))));
        assert_eq!(presenter.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_record_is_a_no_op() {
        let (app, remote, _) = fixture_app(vec![record(1, "o/a")]);
        let outcome = app.mutate(42, Edit::Alias(Some("x".into()))).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Missing);
        assert_eq!(remote.call_count(RemoteOp::PatchRecord), 0);
    }

    #[tokio::test]
    async fn test_failed_edit_restores_record_exactly() {
        let mut original = record(1, "o/a");
        original.alias = Some("Old".into());
        original.tags = vec!["keep".into()];
        let (app, remote, presenter) = fixture_app(vec![original.clone()]);
        let tags_before = app.with_store(|s| s.ordered_list(ListKind::Tags).clone());
        remote.fail_next(RemoteOp::PatchRecord, RemoteError::Unreachable("offline".into()));

        let err = app
            .mutate(1, Edit::Tags(vec!["keep".into(), "brand-new".into()]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Remote(RemoteError::Unreachable(_))));
        let restored = app.with_store(|s| s.get(1).cloned()).unwrap();
        assert_eq!(
            serde_json::to_vec(&restored).unwrap(),
            serde_json::to_vec(&original).unwrap()
        );
        assert_eq!(app.with_store(|s| s.ordered_list(ListKind::Tags).clone()), tags_before);
        assert_eq!(presenter.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_optimistic_value_visible_before_commit() {
        let (app, remote, presenter) = fixture_app(vec![record(1, "o/a")]);
        remote.set_latency(Some(Duration::from_millis(20)));

        let edit = app.mutate(1, Edit::Alias(Some("Fast".into())));
        let peek = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            app.with_store(|s| s.get(1).and_then(|r| r.alias.clone()))
        };
        let (outcome, seen) = tokio::join!(edit, peek);

        assert_eq!(seen.as_deref(), Some("Fast"));
        assert!(matches!(outcome.unwrap(), MutationOutcome::Applied(_)));
        assert!(presenter.shown().iter().any(|s| matches!(s, Shown::List(_))));
    }

    #[tokio::test]
    async fn test_favorite_toggle_scenario() {
        let mut r = record(1, "o/a");
        r.tags = vec!["a".into()];
        let (app, remote, _) = fixture_app(vec![r]);

        app.toggle_favorite(1).await.unwrap();
        let tags = app.with_store(|s| s.get(1).unwrap().tags.clone());
        assert_eq!(tags, vec!["a".to_string(), "_favorite".to_string()]);
        assert!(app.with_store(|s| s.get(1).unwrap().is_favorite()));

        remote.fail_next(RemoteOp::PatchRecord, RemoteError::server("boom"));
        assert!(app.toggle_favorite(1).await.is_err());
        let tags = app.with_store(|s| s.get(1).unwrap().tags.clone());
        assert_eq!(tags, vec!["a".to_string(), "_favorite".to_string()]);
    }

    #[tokio::test]
    async fn test_same_record_edits_are_serialized() {
        let (app, remote, _) = fixture_app(vec![record(1, "o/a")]);
        remote.set_latency(Some(Duration::from_millis(10)));
        remote.fail_next(RemoteOp::PatchRecord, RemoteError::Unreachable("flaky".into()));

        let (first, second) = tokio::join!(
            app.mutate(1, Edit::Alias(Some("First".into()))),
            app.mutate(1, Edit::Alias(Some("Second".into()))),
        );

        assert!(first.is_err());
        assert!(second.is_ok());
        // The first edit's rollback finished before the second captured its
        // snapshot, so it cannot clobber the second's result.
        let alias = app.with_store(|s| s.get(1).unwrap().alias.clone());
        assert_eq!(alias.as_deref(), Some("Second"));
        assert_eq!(remote.record(1).unwrap().alias.as_deref(), Some("Second"));
        assert_eq!(app.mutations().busy_records(), 0);
    }

    #[tokio::test]
    async fn test_rollback_keeps_a_concurrent_tag_reorder() {
        let mut a = record(1, "o/a");
        a.tags = vec!["x".into()];
        let mut b = record(2, "o/b");
        b.tags = vec!["y".into()];
        let (app, remote, _) = fixture_app(vec![a, b]);
        let tags = || app.with_store(|s| s.ordered_list(ListKind::Tags).as_slice().to_vec());
        assert_eq!(tags(), vec!["x".to_string(), "y".to_string()]);
        remote.set_latency(Some(Duration::from_millis(20)));
        remote.fail_next(RemoteOp::PatchRecord, RemoteError::Unreachable("offline".into()));

        let edit = app.mutate(1, Edit::Tags(vec!["x".into(), "z".into()]));
        let reorder = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let order = vec!["y".to_string(), "z".to_string(), "x".to_string()];
            app.reorder().drop_order(&app, ListKind::Tags, order).await
        };
        let (edited, reordered) = tokio::join!(edit, reorder);

        assert!(edited.is_err());
        assert!(reordered.is_ok());
        // "z" was only ever used by the failed edit
        assert_eq!(tags(), vec!["y".to_string(), "x".to_string()]);
        assert_eq!(app.with_store(|s| s.get(1).unwrap().tags.clone()), vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_server_introduced_tag_is_appended_and_persisted() {
        let remote = MemoryRemote::new(vec![record(1, "o/a")]).with_patch_hook(|r| {
            if !r.has_tag("server-added") {
                r.tags.push("server-added".into());
            }
        });
        let (app, remote, _) = fixture_app_with(remote);

        app.mutate(1, Edit::Tags(vec!["mine".into()])).await.unwrap();

        let tags = app.with_store(|s| s.ordered_list(ListKind::Tags).as_slice().to_vec());
        assert_eq!(tags, vec!["mine".to_string(), "server-added".to_string()]);
        assert_eq!(remote.order(ListKind::Tags), tags);
    }

    #[tokio::test]
    async fn test_failed_list_persist_keeps_edit() {
        let (app, remote, _) = fixture_app(vec![record(1, "o/a")]);
        remote.fail_next(RemoteOp::SetOrder, RemoteError::server("busy"));

        let outcome = app.mutate(1, Edit::Tags(vec!["new".into()])).await.unwrap();
        assert!(matches!(outcome, MutationOutcome::Applied(_)));
        assert!(app.with_store(|s| s.get(1).unwrap().has_tag("new")));
        assert!(app.with_store(|s| s.ordered_list(ListKind::Tags).contains("new")));
    }
}
