use crate::app::{reload, Host};
use crate::error::{Error, Result};
use crate::model::{ListKind, FAVORITE_TAG};
use crate::store::Refresh;

/// Applies reorders optimistically and persists them. Drops on the same list
/// are persisted in the order they happened.
#[derive(Default)]
pub struct ReorderController {
    tags: tokio::sync::Mutex<()>,
    languages: tokio::sync::Mutex<()>,
}

impl ReorderController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the order of `kind` with `order`, which must be a permutation
    /// of the current list.
    ///
    /// On a remote failure the local order is not rolled back; the whole
    /// snapshot is refetched instead. If that refetch fails too the
    /// optimistic order stays.
    pub async fn drop_order<H: Host>(&self, host: &H, kind: ListKind, order: Vec<String>) -> Result<()> {
        let _turn = self.turn(kind).lock().await;

        let valid = host.with_store(|store| store.ordered_list(kind).is_permutation(&order));
        if !valid {
            let list = list_label(host, kind);
            host.notify_error("reorder.invalid", &[("list", list.as_str())]);
            return Err(Error::Validation(format!(
                "new {kind} order is not a permutation of the current list"
            )));
        }

        let scope = host.with_store(|store| store.set_order(kind, order.clone()));
        if scope == Refresh::None {
            log::debug!("{kind} order unchanged, nothing to persist");
            return Ok(());
        }
        host.refresh(scope);

        match host.remote().set_order(kind, &order).await {
            Ok(()) => {
                log::debug!("Persisted {kind} order ({} entries)", order.len());
                Ok(())
            }
            Err(err) => {
                log::warn!("Persisting {kind} order failed, refetching: {err}");
                let list = list_label(host, kind);
                let message = host.describe(&err);
                host.notify_error(
                    "reorder.failed",
                    &[("list", list.as_str()), ("message", message.as_str())],
                );
                if let Err(refetch_err) = reload(host).await {
                    log::error!("Refetch after failed reorder also failed: {refetch_err}");
                    let message = match &refetch_err {
                        Error::Remote(remote) => host.describe(remote),
                        other => other.to_string(),
                    };
                    host.notify_error("reload.failed", &[("message", message.as_str())]);
                }
                Err(err.into())
            }
        }
    }

    /// Move `name` to `to_index` (clamped to the end of the list).
    pub async fn move_item<H: Host>(
        &self,
        host: &H,
        kind: ListKind,
        name: &str,
        to_index: usize,
    ) -> Result<()> {
        let order = host.with_store(|store| {
            let mut order = store.ordered_list(kind).as_slice().to_vec();
            let from = order.iter().position(|n| n == name)?;
            let item = order.remove(from);
            order.insert(to_index.min(order.len()), item);
            Some(order)
        });
        let Some(order) = order else {
            let list = list_label(host, kind);
            host.notify_error("reorder.invalid", &[("list", list.as_str())]);
            return Err(Error::Validation(format!("'{name}' is not in the {kind} list")));
        };
        self.drop_order(host, kind, order).await
    }

    /// Delete a tag after confirmation. Returns whether it was deleted;
    /// `false` means the user cancelled.
    ///
    /// Blank, reserved and unknown names fail validation, and a tag still
    /// carried by any record is refused locally. Neither reaches the remote.
    pub async fn delete_tag<H: Host>(&self, host: &H, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            host.notify_error("tag.blank", &[]);
            return Err(Error::Validation("tag name must not be blank".into()));
        }
        if name == FAVORITE_TAG {
            host.notify_error("tag.reserved", &[("name", name)]);
            return Err(Error::Validation(format!("'{name}' is reserved")));
        }

        let (known, usage) = host.with_store(|store| {
            (
                store.ordered_list(ListKind::Tags).contains(name),
                store.tag_usage(name),
            )
        });
        if usage > 0 {
            let count = usage.to_string();
            host.notify_error("tag.in_use", &[("name", name), ("count", count.as_str())]);
            return Err(Error::TagInUse {
                name: name.to_string(),
                count: usage,
            });
        }
        if !known {
            host.notify_error("tag.unknown", &[("name", name)]);
            return Err(Error::Validation(format!("unknown tag '{name}'")));
        }

        let prompt = host.translator().translate("tag.confirm_delete", &[("name", name)]);
        if !host.presenter().confirm(&prompt) {
            log::debug!("Deletion of tag '{name}' cancelled");
            return Ok(false);
        }

        let _turn = self.tags.lock().await;
        match host.remote().delete_tag(name).await {
            Ok(()) => {
                let scope = host.with_store(|store| store.remove_tag_entry(name));
                host.refresh(scope);
                host.notify_info("tag.deleted", &[("name", name)]);
                log::info!("Deleted tag '{name}'");
                Ok(true)
            }
            Err(err) => {
                log::warn!("Deleting tag '{name}' failed: {err}");
                let message = host.describe(&err);
                host.notify_error(
                    "tag.delete_failed",
                    &[("name", name), ("message", message.as_str())],
                );
                Err(err.into())
            }
        }
    }

    fn turn(&self, kind: ListKind) -> &tokio::sync::Mutex<()> {
        match kind {
            ListKind::Tags => &self.tags,
            ListKind::Languages => &self.languages,
        }
    }
}

fn list_label<H: Host>(host: &H, kind: ListKind) -> String {
    let key = match kind {
        ListKind::Tags => "list.tags",
        ListKind::Languages => "list.languages",
    };
    host.translator().translate(key, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteCall, RemoteError, RemoteOp};
    use crate::test_support::{fixture_app, fixture_app_with, record};
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn tagged_remote() -> MemoryRemote {
        let mut a = record(1, "o/a");
        a.tags = names(&["x"]);
        a.language = Some("Rust".into());
        let mut b = record(2, "o/b");
        b.language = Some("Go".into());
        MemoryRemote::new(vec![a, b])
            .with_order(ListKind::Tags, names(&["x", "y", "z"]))
            .with_order(ListKind::Languages, names(&["Rust", "Go"]))
    }

    fn current(app: &impl Host, kind: ListKind) -> Vec<String> {
        app.with_store(|s| s.ordered_list(kind).as_slice().to_vec())
    }

    #[tokio::test]
    async fn test_drop_order_persists() {
        let (app, remote, _) = fixture_app_with(tagged_remote());
        app.reorder()
            .drop_order(&app, ListKind::Languages, names(&["Go", "Rust"]))
            .await
            .unwrap();
        assert_eq!(current(&app, ListKind::Languages), names(&["Go", "Rust"]));
        assert_eq!(remote.order(ListKind::Languages), names(&["Go", "Rust"]));
    }

    #[tokio::test]
    async fn test_non_permutation_is_rejected() {
        let (app, remote, presenter) = fixture_app_with(tagged_remote());
        let err = app
            .reorder()
            .drop_order(&app, ListKind::Tags, names(&["x", "y"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(current(&app, ListKind::Tags), names(&["x", "y", "z"]));
        assert_eq!(remote.call_count(RemoteOp::SetOrder), 0);
        assert_eq!(presenter.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reorder_refetches() {
        let (app, remote, presenter) = fixture_app_with(tagged_remote());
        remote.fail_next(RemoteOp::SetOrder, RemoteError::server("disk full"));

        let result = app
            .reorder()
            .drop_order(&app, ListKind::Tags, names(&["z", "x", "y"]))
            .await;
        assert!(result.is_err());
        // Server state came back through the refetch.
        assert_eq!(current(&app, ListKind::Tags), names(&["x", "y", "z"]));
        assert_eq!(remote.call_count(RemoteOp::FetchAll), 1);
        assert_eq!(presenter.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_optimistic_order() {
        let (app, remote, presenter) = fixture_app_with(tagged_remote());
        remote.fail_next(RemoteOp::SetOrder, RemoteError::server("disk full"));
        remote.fail_next(RemoteOp::FetchAll, RemoteError::Unreachable("gone".into()));

        let result = app
            .reorder()
            .drop_order(&app, ListKind::Tags, names(&["z", "x", "y"]))
            .await;
        assert!(result.is_err());
        assert_eq!(current(&app, ListKind::Tags), names(&["z", "x", "y"]));
        assert_eq!(presenter.errors().len(), 2);
    }

    #[tokio::test]
    async fn test_move_item() {
        let (app, remote, _) = fixture_app_with(tagged_remote());
        app.reorder()
            .move_item(&app, ListKind::Tags, "x", 99)
            .await
            .unwrap();
        assert_eq!(current(&app, ListKind::Tags), names(&["y", "z", "x"]));
        assert_eq!(remote.order(ListKind::Tags), names(&["y", "z", "x"]));

        assert!(app
            .reorder()
            .move_item(&app, ListKind::Tags, "nope", 0)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_tag_in_use_never_reaches_remote() {
        let (app, remote, presenter) = fixture_app_with(tagged_remote());

        let err = app.reorder().delete_tag(&app, "x").await.unwrap_err();
        assert!(matches!(err, Error::TagInUse { count: 1, .. }));
        assert!(presenter.confirms().is_empty());
        assert!(remote.calls().iter().all(|c| !matches!(c, RemoteCall::DeleteTag(_))));
        assert_eq!(current(&app, ListKind::Tags), names(&["x", "y", "z"]));
        assert_eq!(
            presenter.errors(),
            vec!["Tag 'x' is still used by 1 repositories".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_tag_after_confirmation() {
        let (app, remote, presenter) = fixture_app_with(tagged_remote());

        presenter.answer_confirm(false);
        assert!(!app.reorder().delete_tag(&app, "y").await.unwrap());
        assert_eq!(remote.call_count(RemoteOp::DeleteTag), 0);

        presenter.answer_confirm(true);
        assert!(app.reorder().delete_tag(&app, "y").await.unwrap());
        assert_eq!(current(&app, ListKind::Tags), names(&["x", "z"]));
        assert_eq!(remote.order(ListKind::Tags), names(&["x", "z"]));
        assert_eq!(presenter.confirms(), vec!["Delete tag 'y'?".to_string(); 2]);
    }

    #[tokio::test]
    async fn test_delete_tag_validation() {
        let (app, remote, presenter) = fixture_app(vec![record(1, "o/a")]);
        for bad in ["", "  ", "_favorite", "missing"] {
            let err = app.reorder().delete_tag(&app, bad).await.unwrap_err();
            assert!(err.is_local_rejection(), "{bad:?}");
        }
        let errors = presenter.errors();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0], "Tag name cannot be empty");
        assert_eq!(errors[1], errors[0]);
        assert_eq!(remote.call_count(RemoteOp::DeleteTag), 0);
    }

    #[tokio::test]
    async fn test_remote_delete_failure_changes_nothing() {
        let (app, remote, presenter) = fixture_app_with(tagged_remote());
        remote.fail_next(RemoteOp::DeleteTag, RemoteError::Unreachable("offline".into()));

        assert!(app.reorder().delete_tag(&app, "z").await.is_err());
        assert_eq!(current(&app, ListKind::Tags), names(&["x", "y", "z"]));
        assert_eq!(presenter.errors().len(), 1);
    }
}
