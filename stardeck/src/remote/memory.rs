use super::{derive_metadata, merge_upstream, Remote, RemoteError, Snapshot, SyncStats};
use crate::model::{ListKind, Record, RecordId};
use crate::mutation::Edit;
use async_trait::async_trait;
use std::collections::VecDeque;
use crate::app::lock;
use std::sync::Mutex;
use std::time::Duration;

/// Which remote operation a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    FetchAll,
    PatchRecord,
    SetOrder,
    DeleteTag,
    TriggerSync,
}

/// A call as the remote received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    FetchAll,
    PatchRecord(RecordId, Edit),
    SetOrder(ListKind, Vec<String>),
    DeleteTag(String),
    TriggerSync,
}

type PatchHook = Box<dyn Fn(&mut Record) + Send + Sync>;

#[derive(Default)]
struct MemoryState {
    records: Vec<Record>,
    tags_order: Vec<String>,
    languages_order: Vec<String>,
    upstream: Option<Vec<Record>>,
}

/// An in-process remote with server-side rules, call recording, scripted
/// failures and optional latency.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
    failures: Mutex<VecDeque<(RemoteOp, RemoteError)>>,
    calls: Mutex<Vec<RemoteCall>>,
    latency: Mutex<Option<Duration>>,
    patch_hook: Option<PatchHook>,
}

impl MemoryRemote {
    pub fn new(records: Vec<Record>) -> Self {
        MemoryRemote {
            state: Mutex::new(MemoryState {
                records,
                ..MemoryState::default()
            }),
            ..MemoryRemote::default()
        }
    }

    pub fn with_order(self, kind: ListKind, order: Vec<String>) -> Self {
        {
            let mut state = lock(&self.state);
            match kind {
                ListKind::Tags => state.tags_order = order,
                ListKind::Languages => state.languages_order = order,
            }
        }
        self
    }

    /// Run `hook` on every patched record before it is stored, to model
    /// server-side normalization.
    pub fn with_patch_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Record) + Send + Sync + 'static,
    {
        self.patch_hook = Some(Box::new(hook));
        self
    }

    /// The list `trigger_sync` reconciles against.
    pub fn set_upstream(&self, upstream: Vec<Record>) {
        lock(&self.state).upstream = Some(upstream);
    }

    /// Make the next call of `op` fail with `err`. Failures queue in order.
    pub fn fail_next(&self, op: RemoteOp, err: RemoteError) {
        lock(&self.failures).push_back((op, err));
    }

    /// Delay every call by `latency` before it is handled.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, op: RemoteOp) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| call_op(c) == op)
            .count()
    }

    pub fn records(&self) -> Vec<Record> {
        lock(&self.state).records.clone()
    }

    pub fn record(&self, id: RecordId) -> Option<Record> {
        lock(&self.state).records.iter().find(|r| r.id == id).cloned()
    }

    pub fn order(&self, kind: ListKind) -> Vec<String> {
        let state = lock(&self.state);
        match kind {
            ListKind::Tags => state.tags_order.clone(),
            ListKind::Languages => state.languages_order.clone(),
        }
    }

    /// Record the call, wait out any latency, then pop a scripted failure.
    async fn enter(&self, call: RemoteCall) -> Result<(), RemoteError> {
        let op = call_op(&call);
        lock(&self.calls).push(call);

        let latency = *lock(&self.latency);
        match latency {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let mut failures = lock(&self.failures);
        if let Some(pos) = failures.iter().position(|(o, _)| *o == op) {
            if let Some((_, err)) = failures.remove(pos) {
                return Err(err);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Remote for MemoryRemote {
    async fn fetch_all(&self) -> Result<Snapshot, RemoteError> {
        self.enter(RemoteCall::FetchAll).await?;
        let state = lock(&self.state);
        Ok(Snapshot {
            records: state.records.clone(),
            metadata: derive_metadata(&state.records, &state.tags_order, &state.languages_order),
        })
    }

    async fn patch_record(&self, id: RecordId, edit: &Edit) -> Result<Record, RemoteError> {
        self.enter(RemoteCall::PatchRecord(id, edit.clone())).await?;
        edit.validate()
            .map_err(|e| RemoteError::rejected("VALIDATION_ERROR", e.to_string()))?;

        let mut state = lock(&self.state);
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| {
                RemoteError::rejected("REPO_NOT_FOUND", format!("Repository with id {id} not found"))
            })?;
        edit.apply(record);
        if let Some(hook) = &self.patch_hook {
            hook(record);
            record.id = id;
        }
        Ok(record.clone())
    }

    async fn set_order(&self, kind: ListKind, order: &[String]) -> Result<(), RemoteError> {
        self.enter(RemoteCall::SetOrder(kind, order.to_vec())).await?;
        let mut state = lock(&self.state);
        match kind {
            ListKind::Tags => state.tags_order = order.to_vec(),
            ListKind::Languages => state.languages_order = order.to_vec(),
        }
        Ok(())
    }

    async fn delete_tag(&self, name: &str) -> Result<(), RemoteError> {
        self.enter(RemoteCall::DeleteTag(name.to_string())).await?;
        let mut state = lock(&self.state);
        if state.records.iter().any(|r| r.has_tag(name)) {
            return Err(RemoteError::rejected(
                "TAG_IN_USE",
                format!("Tag '{name}' is still in use"),
            ));
        }
        state.tags_order.retain(|t| t != name);
        Ok(())
    }

    async fn trigger_sync(&self) -> Result<SyncStats, RemoteError> {
        self.enter(RemoteCall::TriggerSync).await?;
        let mut state = lock(&self.state);
        let upstream = state.upstream.clone().ok_or_else(|| {
            RemoteError::rejected("SYNC_SOURCE_MISSING", "No upstream list configured")
        })?;
        let (merged, stats) = merge_upstream(&state.records, &upstream);
        state.records = merged;
        Ok(stats)
    }
}

fn call_op(call: &RemoteCall) -> RemoteOp {
    match call {
        RemoteCall::FetchAll => RemoteOp::FetchAll,
        RemoteCall::PatchRecord(..) => RemoteOp::PatchRecord,
        RemoteCall::SetOrder(..) => RemoteOp::SetOrder,
        RemoteCall::DeleteTag(_) => RemoteOp::DeleteTag,
        RemoteCall::TriggerSync => RemoteOp::TriggerSync,
    }
}
