mod memory;
mod sqlite;
mod sync;

pub use memory::{MemoryRemote, RemoteCall, RemoteOp};
pub use sqlite::SqliteRemote;
pub use sync::{merge_upstream, SyncStats};

use crate::model::{
    apply_custom_order, ListKind, Metadata, OrderedList, Record, RecordId, FAVORITE_TAG,
};
use crate::mutation::Edit;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Everything a full fetch returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<Record>,
    pub metadata: Metadata,
}

/// Failure of a remote call, by how the user should be told about it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The server understood the request and refused it.
    #[error("{message}")]
    Rejected { code: String, message: String },

    /// The server could not be reached.
    #[error("Network unreachable: {0}")]
    Unreachable(String),

    /// The server failed while handling the request.
    #[error("Server error: {0}")]
    Server(String),
}

impl RemoteError {
    pub fn rejected(code: &str, message: impl Into<String>) -> Self {
        RemoteError::Rejected {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn server(err: impl std::fmt::Display) -> Self {
        RemoteError::Server(err.to_string())
    }

    /// Machine-readable code, as carried in the server's error payload.
    pub fn code(&self) -> &str {
        match self {
            RemoteError::Rejected { code, .. } => code,
            RemoteError::Unreachable(_) => "NETWORK_UNREACHABLE",
            RemoteError::Server(_) => "SERVER_ERROR",
        }
    }
}

/// Where records and orderings actually live.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Full snapshot of records plus the tag and language orderings.
    async fn fetch_all(&self) -> Result<Snapshot, RemoteError>;

    /// Apply one field edit and return the server's canonical record.
    async fn patch_record(&self, id: RecordId, edit: &Edit) -> Result<Record, RemoteError>;

    /// Replace the stored order of the tag or language list.
    async fn set_order(&self, kind: ListKind, order: &[String]) -> Result<(), RemoteError>;

    /// Delete a tag. Rejected with `TAG_IN_USE` while any record carries it.
    async fn delete_tag(&self, name: &str) -> Result<(), RemoteError>;

    /// Pull the upstream starred list and reconcile stored records with it.
    async fn trigger_sync(&self) -> Result<SyncStats, RemoteError>;
}

/// Build list metadata the way the server reports it: the stored order
/// first, then any value in use but not yet ordered, alphabetically.
pub fn derive_metadata(
    records: &[Record],
    tags_order: &[String],
    languages_order: &[String],
) -> Metadata {
    let mut tags: BTreeSet<String> = tags_order.iter().cloned().collect();
    let mut languages: BTreeSet<String> = languages_order.iter().cloned().collect();
    for record in records {
        tags.extend(record.user_tags().map(str::to_string));
        if let Some(lang) = &record.language {
            languages.insert(lang.clone());
        }
    }
    tags.remove(FAVORITE_TAG);

    Metadata {
        tags: OrderedList::new(apply_custom_order(&tags, tags_order)),
        languages: OrderedList::new(apply_custom_order(&languages, languages_order)),
    }
}
