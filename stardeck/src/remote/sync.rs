use crate::model::{Record, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Outcome of reconciling stored records with the upstream starred list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub added: usize,
    /// Records whose descriptive fields changed. Star-count and starred-at
    /// drift is applied but not counted.
    pub updated: usize,
    pub removed: usize,
    /// Size of the upstream list.
    pub total: usize,
}

/// Reconcile `local` with `upstream`, keyed by id.
///
/// Records only upstream are added, records only local are removed, and
/// records on both sides take upstream's repository fields while keeping
/// the user's alias, notes, tags and summary. The result follows upstream
/// order.
pub fn merge_upstream(local: &[Record], upstream: &[Record]) -> (Vec<Record>, SyncStats) {
    let local_by_id: HashMap<RecordId, &Record> = local.iter().map(|r| (r.id, r)).collect();
    let mut seen: HashSet<RecordId> = HashSet::with_capacity(upstream.len());
    let mut stats = SyncStats {
        total: upstream.len(),
        ..SyncStats::default()
    };

    let mut merged = Vec::with_capacity(upstream.len());
    for incoming in upstream {
        if !seen.insert(incoming.id) {
            log::warn!("Upstream list repeats id {}; keeping the first", incoming.id);
            continue;
        }
        match local_by_id.get(&incoming.id) {
            None => {
                stats.added += 1;
                merged.push(incoming.clone());
            }
            Some(existing) => {
                if has_substantive_change(existing, incoming) {
                    stats.updated += 1;
                }
                let mut record = incoming.clone();
                record.alias = existing.alias.clone();
                record.notes = existing.notes.clone();
                record.tags = existing.tags.clone();
                if record.ai_summary.is_none() {
                    record.ai_summary = existing.ai_summary.clone();
                }
                merged.push(record);
            }
        }
    }

    stats.removed = local.iter().filter(|r| !seen.contains(&r.id)).count();
    log::info!(
        "Sync diff: added={} updated={} removed={} total={}",
        stats.added,
        stats.updated,
        stats.removed,
        stats.total
    );
    (merged, stats)
}

fn has_substantive_change(existing: &Record, incoming: &Record) -> bool {
    existing.name != incoming.name
        || existing.full_name != incoming.full_name
        || existing.description != incoming.description
        || existing.language != incoming.language
        || existing.html_url != incoming.html_url
        || existing.pushed_at != incoming.pushed_at
}
