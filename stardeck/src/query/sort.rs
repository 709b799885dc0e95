use crate::model::{Record, SortKey};
use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Stable in-place sort. Equal keys keep their relative order.
pub fn sort_records(records: &mut [&Record], key: SortKey) {
    match key {
        SortKey::Name => {
            // Precompute collation keys so each comparison doesn't re-normalize.
            let mut keyed: Vec<(String, &Record)> = records
                .iter()
                .map(|r| (collation_key(&r.name), *r))
                .collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
            for (slot, (_, record)) in records.iter_mut().zip(keyed) {
                *slot = record;
            }
        }
        SortKey::StargazersCount => {
            records.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count));
        }
        SortKey::StarredAt => {
            records.sort_by_cached_key(|r| std::cmp::Reverse(r.starred_at_ts()));
        }
        SortKey::PushedAt => {
            records.sort_by_cached_key(|r| std::cmp::Reverse(r.pushed_at_ts()));
        }
    }
}

/// Accent- and case-insensitive ordering, falling back to the raw strings
/// so that distinct names never compare equal.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

/// Decompose, drop combining marks, lowercase.
pub fn collation_key(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
