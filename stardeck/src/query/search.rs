//! Weighted approximate matching across record fields.
//!
//! A field's score is the fewest edits needed to turn the query into some
//! substring of the field, divided by the query length. Where in the field
//! the match sits does not matter. 0.0 is an exact hit, 1.0 nothing in common.

use crate::model::Record;

/// Fields scoring above this are not considered a match.
pub const MATCH_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Name,
    Alias,
    FullName,
    AiSummary,
    Description,
    Notes,
    Language,
    Tags,
}

impl SearchField {
    fn values<'a>(&self, record: &'a Record) -> Vec<&'a str> {
        match self {
            SearchField::Name => vec![record.name.as_str()],
            SearchField::FullName => vec![record.full_name.as_str()],
            SearchField::Alias => record.alias.as_deref().into_iter().collect(),
            SearchField::AiSummary => record.ai_summary.as_deref().into_iter().collect(),
            SearchField::Description => record.description.as_deref().into_iter().collect(),
            SearchField::Notes => record.notes.as_deref().into_iter().collect(),
            SearchField::Language => record.language.as_deref().into_iter().collect(),
            SearchField::Tags => record.user_tags().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchKey {
    pub field: SearchField,
    pub weight: f64,
}

pub const DEFAULT_KEYS: [SearchKey; 8] = [
    SearchKey { field: SearchField::Name, weight: 0.4 },
    SearchKey { field: SearchField::Alias, weight: 0.4 },
    SearchKey { field: SearchField::FullName, weight: 0.3 },
    SearchKey { field: SearchField::AiSummary, weight: 0.25 },
    SearchKey { field: SearchField::Description, weight: 0.2 },
    SearchKey { field: SearchField::Notes, weight: 0.2 },
    SearchKey { field: SearchField::Language, weight: 0.1 },
    SearchKey { field: SearchField::Tags, weight: 0.1 },
];

/// Keep the records matching `query`, most relevant first. Records with
/// equal relevance keep their input order.
pub fn search<'a>(records: Vec<&'a Record>, query: &str) -> Vec<&'a Record> {
    let pattern: Vec<char> = query.trim().to_lowercase().chars().collect();
    if pattern.is_empty() {
        return records;
    }

    let total_weight: f64 = DEFAULT_KEYS.iter().map(|k| k.weight).sum();
    let mut scored: Vec<(usize, f64)> = records
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            record_score(record, &pattern, total_weight).map(|score| (idx, score))
        })
        .collect();

    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    scored.into_iter().map(|(idx, _)| records[idx]).collect()
}

/// Combined score over all matching fields; lower is more relevant.
/// `None` when no field matches.
fn record_score(record: &Record, pattern: &[char], total_weight: f64) -> Option<f64> {
    let mut combined = 1.0_f64;
    let mut matched = false;

    for key in &DEFAULT_KEYS {
        let best = key
            .field
            .values(record)
            .into_iter()
            .map(|value| (field_score(pattern, value), value))
            .min_by(|a, b| a.0.total_cmp(&b.0));

        let Some((score, value)) = best else {
            continue;
        };
        if score > MATCH_THRESHOLD {
            continue;
        }
        matched = true;
        let weight = key.weight / total_weight;
        let base = if score == 0.0 { f64::EPSILON } else { score };
        combined *= base.powf(weight * field_norm(value));
    }

    matched.then_some(combined)
}

/// Shorter fields weigh more: a hit in a two-word name beats the same hit
/// in a paragraph of notes.
fn field_norm(value: &str) -> f64 {
    let words = value.split_whitespace().count().max(1) as f64;
    (1.0 / words.sqrt() * 1000.0).round() / 1000.0
}

/// Normalized edit distance between `pattern` and the closest substring of
/// `text`, compared case-insensitively. `pattern` must already be lowercase.
pub fn field_score(pattern: &[char], text: &str) -> f64 {
    let m = pattern.len();
    if m == 0 {
        return 0.0;
    }
    let text: Vec<char> = text.to_lowercase().chars().collect();

    // prev[i] = cost of matching pattern[..i] ending at the previous text char.
    // Row 0 is always 0 since a match may start anywhere in the text.
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut best = prev[m];
    let mut cur = vec![0usize; m + 1];

    for &tc in &text {
        cur[0] = 0;
        for i in 1..=m {
            let substitution = prev[i - 1] + usize::from(pattern[i - 1] != tc);
            let skip_text = prev[i] + 1;
            let skip_pattern = cur[i - 1] + 1;
            cur[i] = substitution.min(skip_text).min(skip_pattern);
        }
        best = best.min(cur[m]);
        if best == 0 {
            return 0.0;
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best as f64 / m as f64
}
