use crate::model::{Metadata, Record};
use serde::Serialize;
use std::collections::HashMap;

/// Record counts per filter dimension, for the sidebar.
/// Tags and languages follow the user's ordered lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SidebarCounts {
    pub all: usize,
    pub constellation: usize,
    pub untagged: usize,
    pub tags: Vec<(String, usize)>,
    pub languages: Vec<(String, usize)>,
}

pub fn sidebar_counts(records: &[Record], metadata: &Metadata) -> SidebarCounts {
    let mut tag_counts: HashMap<&str, usize> = HashMap::new();
    let mut language_counts: HashMap<&str, usize> = HashMap::new();
    let mut constellation = 0;
    let mut untagged = 0;

    for record in records {
        if record.is_favorite() {
            constellation += 1;
        }
        let mut has_user_tag = false;
        for tag in record.user_tags() {
            has_user_tag = true;
            *tag_counts.entry(tag).or_default() += 1;
        }
        if !has_user_tag {
            untagged += 1;
        }
        if let Some(lang) = record.language.as_deref() {
            *language_counts.entry(lang).or_default() += 1;
        }
    }

    let tags = metadata
        .tags
        .iter()
        .map(|t| (t.to_string(), tag_counts.get(t).copied().unwrap_or(0)))
        .collect();
    let languages = metadata
        .languages
        .iter()
        .map(|l| (l.to_string(), language_counts.get(l).copied().unwrap_or(0)))
        .collect();

    SidebarCounts {
        all: records.len(),
        constellation,
        untagged,
        tags,
        languages,
    }
}
