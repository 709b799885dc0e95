use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved tag marking a record as favorite. Never shown as a user tag.
pub const FAVORITE_TAG: &str = "_favorite";

pub type RecordId = i64;

/// Owner of a starred repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// A starred repository plus the user's own metadata (alias, notes, tags).
///
/// Timestamps are kept as the server sent them and parsed on demand, so a
/// malformed value survives a round-trip and simply sorts as the oldest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub pushed_at: String,
    #[serde(default)]
    pub starred_at: String,
    pub owner: Owner,
    #[serde(default)]
    pub html_url: String,
}

impl Record {
    pub fn is_favorite(&self) -> bool {
        self.has_tag(FAVORITE_TAG)
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t == name)
    }

    /// Tags shown to the user, i.e. everything except the favorite marker.
    pub fn user_tags(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .map(String::as_str)
            .filter(|t| *t != FAVORITE_TAG)
    }

    pub fn is_untagged(&self) -> bool {
        self.user_tags().next().is_none()
    }

    /// The tag set this record would have with favorite status flipped.
    /// Existing order is kept; the marker is appended when added.
    pub fn toggled_favorite_tags(&self) -> Vec<String> {
        if self.is_favorite() {
            self.tags
                .iter()
                .filter(|t| t.as_str() != FAVORITE_TAG)
                .cloned()
                .collect()
        } else {
            let mut tags = self.tags.clone();
            tags.push(FAVORITE_TAG.to_string());
            tags
        }
    }

    /// Alias if the user set a non-blank one, otherwise the full name.
    pub fn display_name(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if !alias.trim().is_empty() => alias,
            _ => &self.full_name,
        }
    }

    pub fn pushed_at_ts(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.pushed_at)
    }

    pub fn starred_at_ts(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.starred_at)
    }
}

/// Parse an ISO-8601 timestamp. Accepts RFC 3339 and the naive
/// `YYYY-MM-DDTHH:MM:SS` form (interpreted as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
