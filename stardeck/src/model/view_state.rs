use super::record::{Record, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Built-in filters that do not name a tag or language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemFilter {
    All,
    /// Records carrying the favorite marker.
    Constellation,
    /// Records with no user tags.
    Untagged,
}

/// The single active filter dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Filter {
    System(SystemFilter),
    Tag(String),
    Language(String),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::System(SystemFilter::All)
    }
}

impl Filter {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::System(SystemFilter::All) => true,
            Filter::System(SystemFilter::Constellation) => record.is_favorite(),
            Filter::System(SystemFilter::Untagged) => record.is_untagged(),
            Filter::Tag(name) => record.has_tag(name),
            Filter::Language(name) => record.language.as_deref() == Some(name.as_str()),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::System(SystemFilter::All) => f.write_str("system:all"),
            Filter::System(SystemFilter::Constellation) => f.write_str("system:constellation"),
            Filter::System(SystemFilter::Untagged) => f.write_str("system:untagged"),
            Filter::Tag(name) => write!(f, "tag:{name}"),
            Filter::Language(name) => write!(f, "language:{name}"),
        }
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dimension, value) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid filter '{s}': expected <dimension>:<value>"))?;
        if value.is_empty() {
            return Err(format!("Invalid filter '{s}': empty value"));
        }
        match dimension {
            "system" => match value {
                "all" => Ok(Filter::System(SystemFilter::All)),
                "constellation" => Ok(Filter::System(SystemFilter::Constellation)),
                "untagged" => Ok(Filter::System(SystemFilter::Untagged)),
                other => Err(format!("Unknown system filter '{other}'")),
            },
            "tag" => Ok(Filter::Tag(value.to_string())),
            "language" => Ok(Filter::Language(value.to_string())),
            other => Err(format!("Unknown filter dimension '{other}'")),
        }
    }
}

impl TryFrom<String> for Filter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Filter> for String {
    fn from(filter: Filter) -> Self {
        filter.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    StarredAt,
    PushedAt,
    Name,
    StargazersCount,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starred_at" => Ok(SortKey::StarredAt),
            "pushed_at" => Ok(SortKey::PushedAt),
            "name" => Ok(SortKey::Name),
            "stargazers_count" => Ok(SortKey::StargazersCount),
            other => Err(format!(
                "Unknown sort key '{other}': expected starred_at|pushed_at|name|stargazers_count"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Card,
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(ViewMode::List),
            "card" => Ok(ViewMode::Card),
            other => Err(format!("Unknown view mode '{other}': expected list|card")),
        }
    }
}

/// Everything that decides what the user currently sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub filter: Filter,
    pub sort: SortKey,
    pub search_query: String,
    pub view_mode: ViewMode,
    pub selection: Option<RecordId>,
    pub panel_open: bool,
}

impl ViewState {
    /// The trimmed search query, or `None` when search is inactive.
    pub fn active_search(&self) -> Option<&str> {
        let q = self.search_query.trim();
        if q.is_empty() {
            None
        } else {
            Some(q)
        }
    }
}
