use super::record::{Record, FAVORITE_TAG};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Which user-ordered list an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Tags,
    Languages,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Tags => f.write_str("tags"),
            ListKind::Languages => f.write_str("languages"),
        }
    }
}

/// A unique-valued string sequence whose order is chosen by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct OrderedList {
    items: Vec<String>,
}

impl OrderedList {
    /// Build from a sequence, dropping later duplicates.
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = OrderedList::default();
        for item in items {
            list.push_if_absent(item.into());
        }
        list
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|i| i == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|i| i == name)
    }

    /// Append `name` unless already present. Returns whether it was added.
    pub fn push_if_absent(&mut self, name: String) -> bool {
        if self.contains(&name) {
            return false;
        }
        self.items.push(name);
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i != name);
        self.items.len() != before
    }

    /// True when `order` holds exactly the same names, each once.
    pub fn is_permutation(&self, order: &[String]) -> bool {
        if order.len() != self.items.len() {
            return false;
        }
        let mine: BTreeSet<&str> = self.items.iter().map(String::as_str).collect();
        let theirs: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        theirs.len() == order.len() && mine == theirs
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for OrderedList {
    fn from(items: Vec<String>) -> Self {
        OrderedList::new(items)
    }
}

impl From<OrderedList> for Vec<String> {
    fn from(list: OrderedList) -> Self {
        list.items
    }
}

/// Merge a user-defined order with the full set of known names: names in
/// `order` come first in that order, everything else follows alphabetically.
pub fn apply_custom_order(all: &BTreeSet<String>, order: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut merged = Vec::with_capacity(all.len());
    for item in order {
        if all.contains(item) && seen.insert(item.as_str()) {
            merged.push(item.clone());
        }
    }
    for item in all {
        if !seen.contains(item.as_str()) {
            merged.push(item.clone());
        }
    }
    merged
}

/// The tag and language ordered lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub tags: OrderedList,
    #[serde(default)]
    pub languages: OrderedList,
}

impl Metadata {
    pub fn list(&self, kind: ListKind) -> &OrderedList {
        match kind {
            ListKind::Tags => &self.tags,
            ListKind::Languages => &self.languages,
        }
    }

    pub fn list_mut(&mut self, kind: ListKind) -> &mut OrderedList {
        match kind {
            ListKind::Tags => &mut self.tags,
            ListKind::Languages => &mut self.languages,
        }
    }

    /// Append tag and language values seen in `records` that the lists do not
    /// know yet, alphabetically after the existing entries.
    /// Returns the kinds whose list grew.
    pub fn absorb_observed<'a, I>(&mut self, records: I) -> Vec<ListKind>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut new_tags = BTreeSet::new();
        let mut new_languages = BTreeSet::new();
        for record in records {
            for tag in record.user_tags() {
                if !self.tags.contains(tag) {
                    new_tags.insert(tag.to_string());
                }
            }
            if let Some(lang) = record.language.as_deref() {
                if !self.languages.contains(lang) {
                    new_languages.insert(lang.to_string());
                }
            }
        }

        let mut grown = Vec::new();
        if !new_tags.is_empty() {
            for tag in new_tags {
                self.tags.push_if_absent(tag);
            }
            grown.push(ListKind::Tags);
        }
        if !new_languages.is_empty() {
            for lang in new_languages {
                self.languages.push_if_absent(lang);
            }
            grown.push(ListKind::Languages);
        }
        // The favorite marker is never a user-visible list entry.
        self.tags.remove(FAVORITE_TAG);
        grown
    }
}
