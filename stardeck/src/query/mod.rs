mod counts;
mod search;
mod sort;

pub use counts::{sidebar_counts, SidebarCounts};
pub use search::{field_score, search, SearchField, SearchKey, DEFAULT_KEYS, MATCH_THRESHOLD};
pub use sort::{collation_key, compare_names, sort_records};

use crate::model::{Record, RecordId, ViewState};

/// Project `records` through the view's filter, then either search (when a
/// non-blank query is set) or sort. Search relevance replaces sorting.
pub fn project<'a>(records: &'a [Record], view: &ViewState) -> Vec<&'a Record> {
    let filtered: Vec<&Record> = records
        .iter()
        .filter(|r| view.filter.matches(r))
        .collect();

    match view.active_search() {
        Some(query) => search(filtered, query),
        None => {
            let mut sorted = filtered;
            sort_records(&mut sorted, view.sort);
            sorted
        }
    }
}

/// `project`, reduced to record ids.
pub fn project_ids(records: &[Record], view: &ViewState) -> Vec<RecordId> {
    project(records, view).into_iter().map(|r| r.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Filter, SortKey, SystemFilter, FAVORITE_TAG};
    use crate::test_support::record;
    use pretty_assertions::assert_eq;

    fn scenario_records() -> Vec<Record> {
        let mut one = record(1, "acme/one");
        one.language = Some("Go".into());
        one.stargazers_count = 10;
        let mut two = record(2, "acme/two");
        two.tags = vec![FAVORITE_TAG.into()];
        two.language = Some("Rust".into());
        two.stargazers_count = 5;
        vec![one, two]
    }

    fn view(filter: Filter, sort: SortKey, query: &str) -> ViewState {
        ViewState {
            filter,
            sort,
            search_query: query.to_string(),
            ..ViewState::default()
        }
    }

    #[test]
    fn test_untagged_scenario_counts_favorite_only_as_untagged() {
        let records = scenario_records();
        let v = view(Filter::System(SystemFilter::Untagged), SortKey::StarredAt, "");
        // record 2 only carries the favorite marker
        assert_eq!(project_ids(&records, &v), vec![1, 2]);
    }

    #[test]
    fn test_all_sorted_by_stars_scenario() {
        let records = scenario_records();
        let v = view(Filter::System(SystemFilter::All), SortKey::StargazersCount, "");
        assert_eq!(project_ids(&records, &v), vec![1, 2]);
    }

    #[test]
    fn test_constellation_is_subset_of_favorites() {
        let mut records = scenario_records();
        let mut three = record(3, "acme/three");
        three.tags = vec!["cli".into(), FAVORITE_TAG.into()];
        records.push(three);

        let v = view(Filter::System(SystemFilter::Constellation), SortKey::Name, "");
        let out = project(&records, &v);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.is_favorite()));
    }

    #[test]
    fn test_untagged_ignores_favorite_marker() {
        let mut records = scenario_records();
        let mut three = record(3, "acme/three");
        three.tags = vec!["cli".into()];
        records.push(three);

        let v = view(Filter::System(SystemFilter::Untagged), SortKey::Name, "");
        assert_eq!(project_ids(&records, &v), vec![1, 2]);
    }

    #[test]
    fn test_blank_search_is_no_search() {
        let records = scenario_records();
        let plain = view(Filter::default(), SortKey::StargazersCount, "");
        let blank = view(Filter::default(), SortKey::StargazersCount, "   \t");
        assert_eq!(project_ids(&records, &plain), project_ids(&records, &blank));
    }

    #[test]
    fn test_search_skips_sort() {
        let mut records = scenario_records();
        records[0].name = "tokyo-cabinet".into();
        records[1].name = "tokio".into();

        // Sorting by stars would put record 1 first; relevance puts the exact
        // name match ahead of the one-typo match.
        let v = view(Filter::default(), SortKey::StargazersCount, "tokio");
        let ids = project_ids(&records, &v);
        assert_eq!(ids[0], 2);
    }

    #[test]
    fn test_filter_applies_before_search() {
        let mut records = scenario_records();
        records[0].name = "ripgrep".into();
        records[1].name = "ripgrep-all".into();
        let v = view(Filter::Language("Rust".into()), SortKey::Name, "ripgrep");
        assert_eq!(project_ids(&records, &v), vec![2]);
    }

    #[test]
    fn test_project_is_deterministic_with_ties() {
        let mut records = Vec::new();
        for id in 0..50 {
            let mut r = record(id, &format!("org/repo{}", id % 7));
            r.stargazers_count = (id % 3) as u64;
            r.starred_at = if id % 4 == 0 { "garbage".into() } else { "2024-01-01T00:00:00Z".into() };
            records.push(r);
        }
        for sort in [SortKey::StarredAt, SortKey::PushedAt, SortKey::Name, SortKey::StargazersCount] {
            let v = view(Filter::default(), sort, "");
            let first = project_ids(&records, &v);
            let second = project_ids(&records, &v);
            assert_eq!(first, second);
            assert_eq!(first.len(), records.len());
        }
        let v = view(Filter::default(), SortKey::Name, "repo");
        assert_eq!(project_ids(&records, &v), project_ids(&records, &v));
    }
}
