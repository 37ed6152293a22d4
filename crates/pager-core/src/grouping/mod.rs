//! Grouping of ordered rows into named sections and windowing of those sections

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::{display_string, lookup_path};
use crate::navigation::NavigationMode;
use crate::row::Row;

/// Group for items whose group path does not resolve
pub const OTHERS_GROUP: &str = "Others";
/// Group for items whose group path resolves to nothing
pub const NONE_GROUP: &str = "None";

/// Outcome of resolving a group path on an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupLookup {
    /// The path does not exist on the item
    Undefined,
    /// The path exists but holds null or an empty string
    Empty,
    Value(String),
}

/// Items that can be grouped by a dot-separated path
pub trait GroupValue {
    fn group_value(&self, path: &str) -> GroupLookup;
}

impl GroupValue for Value {
    fn group_value(&self, path: &str) -> GroupLookup {
        match lookup_path(self, path) {
            None => GroupLookup::Undefined,
            Some(Value::Null) => GroupLookup::Empty,
            Some(Value::String(s)) if s.is_empty() => GroupLookup::Empty,
            Some(value) => GroupLookup::Value(display_string(value)),
        }
    }
}

impl GroupLookup {
    fn into_key(self) -> String {
        match self {
            GroupLookup::Undefined => OTHERS_GROUP.to_string(),
            GroupLookup::Empty => NONE_GROUP.to_string(),
            GroupLookup::Value(key) => key,
        }
    }
}

/// One group of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedDataItem<T> {
    pub key: String,
    pub data: Vec<Row<T>>,
    /// Size of the group before windowing
    pub original_data_length: usize,
    /// Index within the full group of `data[0]`
    pub start_index_in_group: usize,
}

/// Partition rows by the value at `path`, ordered by key ascending.
///
/// Rows keep their relative order inside each group.
pub fn group<T>(rows: &[Row<T>], path: &str) -> Vec<GroupedDataItem<T>>
where
    T: GroupValue + Clone,
{
    let mut buckets: BTreeMap<String, Vec<Row<T>>> = BTreeMap::new();
    for row in rows {
        let key = row.data.group_value(path).into_key();
        buckets.entry(key).or_default().push(row.clone());
    }

    buckets
        .into_iter()
        .map(|(key, data)| GroupedDataItem {
            key,
            original_data_length: data.len(),
            data,
            start_index_in_group: 0,
        })
        .collect()
}

/// Restrict groups to the rows visible for `page`.
///
/// Accumulating modes show everything up to the end of `page`, truncating the
/// last group. Paged modes slice the flattened sequence and rebuild groups in
/// their original order.
pub fn paginate_groups<T: Clone>(
    groups: &[GroupedDataItem<T>],
    page: usize,
    page_size: usize,
    mode: NavigationMode,
) -> Vec<GroupedDataItem<T>> {
    let page = page.max(1);
    let page_size = page_size.max(1);

    if mode.accumulates() {
        return take_leading(groups, page * page_size);
    }

    let start = (page - 1) * page_size;
    let end = start + page_size;
    let mut windowed: Vec<GroupedDataItem<T>> = Vec::new();

    let flattened = groups.iter().enumerate().flat_map(|(group_index, group)| {
        group
            .data
            .iter()
            .enumerate()
            .map(move |(index_in_group, row)| (group_index, index_in_group, row))
    });

    for (group_index, index_in_group, row) in flattened.skip(start).take(end - start) {
        let group = &groups[group_index];
        match windowed.last_mut() {
            Some(last) if last.key == group.key => last.data.push(row.clone()),
            _ => windowed.push(GroupedDataItem {
                key: group.key.clone(),
                data: vec![row.clone()],
                original_data_length: group.original_data_length,
                start_index_in_group: index_in_group,
            }),
        }
    }

    windowed
}

fn take_leading<T: Clone>(groups: &[GroupedDataItem<T>], visible_items: usize) -> Vec<GroupedDataItem<T>> {
    let mut remaining = visible_items;
    let mut windowed = Vec::new();

    for group in groups {
        if remaining == 0 {
            break;
        }
        let take = group.data.len().min(remaining);
        remaining -= take;
        windowed.push(GroupedDataItem {
            key: group.key.clone(),
            data: group.data[..take].to_vec(),
            original_data_length: group.original_data_length,
            start_index_in_group: 0,
        });
    }

    windowed
}

/// Rows of the windowed groups in display order
pub fn flatten<T: Clone>(groups: &[GroupedDataItem<T>]) -> Vec<Row<T>> {
    groups.iter().flat_map(|g| g.data.iter().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowIds;
    use serde_json::json;

    fn dataset() -> Vec<Row<Value>> {
        RowIds::by_field("id").assign(vec![
            json!({"id": 1, "team": {"name": "red"}}),
            json!({"id": 2, "team": {"name": "blue"}}),
            json!({"id": 3, "team": {"name": "red"}}),
            json!({"id": 4, "team": {"name": null}}),
            json!({"id": 5}),
            json!({"id": 6, "team": {"name": "blue"}}),
            json!({"id": 7, "team": {"name": "red"}}),
            json!({"id": 8, "team": {"name": ""}}),
        ])
    }

    fn keys<T>(groups: &[GroupedDataItem<T>]) -> Vec<&str> {
        groups.iter().map(|g| g.key.as_str()).collect()
    }

    fn ids<T>(group: &GroupedDataItem<T>) -> Vec<String> {
        group.data.iter().map(|r| r.id.to_string()).collect()
    }

    #[test]
    fn test_group_keys_sorted_with_synthetic_groups() {
        let groups = group(&dataset(), "team.name");
        assert_eq!(keys(&groups), vec!["None", "Others", "blue", "red"]);
        assert_eq!(ids(&groups[0]), vec!["4", "8"]);
        assert_eq!(ids(&groups[1]), vec!["5"]);
        assert_eq!(ids(&groups[3]), vec!["1", "3", "7"]);
        assert_eq!(groups[3].original_data_length, 3);
    }

    #[test]
    fn test_grouping_is_stable() {
        let rows = dataset();
        assert_eq!(group(&rows, "team.name"), group(&rows, "team.name"));
    }

    #[test]
    fn test_paged_window_rebuckets() {
        let groups = group(&dataset(), "team.name");
        // Flattened: None[4,8] Others[5] blue[2,6] red[1,3,7]
        let page = paginate_groups(&groups, 2, 4, NavigationMode::Basic);
        assert_eq!(keys(&page), vec!["blue", "red"]);
        assert_eq!(ids(&page[0]), vec!["6"]);
        assert_eq!(page[0].start_index_in_group, 1);
        assert_eq!(page[0].original_data_length, 2);
        assert_eq!(ids(&page[1]), vec!["1", "3", "7"]);
        assert_eq!(page[1].start_index_in_group, 0);

        let last = paginate_groups(&groups, 3, 3, NavigationMode::Basic);
        assert_eq!(keys(&last), vec!["red"]);
        assert_eq!(last[0].start_index_in_group, 1);
        assert_eq!(ids(&last[0]), vec!["3", "7"]);
    }

    #[test]
    fn test_on_demand_window_truncates_last_group() {
        let groups = group(&dataset(), "team.name");
        let window = paginate_groups(&groups, 2, 2, NavigationMode::OnDemand);
        assert_eq!(keys(&window), vec!["None", "Others", "blue"]);
        assert_eq!(ids(&window[2]), vec!["2"]);
        assert!(window.iter().all(|g| g.start_index_in_group == 0));
        assert_eq!(window[2].original_data_length, 2);
        assert_eq!(flatten(&window).len(), 4);
    }

    #[test]
    fn test_window_past_end_is_empty() {
        let groups = group(&dataset(), "team.name");
        assert!(paginate_groups(&groups, 9, 3, NavigationMode::Classic).is_empty());
    }
}
