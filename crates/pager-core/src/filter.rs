//! Search filters and sort ordering
//!
//! Filters travel in two shapes: an ordered array of [`Filter`] tuples (what
//! the widget keeps and persists) and an object keyed by field name (what a
//! remote query expects). The helpers at the bottom evaluate filters and
//! orderings against JSON rows for sources that page locally.

use std::cmp::Ordering;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a filter value is compared against a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    #[default]
    StartsWith,
    Contains,
    NotContains,
    EndsWith,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// How a condition combines with the ones before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogicalOp {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// A single search filter as kept by the widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field: String,
    pub value: Value,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(rename = "type", default = "default_filter_type")]
    pub filter_type: String,
}

/// A filter condition in the remote query shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub value: Value,
    #[serde(default)]
    pub logical_op: LogicalOp,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(rename = "type", default = "default_filter_type")]
    pub filter_type: String,
}

fn default_filter_type() -> String {
    "string".to_string()
}

/// Remote filter object: field name to condition, in insertion order
pub type FilterMap = IndexMap<String, FilterCondition>;

impl Filter {
    pub fn new(field: impl Into<String>, value: impl Into<Value>, match_mode: MatchMode) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            match_mode,
            filter_type: default_filter_type(),
        }
    }

    /// A filter with no value constrains nothing
    pub fn is_blank(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Field ordering, persisted as `{field, direction}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Parse an `orderby` string such as `"name desc"` or `"name"`
    pub fn parse(order_by: &str) -> Option<Self> {
        let mut parts = order_by.split_whitespace();
        let field = parts.next()?.to_string();
        let direction = match parts.next().map(|d| d.to_ascii_lowercase()) {
            Some(d) if d == "desc" => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        Some(Self { field, direction })
    }

    /// Render as the `orderby` string handed to data sources
    pub fn to_order_by(&self) -> String {
        match self.direction {
            SortDirection::Asc => format!("{} asc", self.field),
            SortDirection::Desc => format!("{} desc", self.field),
        }
    }
}

/// Convert widget filters into the remote object shape.
///
/// Blank filters are dropped; a later filter on the same field replaces an
/// earlier one but keeps its position.
pub fn convert_filter_array_to_object(filters: &[Filter]) -> FilterMap {
    let mut map = FilterMap::new();
    for filter in filters.iter().filter(|f| !f.is_blank()) {
        map.insert(
            filter.field.clone(),
            FilterCondition {
                value: filter.value.clone(),
                logical_op: LogicalOp::And,
                match_mode: filter.match_mode,
                filter_type: filter.filter_type.clone(),
            },
        );
    }
    map
}

/// Convert a remote filter object back into widget filters
pub fn convert_filter_object_to_array(map: &FilterMap) -> Vec<Filter> {
    map.iter()
        .map(|(field, condition)| Filter {
            field: field.clone(),
            value: condition.value.clone(),
            match_mode: condition.match_mode,
            filter_type: condition.filter_type.clone(),
        })
        .collect()
}

/// Resolve a dot-separated path inside a JSON value
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Render a JSON scalar the way it reads in a cell
pub fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => display_string(a).cmp(&display_string(b)),
        },
    }
}

fn condition_matches(row: &Value, field: &str, condition: &FilterCondition) -> bool {
    let actual = lookup_path(row, field).unwrap_or(&Value::Null);
    let wanted = &condition.value;
    let haystack = display_string(actual).to_lowercase();
    let needle = display_string(wanted).to_lowercase();

    match condition.match_mode {
        MatchMode::StartsWith => haystack.starts_with(&needle),
        MatchMode::Contains => haystack.contains(&needle),
        MatchMode::NotContains => !haystack.contains(&needle),
        MatchMode::EndsWith => haystack.ends_with(&needle),
        MatchMode::Equals => compare_values(actual, wanted) == Ordering::Equal,
        MatchMode::NotEquals => compare_values(actual, wanted) != Ordering::Equal,
        MatchMode::LessThan => compare_values(actual, wanted) == Ordering::Less,
        MatchMode::LessThanOrEqual => compare_values(actual, wanted) != Ordering::Greater,
        MatchMode::GreaterThan => compare_values(actual, wanted) == Ordering::Greater,
        MatchMode::GreaterThanOrEqual => compare_values(actual, wanted) != Ordering::Less,
    }
}

/// Evaluate a filter object against a JSON row, left to right
pub fn matches(row: &Value, filters: &FilterMap) -> bool {
    let mut result: Option<bool> = None;
    for (field, condition) in filters {
        let hit = condition_matches(row, field, condition);
        result = Some(match (result, condition.logical_op) {
            (None, _) => hit,
            (Some(acc), LogicalOp::And) => acc && hit,
            (Some(acc), LogicalOp::Or) => acc || hit,
        });
    }
    result.unwrap_or(true)
}

/// Stable in-place ordering of JSON rows; nulls sort last
pub fn sort_values(rows: &mut [Value], sort: &SortSpec) {
    rows.sort_by(|a, b| {
        let left = lookup_path(a, &sort.field).unwrap_or(&Value::Null);
        let right = lookup_path(b, &sort.field).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right);
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => match (left, right) {
                (Value::Null, _) | (_, Value::Null) => ordering,
                _ => ordering.reverse(),
            },
        }
    });
}
