//! In-memory data source

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use pager_core::data::{DataSource, FetchOptions, PageResponse, PaginationMetadata};
use pager_core::filter::{matches, sort_values, SortSpec};

type QueryFn<T> = Arc<dyn Fn(Vec<T>, &FetchOptions) -> Vec<T> + Send + Sync>;

/// A fully materialized array; paging happens in the controller
pub struct LocalSource<T> {
    name: String,
    items: RwLock<Vec<T>>,
    query: Option<QueryFn<T>>,
    max_results: AtomicUsize,
}

impl<T> LocalSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Source that hands back `items` unchanged
    pub fn new(name: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            name: name.into(),
            items: RwLock::new(items),
            query: None,
            max_results: AtomicUsize::new(10),
        }
    }

    /// Apply `query` to the items on every invocation, e.g. search and ordering
    pub fn with_query<F>(mut self, query: F) -> Self
    where
        F: Fn(Vec<T>, &FetchOptions) -> Vec<T> + Send + Sync + 'static,
    {
        self.query = Some(Arc::new(query));
        self
    }

    /// Replace the backing array; takes effect on the next invocation
    pub fn replace(&self, items: Vec<T>) {
        *self.items.write() = items;
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl LocalSource<Value> {
    /// JSON rows with search and ordering evaluated in memory
    pub fn json(name: impl Into<String>, items: Vec<Value>) -> Self {
        Self::new(name, items).with_query(query_json)
    }
}

/// Filter and order JSON rows the way a remote source would
pub fn query_json(items: Vec<Value>, options: &FetchOptions) -> Vec<Value> {
    let mut items: Vec<Value> = match &options.filter_fields {
        Some(filters) if !filters.is_empty() => items.into_iter().filter(|row| matches(row, filters)).collect(),
        _ => items,
    };
    if let Some(sort) = options.order_by.as_deref().and_then(SortSpec::parse) {
        sort_values(&mut items, &sort);
    }
    items
}

#[async_trait]
impl<T> DataSource<T> for LocalSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn invoke(&self, options: FetchOptions) -> anyhow::Result<PageResponse<T>> {
        let items = self.items.read().clone();
        let items = match &self.query {
            Some(query) => query(items, &options),
            None => items,
        };
        Ok(PageResponse::new(items, None))
    }

    fn pagination(&self) -> Option<PaginationMetadata> {
        None
    }

    fn is_pageable(&self) -> bool {
        false
    }

    fn max_results(&self) -> usize {
        self.max_results.load(Ordering::Relaxed)
    }

    fn set_max_results(&self, max_results: usize) {
        self.max_results.store(max_results, Ordering::Relaxed);
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pager_core::filter::{convert_filter_array_to_object, Filter, MatchMode};
    use serde_json::json;

    fn people() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Alice", "age": 31}),
            json!({"id": 2, "name": "bob", "age": 25}),
            json!({"id": 3, "name": "Alina", "age": 47}),
            json!({"id": 4, "name": "Carl", "age": null}),
        ]
    }

    #[tokio::test]
    async fn test_returns_everything_without_metadata() {
        let source = LocalSource::new("people", people());
        let response = source.invoke(FetchOptions::page(3).with_size(1)).await.unwrap();
        assert_eq!(response.data.len(), 4);
        assert!(response.pagination.is_none());
        assert!(!source.is_pageable());
    }

    #[tokio::test]
    async fn test_json_search_and_order() {
        let source = LocalSource::json("people", people());
        let options = FetchOptions {
            filter_fields: Some(convert_filter_array_to_object(&[Filter::new(
                "name",
                "ali",
                MatchMode::StartsWith,
            )])),
            order_by: Some("age desc".to_string()),
            ..FetchOptions::page(1)
        };

        let response = source.invoke(options).await.unwrap();
        let ids: Vec<i64> = response.data.iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_replace_items() {
        let source = LocalSource::new("numbers", vec![1, 2, 3]);
        source.replace(vec![4]);
        assert_eq!(source.invoke(FetchOptions::page(1)).await.unwrap().data, vec![4]);
        source.set_max_results(25);
        assert_eq!(source.max_results(), 25);
    }
}
