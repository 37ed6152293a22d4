//! Scripted data source used by the unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use ahash::AHashSet;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::data::{DataSource, FetchOptions, PageResponse, PaginationMetadata};

pub(crate) struct MockSource {
    items: Mutex<Vec<Value>>,
    pageable: bool,
    delay: Option<Duration>,
    failing_pages: Mutex<AHashSet<usize>>,
    calls: Mutex<Vec<FetchOptions>>,
    max_results: AtomicUsize,
    last: Mutex<Option<PaginationMetadata>>,
}

impl MockSource {
    pub(crate) fn server(total: usize, page_size: usize) -> Self {
        Self::build(rows(total), true, page_size)
    }

    pub(crate) fn local(total: usize) -> Self {
        Self::build(rows(total), false, 10)
    }

    fn build(items: Vec<Value>, pageable: bool, page_size: usize) -> Self {
        Self {
            items: Mutex::new(items),
            pageable,
            delay: None,
            failing_pages: Mutex::new(AHashSet::new()),
            calls: Mutex::new(Vec::new()),
            max_results: AtomicUsize::new(page_size),
            last: Mutex::new(None),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn fail_page(&self, page: usize) {
        self.failing_pages.lock().insert(page);
    }

    pub(crate) fn heal(&self) {
        self.failing_pages.lock().clear();
    }

    pub(crate) fn set_items(&self, items: Vec<Value>) {
        *self.items.lock() = items;
    }

    pub(crate) fn calls(&self) -> Vec<FetchOptions> {
        self.calls.lock().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

/// `{"id": n, "name": "item-n"}` rows numbered from zero
pub(crate) fn rows(total: usize) -> Vec<Value> {
    (0..total).map(|i| json!({"id": i, "name": format!("item-{}", i)})).collect()
}

#[async_trait]
impl DataSource<Value> for MockSource {
    async fn invoke(&self, options: FetchOptions) -> anyhow::Result<PageResponse<Value>> {
        self.calls.lock().push(options.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_pages.lock().contains(&options.page) {
            anyhow::bail!("backend unavailable for page {}", options.page);
        }

        let items = self.items.lock().clone();
        if !self.pageable {
            return Ok(PageResponse::new(items, None));
        }

        let size = options.size.unwrap_or_else(|| self.max_results()).max(1);
        let start = (options.page.max(1) - 1) * size;
        let data: Vec<Value> = items.iter().skip(start).take(size).cloned().collect();
        let meta = PaginationMetadata::for_page(options.page, size, items.len(), data.len());
        *self.last.lock() = Some(meta.clone());
        Ok(PageResponse::new(data, Some(meta)))
    }

    fn pagination(&self) -> Option<PaginationMetadata> {
        self.last.lock().clone()
    }

    fn is_pageable(&self) -> bool {
        self.pageable
    }

    fn max_results(&self) -> usize {
        self.max_results.load(Ordering::Relaxed)
    }

    fn set_max_results(&self, max_results: usize) {
        self.max_results.store(max_results, Ordering::Relaxed);
    }

    fn source_name(&self) -> &str {
        "mock"
    }
}
