//! Data source contract shared by local arrays and server-paged sources

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::filter::FilterMap;

/// Paging metadata reported by a server-side source.
///
/// When present it is authoritative over locally computed counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMetadata {
    #[serde(default)]
    pub total_pages: Option<usize>,
    #[serde(default)]
    pub total_elements: Option<usize>,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub last: bool,
    /// Zero-based page number
    #[serde(default)]
    pub number: usize,
    #[serde(default)]
    pub size: usize,
    #[serde(default)]
    pub empty: bool,
}

impl PaginationMetadata {
    /// Metadata for a window over `total` items, with 1-based `page`
    pub fn for_page(page: usize, size: usize, total: usize, returned: usize) -> Self {
        let size = size.max(1);
        let total_pages = total.div_ceil(size);
        let page = page.max(1);
        Self {
            total_pages: Some(total_pages),
            total_elements: Some(total),
            first: page == 1,
            last: page >= total_pages,
            number: page - 1,
            size,
            empty: returned == 0,
        }
    }
}

/// Options for a single source invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOptions {
    /// 1-based page to fetch
    pub page: usize,
    pub size: Option<usize>,
    pub filter_fields: Option<FilterMap>,
    pub order_by: Option<String>,
}

impl FetchOptions {
    pub fn page(page: usize) -> Self {
        Self {
            page,
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

/// A resolved invocation
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub pagination: Option<PaginationMetadata>,
}

impl<T> PageResponse<T> {
    pub fn new(data: Vec<T>, pagination: Option<PaginationMetadata>) -> Self {
        Self { data, pagination }
    }
}

/// Uniform contract over local arrays and remote paged sources
#[async_trait]
pub trait DataSource<T>: Send + Sync {
    /// Fetch data. A rejected invocation is the only error channel.
    async fn invoke(&self, options: FetchOptions) -> anyhow::Result<PageResponse<T>>;

    /// Metadata of the most recent successful invocation
    fn pagination(&self) -> Option<PaginationMetadata>;

    /// Whether the source executes paging itself
    fn is_pageable(&self) -> bool;

    /// Page size forwarded to the next invocation
    fn max_results(&self) -> usize;

    /// Change the page size of the next invocation
    fn set_max_results(&self, max_results: usize);

    /// Get the source name
    fn source_name(&self) -> &str;
}
