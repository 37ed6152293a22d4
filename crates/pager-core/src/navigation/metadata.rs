use serde::{Deserialize, Serialize};

use crate::data::PaginationMetadata;

/// Item and page totals for the current dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCounts {
    pub total_items: usize,
    pub total_pages: usize,
}

/// Derive totals from server metadata or from the local item count.
///
/// Server figures win when defined. An empty result always reports one page.
pub fn resolve(
    metadata: Option<&PaginationMetadata>,
    local_length: usize,
    page_size: usize,
) -> ResolvedCounts {
    let page_size = page_size.max(1);
    let total_items = metadata
        .and_then(|m| m.total_elements)
        .unwrap_or(local_length);

    let total_pages = match metadata.and_then(|m| m.total_pages) {
        Some(pages) => pages,
        None if total_items > page_size => total_items.div_ceil(page_size),
        None => 1,
    };

    ResolvedCounts {
        total_items,
        total_pages: if total_items == 0 { 1 } else { total_pages.max(1) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_counts() {
        for page_size in 1..=12 {
            for total in 0..=60 {
                let counts = resolve(None, total, page_size);
                let expected = if total == 0 { 1 } else { total.div_ceil(page_size).max(1) };
                assert_eq!(counts.total_pages, expected, "total={} size={}", total, page_size);
                assert_eq!(counts.total_items, total);
            }
        }
    }

    #[test]
    fn test_twenty_five_items_make_three_pages() {
        assert_eq!(
            resolve(None, 25, 10),
            ResolvedCounts { total_items: 25, total_pages: 3 }
        );
    }

    #[test]
    fn test_empty_server_result_has_one_page() {
        let zero_pages = PaginationMetadata {
            total_elements: Some(0),
            total_pages: Some(0),
            empty: true,
            ..Default::default()
        };
        let no_pages = PaginationMetadata {
            total_elements: Some(0),
            total_pages: None,
            ..Default::default()
        };
        for meta in [zero_pages, no_pages] {
            assert_eq!(
                resolve(Some(&meta), 0, 10),
                ResolvedCounts { total_items: 0, total_pages: 1 }
            );
        }
    }

    #[test]
    fn test_metadata_is_authoritative() {
        let meta = PaginationMetadata {
            total_elements: Some(95),
            total_pages: Some(10),
            ..Default::default()
        };
        // Only one page of rows is present locally
        assert_eq!(
            resolve(Some(&meta), 10, 10),
            ResolvedCounts { total_items: 95, total_pages: 10 }
        );

        let partial = PaginationMetadata {
            total_elements: Some(95),
            ..Default::default()
        };
        assert_eq!(resolve(Some(&partial), 10, 10).total_pages, 10);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let meta = PaginationMetadata::for_page(2, 20, 41, 20);
        let a = resolve(Some(&meta), 20, 20);
        let b = resolve(Some(&meta), 20, 20);
        assert_eq!(a, b);
    }
}
