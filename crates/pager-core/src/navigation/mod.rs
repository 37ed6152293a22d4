use serde::{Deserialize, Serialize};

mod controller;
mod metadata;
mod subscriber;

pub use controller::{PaginationController, Transition};
pub use metadata::{resolve, ResolvedCounts};
pub use subscriber::PaginationSubscriber;

/// Paging UI styles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationMode {
    #[default]
    Basic,
    Pager,
    Classic,
    Advanced,
    /// "Load more" button; the window grows page by page
    OnDemand,
    /// Infinite scroll; the window grows as the viewport nears the end
    Scroll,
}

impl NavigationMode {
    /// Whether successive pages are accumulated instead of replaced
    pub fn accumulates(&self) -> bool {
        matches!(self, NavigationMode::OnDemand | NavigationMode::Scroll)
    }
}

/// Pagination state owned by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationState {
    /// 1-based
    pub current_page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub navigation_mode: NavigationMode,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl PaginationState {
    pub fn new(page_size: usize, navigation_mode: NavigationMode) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
            total_items: 0,
            total_pages: 1,
            navigation_mode,
            is_loading: false,
            error: None,
        }
    }

    /// Range of absolute item offsets covered by the current page
    pub fn page_range(&self) -> std::ops::Range<usize> {
        let start = (self.current_page.saturating_sub(1)) * self.page_size;
        let end = (start + self.page_size).min(self.total_items);
        start.min(end)..end
    }
}

/// Disable flags for the pager buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationFlags {
    pub first_disabled: bool,
    pub prev_disabled: bool,
    pub next_disabled: bool,
    pub last_disabled: bool,
}

impl NavigationFlags {
    pub fn from_bounds(is_first: bool, is_last: bool) -> Self {
        Self {
            first_disabled: is_first,
            prev_disabled: is_first,
            next_disabled: is_last,
            last_disabled: is_last,
        }
    }
}
