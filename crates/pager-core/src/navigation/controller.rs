//! Pagination controller implementation

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Weak};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{resolve, NavigationFlags, NavigationMode, PaginationState, PaginationSubscriber};
use crate::data::{DataSource, FetchOptions, PageResponse, PaginationMetadata};
use crate::error::{PagerError, Result};
use crate::events::events::{FetchFailed, PageChanged, PageSizeChanged};
use crate::events::EventBus;
use crate::filter::FilterMap;
use crate::flight::FlightGuard;
use crate::row::{Row, RowIds};

/// Result of a requested transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The transition committed and the window now shows `page`
    Committed { page: usize },
    /// The request matched the current state
    Unchanged,
    /// Another network-backed transition was in flight; nothing happened
    Dropped,
}

/// Rows and metadata of the last successful invocation
struct Dataset<T> {
    rows: Vec<Row<T>>,
    metadata: Option<PaginationMetadata>,
}

/// Search and ordering forwarded with every invocation
#[derive(Debug, Clone, Default)]
struct Query {
    filter_fields: Option<FilterMap>,
    order_by: Option<String>,
}

/// The pagination state machine
pub struct PaginationController<T> {
    source: Arc<dyn DataSource<T>>,
    row_ids: Arc<RowIds<T>>,
    state: Arc<RwLock<PaginationState>>,
    dataset: Arc<RwLock<Dataset<T>>>,
    query: RwLock<Query>,
    in_flight: AtomicBool,
    events: Arc<EventBus>,
    subscribers: Arc<RwLock<Vec<Weak<dyn PaginationSubscriber>>>>,
}

impl<T> PaginationController<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new controller over `source`
    pub fn new(
        source: Arc<dyn DataSource<T>>,
        row_ids: Arc<RowIds<T>>,
        page_size: usize,
        navigation_mode: NavigationMode,
        events: Arc<EventBus>,
    ) -> Self {
        source.set_max_results(page_size.max(1));
        Self {
            source,
            row_ids,
            state: Arc::new(RwLock::new(PaginationState::new(page_size, navigation_mode))),
            dataset: Arc::new(RwLock::new(Dataset {
                rows: Vec::new(),
                metadata: None,
            })),
            query: RwLock::new(Query::default()),
            in_flight: AtomicBool::new(false),
            events,
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Whether the source pages on the server
    pub fn is_server_paged(&self) -> bool {
        self.source.is_pageable()
    }

    pub fn source(&self) -> &Arc<dyn DataSource<T>> {
        &self.source
    }

    /// Current pagination state
    pub fn state(&self) -> PaginationState {
        self.state.read().clone()
    }

    /// Metadata of the last successful invocation
    pub fn metadata(&self) -> Option<PaginationMetadata> {
        self.dataset.read().metadata.clone()
    }

    /// Every row currently held: the full array for local sources, one page for server sources
    pub fn rows(&self) -> Vec<Row<T>> {
        self.dataset.read().rows.clone()
    }

    /// Options that would be sent for `page`, including the active search and ordering
    pub fn fetch_options(&self, page: usize, page_size: usize) -> FetchOptions {
        let query = self.query.read();
        FetchOptions {
            page,
            size: Some(page_size),
            filter_fields: query.filter_fields.clone(),
            order_by: query.order_by.clone(),
        }
    }

    /// Seed page and page size before the first load, e.g. from persisted state
    pub fn restore_position(&self, page: usize, page_size: Option<usize>) {
        let mut state = self.state.write();
        if let Some(size) = page_size.filter(|s| *s > 0) {
            state.page_size = size;
            self.source.set_max_results(size);
        }
        state.current_page = page.max(1);
        debug!("Restored position: page {} size {}", state.current_page, state.page_size);
    }

    /// Seed search and ordering before the first load without resetting the page
    pub fn restore_query(&self, filter_fields: Option<FilterMap>, order_by: Option<String>) {
        *self.query.write() = Query {
            filter_fields,
            order_by,
        };
    }

    /// Fetch the current page (server) or the full array (local).
    ///
    /// A restored page beyond the resolved total is clamped to the last page.
    pub async fn load(&self) -> Result<Transition> {
        let Some(guard) = FlightGuard::acquire(&self.in_flight) else {
            debug!("Load dropped: a transition is already in flight");
            return Ok(Transition::Dropped);
        };
        self.load_in_flight(&guard).await
    }

    /// Body of `load`; the caller holds the single-flight slot
    async fn load_in_flight(&self, _guard: &FlightGuard<'_>) -> Result<Transition> {
        let (page, page_size) = {
            let mut state = self.state.write();
            state.is_loading = true;
            state.error = None;
            (state.current_page, state.page_size)
        };
        self.notify_subscribers();

        let request_page = if self.is_server_paged() { page } else { 1 };
        if let Err(error) = self.fetch(request_page, page_size).await {
            self.fail(page, &error);
            return Err(error);
        }

        if self.is_server_paged() {
            let overshoot = {
                let state = self.state.read();
                (state.current_page > state.total_pages).then_some(state.total_pages)
            };
            if let Some(last) = overshoot {
                info!("Page {} no longer exists, loading page {}", page, last);
                self.state.write().current_page = last;
                if let Err(error) = self.fetch(last, page_size).await {
                    self.fail(last, &error);
                    return Err(error);
                }
            }
        } else {
            self.clamp_current_page();
        }

        let page = {
            let mut state = self.state.write();
            state.is_loading = false;
            state.current_page
        };
        self.notify_subscribers();
        Ok(Transition::Committed { page })
    }

    /// Replace the local dataset without invoking the source
    pub fn set_dataset(&self, items: Vec<T>, metadata: Option<PaginationMetadata>) {
        let rows = self.row_ids.assign(items);
        let page_size = self.state.read().page_size;
        let counts = resolve(metadata.as_ref(), rows.len(), page_size);
        *self.dataset.write() = Dataset { rows, metadata };
        {
            let mut state = self.state.write();
            state.total_items = counts.total_items;
            state.total_pages = counts.total_pages;
        }
        self.clamp_current_page();
        self.notify_subscribers();
    }

    /// Navigate to `page`.
    ///
    /// Out-of-range pages are clamped. For server sources the page is shown
    /// optimistically and rolled back if the fetch rejects.
    pub async fn go_to_page(&self, page: usize) -> Result<Transition> {
        let (previous, target, page_size) = {
            let state = self.state.read();
            (
                state.current_page,
                page.clamp(1, state.total_pages.max(1)),
                state.page_size,
            )
        };
        if target == previous {
            return Ok(Transition::Unchanged);
        }

        if !self.is_server_paged() {
            self.state.write().current_page = target;
            self.notify_subscribers();
            self.events.publish(PageChanged { page: target, previous });
            debug!("Page {} -> {} (local)", previous, target);
            return Ok(Transition::Committed { page: target });
        }

        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            debug!("Page change to {} dropped: a transition is already in flight", target);
            return Ok(Transition::Dropped);
        };

        {
            let mut state = self.state.write();
            state.current_page = target;
            state.is_loading = true;
            state.error = None;
        }
        self.notify_subscribers();

        match self.fetch(target, page_size).await {
            Ok(()) => {
                self.state.write().is_loading = false;
                self.notify_subscribers();
                self.events.publish(PageChanged { page: target, previous });
                debug!("Page {} -> {}", previous, target);
                Ok(Transition::Committed { page: target })
            }
            Err(error) => {
                warn!("Rolling back to page {}: {}", previous, error);
                self.state.write().current_page = previous;
                self.fail(target, &error);
                Err(error)
            }
        }
    }

    /// Change the page size; always returns to the first page
    pub async fn change_page_size(&self, page_size: usize) -> Result<Transition> {
        if page_size == 0 {
            return Err(PagerError::InvalidPageSize);
        }

        let previous = self.state();
        if previous.page_size == page_size && previous.current_page == 1 {
            return Ok(Transition::Unchanged);
        }

        if !self.is_server_paged() {
            let len = self.dataset.read().rows.len();
            let counts = resolve(None, len, page_size);
            {
                let mut state = self.state.write();
                state.page_size = page_size;
                state.current_page = 1;
                state.total_items = counts.total_items;
                state.total_pages = counts.total_pages;
            }
            self.source.set_max_results(page_size);
            self.notify_subscribers();
            self.events.publish(PageSizeChanged {
                page_size,
                previous: previous.page_size,
            });
            return Ok(Transition::Committed { page: 1 });
        }

        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            debug!("Page size change to {} dropped: a transition is already in flight", page_size);
            return Ok(Transition::Dropped);
        };

        {
            let mut state = self.state.write();
            let counts = resolve(None, state.total_items, page_size);
            state.page_size = page_size;
            state.current_page = 1;
            state.total_pages = counts.total_pages;
            state.is_loading = true;
            state.error = None;
        }
        self.notify_subscribers();

        match self.fetch(1, page_size).await {
            Ok(()) => {
                self.state.write().is_loading = false;
                self.notify_subscribers();
                self.events.publish(PageSizeChanged {
                    page_size,
                    previous: previous.page_size,
                });
                debug!("Page size {} -> {}", previous.page_size, page_size);
                Ok(Transition::Committed { page: 1 })
            }
            Err(error) => {
                warn!("Rolling back page size to {}: {}", previous.page_size, error);
                {
                    let mut state = self.state.write();
                    state.page_size = previous.page_size;
                    state.current_page = previous.current_page;
                    state.total_pages = previous.total_pages;
                }
                self.source.set_max_results(previous.page_size);
                self.fail(1, &error);
                Err(error)
            }
        }
    }

    /// Replace search and ordering, then reload from the first page.
    ///
    /// A rejected fetch restores the previous query and page.
    pub async fn set_query(
        &self,
        filter_fields: Option<FilterMap>,
        order_by: Option<String>,
    ) -> Result<Transition> {
        let Some(guard) = FlightGuard::acquire(&self.in_flight) else {
            debug!("Query change dropped: a transition is already in flight");
            return Ok(Transition::Dropped);
        };

        let previous_query = std::mem::replace(
            &mut *self.query.write(),
            Query {
                filter_fields,
                order_by,
            },
        );
        let previous_page = std::mem::replace(&mut self.state.write().current_page, 1);

        match self.load_in_flight(&guard).await {
            Ok(transition) => Ok(transition),
            Err(error) => {
                warn!("Restoring previous query at page {}: {}", previous_page, error);
                *self.query.write() = previous_query;
                self.state.write().current_page = previous_page;
                self.notify_subscribers();
                Err(error)
            }
        }
    }

    /// Active ordering key, if any
    pub fn order_by(&self) -> Option<String> {
        self.query.read().order_by.clone()
    }

    pub async fn first(&self) -> Result<Transition> {
        if self.is_first_page() {
            return Ok(Transition::Unchanged);
        }
        self.go_to_page(1).await
    }

    pub async fn prev(&self) -> Result<Transition> {
        if self.is_first_page() {
            return Ok(Transition::Unchanged);
        }
        let page = self.state.read().current_page.saturating_sub(1);
        self.go_to_page(page).await
    }

    pub async fn next(&self) -> Result<Transition> {
        if self.is_last_page() {
            return Ok(Transition::Unchanged);
        }
        let page = self.state.read().current_page + 1;
        self.go_to_page(page).await
    }

    pub async fn last(&self) -> Result<Transition> {
        if self.is_last_page() {
            return Ok(Transition::Unchanged);
        }
        let page = self.state.read().total_pages;
        self.go_to_page(page).await
    }

    /// Commit a manually typed page number (on blur / enter).
    ///
    /// Unparsable or non-positive input becomes page 1; input past the end
    /// becomes the last page.
    pub async fn commit_page_input(&self, raw: &str) -> Result<Transition> {
        let total_pages = self.state.read().total_pages.max(1);
        let page = match raw.trim().parse::<i64>() {
            Ok(n) if n >= 1 => usize::try_from(n).unwrap_or(total_pages).min(total_pages),
            _ => 1,
        };
        self.go_to_page(page).await
    }

    /// Prefers the server's `first` flag when the source pages on the server
    pub fn is_first_page(&self) -> bool {
        if let Some(meta) = self.server_metadata() {
            return meta.first;
        }
        self.state.read().current_page <= 1
    }

    /// Prefers the server's `last` flag when the source pages on the server
    pub fn is_last_page(&self) -> bool {
        if let Some(meta) = self.server_metadata() {
            return meta.last;
        }
        let state = self.state.read();
        state.current_page >= state.total_pages
    }

    pub fn navigation_flags(&self) -> NavigationFlags {
        NavigationFlags::from_bounds(self.is_first_page(), self.is_last_page())
    }

    /// The window the display layer should render
    pub fn current_items(&self) -> Vec<Row<T>> {
        let dataset = self.dataset.read();
        if self.is_server_paged() {
            return dataset.rows.clone();
        }

        let state = self.state.read();
        let len = dataset.rows.len();
        let end = (state.current_page * state.page_size).min(len);
        let start = if state.navigation_mode.accumulates() {
            0
        } else {
            ((state.current_page - 1) * state.page_size).min(end)
        };
        dataset.rows[start..end].to_vec()
    }

    /// Metadata that describes the current window; local slicing outdates it
    fn server_metadata(&self) -> Option<PaginationMetadata> {
        if !self.is_server_paged() {
            return None;
        }
        self.dataset.read().metadata.clone()
    }

    /// Add a subscriber
    pub fn add_subscriber(&self, subscriber: Arc<dyn PaginationSubscriber>) {
        self.subscribers.write().push(Arc::downgrade(&subscriber));
    }

    async fn fetch(&self, page: usize, page_size: usize) -> Result<()> {
        let options = self.fetch_options(page, page_size);
        self.source.set_max_results(page_size);
        debug!("Invoking {} for page {} (size {})", self.source.source_name(), page, page_size);

        let response = self
            .source
            .invoke(options)
            .await
            .map_err(|e| PagerError::fetch(page, &e))?;
        self.apply_response(response);
        Ok(())
    }

    fn apply_response(&self, response: PageResponse<T>) {
        let rows = self.row_ids.assign(response.data);
        let metadata = response.pagination.or_else(|| self.source.pagination());
        let page_size = self.state.read().page_size;
        let counts = resolve(metadata.as_ref(), rows.len(), page_size);

        *self.dataset.write() = Dataset { rows, metadata };

        let mut state = self.state.write();
        state.total_items = counts.total_items;
        state.total_pages = counts.total_pages;
        if counts.total_items == 0 {
            state.current_page = 1;
        }
    }

    fn clamp_current_page(&self) {
        let mut state = self.state.write();
        state.current_page = state.current_page.clamp(1, state.total_pages.max(1));
    }

    /// Record a rejected fetch; the caller has already restored committed values
    fn fail(&self, page: usize, error: &PagerError) {
        {
            let mut state = self.state.write();
            state.is_loading = false;
            state.error = Some(error.to_string());
        }
        self.notify_subscribers();
        self.events.publish(FetchFailed {
            source_name: self.source.source_name().to_string(),
            page,
            error: error.to_string(),
        });
    }

    /// Notify all subscribers of a state change
    fn notify_subscribers(&self) {
        let state = self.state();
        let mut subscribers = self.subscribers.write();

        // Remove any dead weak references
        subscribers.retain(|weak| weak.strong_count() > 0);

        for weak in subscribers.iter() {
            if let Some(subscriber) = weak.upgrade() {
                subscriber.on_pagination_change(&state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockSource;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::time::Duration;

    fn controller(source: Arc<MockSource>, page_size: usize) -> PaginationController<Value> {
        PaginationController::new(
            source,
            Arc::new(RowIds::by_field("id")),
            page_size,
            NavigationMode::Basic,
            Arc::new(EventBus::new()),
        )
    }

    fn ids(rows: &[Row<Value>]) -> Vec<u64> {
        rows.iter().filter_map(|r| r.data["id"].as_u64()).collect()
    }

    struct Recorder(Mutex<Vec<usize>>);

    impl PaginationSubscriber for Recorder {
        fn on_pagination_change(&self, state: &PaginationState) {
            self.0.lock().push(state.current_page);
        }
    }

    #[tokio::test]
    async fn test_local_window_on_last_page() {
        let source = Arc::new(MockSource::local(25));
        let ctl = controller(source.clone(), 10);
        ctl.load().await.unwrap();

        let state = ctl.state();
        assert_eq!(state.total_items, 25);
        assert_eq!(state.total_pages, 3);

        assert_eq!(ctl.go_to_page(3).await.unwrap(), Transition::Committed { page: 3 });
        let window = ctl.current_items();
        assert_eq!(window.len(), 5);
        assert_eq!(ids(&window), vec![20, 21, 22, 23, 24]);
        // Local paging never goes back to the source
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_same_page_is_noop() {
        let source = Arc::new(MockSource::server(40, 10));
        let ctl = controller(source.clone(), 10);
        ctl.load().await.unwrap();
        let before = ctl.state();
        let calls = source.call_count();

        assert_eq!(ctl.go_to_page(before.current_page).await.unwrap(), Transition::Unchanged);
        assert_eq!(ctl.state(), before);
        assert_eq!(source.call_count(), calls);
    }

    #[tokio::test]
    async fn test_server_page_change_fetches_page() {
        let source = Arc::new(MockSource::server(40, 10));
        let ctl = controller(source.clone(), 10);
        ctl.load().await.unwrap();

        ctl.go_to_page(2).await.unwrap();
        let last = source.calls().pop().unwrap();
        assert_eq!(last.page, 2);
        assert_eq!(last.size, Some(10));
        assert_eq!(ids(&ctl.current_items())[0], 10);
        assert!(!ctl.is_first_page());
    }

    #[tokio::test]
    async fn test_failed_fetch_rolls_back() {
        let source = Arc::new(MockSource::server(40, 10));
        let ctl = controller(source.clone(), 10);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        ctl.add_subscriber(recorder.clone());
        ctl.load().await.unwrap();

        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        ctl.events.on::<FetchFailed, _>(move |e| sink.lock().push(e.page));

        source.fail_page(3);
        let result = ctl.go_to_page(3).await;
        assert!(matches!(result, Err(PagerError::Fetch { page: 3, .. })));

        let state = ctl.state();
        assert_eq!(state.current_page, 1);
        assert!(!state.is_loading);
        assert!(state.error.is_some());
        assert_eq!(*failures.lock(), vec![3]);
        // Optimistic page was shown, then rolled back
        assert!(recorder.0.lock().ends_with(&[3, 1]));
        // Rows from page 1 are still shown
        assert_eq!(ids(&ctl.current_items())[0], 0);

        source.heal();
        ctl.go_to_page(3).await.unwrap();
        assert_eq!(ctl.state().error, None);
    }

    #[tokio::test]
    async fn test_page_size_change_resets_to_first_page() {
        let source = Arc::new(MockSource::server(95, 10));
        let ctl = controller(source.clone(), 10);
        ctl.load().await.unwrap();
        ctl.go_to_page(3).await.unwrap();

        ctl.change_page_size(20).await.unwrap();
        let state = ctl.state();
        assert_eq!(state.current_page, 1);
        assert_eq!(state.page_size, 20);
        assert_eq!(state.total_pages, 5);

        let last = source.calls().pop().unwrap();
        assert_eq!((last.page, last.size), (1, Some(20)));
        assert_eq!(source.max_results(), 20);
    }

    #[tokio::test]
    async fn test_page_size_rollback() {
        let source = Arc::new(MockSource::server(95, 10));
        let ctl = controller(source.clone(), 10);
        ctl.load().await.unwrap();
        ctl.go_to_page(3).await.unwrap();

        source.fail_page(1);
        assert!(ctl.change_page_size(50).await.is_err());
        let state = ctl.state();
        assert_eq!((state.current_page, state.page_size, state.total_pages), (3, 10, 10));
        assert_eq!(source.max_results(), 10);
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected() {
        let ctl = controller(Arc::new(MockSource::local(5)), 10);
        assert_eq!(ctl.change_page_size(0).await, Err(PagerError::InvalidPageSize));
    }

    #[tokio::test]
    async fn test_local_page_size_change() {
        let ctl = controller(Arc::new(MockSource::local(25)), 10);
        ctl.load().await.unwrap();
        ctl.go_to_page(3).await.unwrap();
        ctl.change_page_size(20).await.unwrap();
        let state = ctl.state();
        assert_eq!((state.current_page, state.total_pages), (1, 2));
        assert_eq!(ctl.current_items().len(), 20);
    }

    #[tokio::test]
    async fn test_boundary_moves_are_noops() {
        let source = Arc::new(MockSource::server(20, 10));
        let ctl = controller(source.clone(), 10);
        ctl.load().await.unwrap();

        assert_eq!(ctl.prev().await.unwrap(), Transition::Unchanged);
        assert_eq!(ctl.first().await.unwrap(), Transition::Unchanged);
        assert_eq!(ctl.last().await.unwrap(), Transition::Committed { page: 2 });
        let calls = source.call_count();
        assert_eq!(ctl.next().await.unwrap(), Transition::Unchanged);
        assert_eq!(source.call_count(), calls);
        assert_eq!(ctl.navigation_flags(), NavigationFlags::from_bounds(false, true));
    }

    #[tokio::test]
    async fn test_manual_page_input_is_clamped() {
        let ctl = controller(Arc::new(MockSource::local(25)), 10);
        ctl.load().await.unwrap();

        ctl.commit_page_input("99").await.unwrap();
        assert_eq!(ctl.state().current_page, 3);
        ctl.commit_page_input("-4").await.unwrap();
        assert_eq!(ctl.state().current_page, 1);
        ctl.commit_page_input("2").await.unwrap();
        ctl.commit_page_input("abc").await.unwrap();
        assert_eq!(ctl.state().current_page, 1);
    }

    #[tokio::test]
    async fn test_concurrent_transition_dropped() {
        let source = Arc::new(MockSource::server(50, 10).with_delay(Duration::from_millis(30)));
        let ctl = controller(source.clone(), 10);
        ctl.load().await.unwrap();
        let calls = source.call_count();

        let (slow, fast) = tokio::join!(ctl.go_to_page(2), ctl.go_to_page(3));
        assert_eq!(slow.unwrap(), Transition::Committed { page: 2 });
        assert_eq!(fast.unwrap(), Transition::Dropped);
        assert_eq!(source.call_count(), calls + 1);
        assert_eq!(ctl.state().current_page, 2);
    }

    #[tokio::test]
    async fn test_empty_server_result() {
        let source = Arc::new(MockSource::server(0, 10));
        let ctl = controller(source, 10);
        ctl.restore_position(4, None);
        ctl.load().await.unwrap();
        let state = ctl.state();
        assert_eq!((state.total_items, state.total_pages, state.current_page), (0, 1, 1));
    }

    #[tokio::test]
    async fn test_restored_page_past_end_is_clamped() {
        let source = Arc::new(MockSource::server(25, 10));
        let ctl = controller(source.clone(), 10);
        ctl.restore_position(7, None);
        ctl.load().await.unwrap();
        assert_eq!(ctl.state().current_page, 3);
        assert_eq!(source.calls().last().map(|c| c.page), Some(3));
        assert_eq!(ctl.current_items().len(), 5);
    }

    #[tokio::test]
    async fn test_query_change_reloads_first_page() {
        let source = Arc::new(MockSource::server(40, 10));
        let ctl = controller(source.clone(), 10);
        ctl.load().await.unwrap();
        ctl.go_to_page(4).await.unwrap();

        ctl.set_query(None, Some("name desc".to_string())).await.unwrap();
        let last = source.calls().pop().unwrap();
        assert_eq!(last.page, 1);
        assert_eq!(last.order_by.as_deref(), Some("name desc"));
        assert_eq!(ctl.state().current_page, 1);
    }

    #[tokio::test]
    async fn test_failed_query_change_keeps_page_and_query() {
        let source = Arc::new(MockSource::server(40, 10));
        let ctl = controller(source.clone(), 10);
        ctl.load().await.unwrap();
        ctl.go_to_page(4).await.unwrap();

        source.fail_page(1);
        let result = ctl.set_query(None, Some("name desc".to_string())).await;
        assert!(matches!(result, Err(PagerError::Fetch { page: 1, .. })));

        let state = ctl.state();
        assert_eq!(state.current_page, 4);
        assert!(!state.is_loading);
        assert!(state.error.is_some());
        assert_eq!(ids(&ctl.current_items())[0], 30);
        assert_eq!(ctl.order_by(), None);

        // The slot was released, and the next page is fetched without the rejected ordering
        source.heal();
        ctl.go_to_page(3).await.unwrap();
        assert_eq!(source.calls().pop().unwrap().order_by, None);
    }

    #[tokio::test]
    async fn test_local_bounds_ignore_supplied_metadata() {
        let ctl = controller(Arc::new(MockSource::local(30)), 10);
        let meta = PaginationMetadata {
            total_pages: Some(3),
            total_elements: Some(30),
            first: true,
            last: false,
            ..PaginationMetadata::default()
        };
        ctl.set_dataset(crate::test_support::rows(30), Some(meta));

        assert_eq!(ctl.last().await.unwrap(), Transition::Committed { page: 3 });
        assert!(!ctl.is_first_page());
        assert!(ctl.is_last_page());
        assert_eq!(ctl.next().await.unwrap(), Transition::Unchanged);
        assert_eq!(ctl.navigation_flags(), NavigationFlags::from_bounds(false, true));
    }

    #[tokio::test]
    async fn test_set_dataset_clamps_page() {
        let ctl = controller(Arc::new(MockSource::local(50)), 10);
        ctl.load().await.unwrap();
        ctl.go_to_page(5).await.unwrap();

        ctl.set_dataset(crate::test_support::rows(12), None);
        let state = ctl.state();
        assert_eq!((state.total_pages, state.current_page), (2, 2));
        assert_eq!(ctl.current_items().len(), 2);
    }
}
