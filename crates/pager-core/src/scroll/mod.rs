//! Infinite-scroll accumulation of server pages
//!
//! The display layer calls [`InfiniteScrollAccumulator::load_more`] when the
//! end of the list comes into view. Pages are appended to a buffer that only
//! grows until the ordering key or the dataset changes.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::{DataSource, FetchOptions, PaginationMetadata};
use crate::error::{PagerError, Result};
use crate::events::events::{FetchFailed, MoreLoaded};
use crate::events::EventBus;
use crate::flight::FlightGuard;
use crate::row::{Row, RowIds};

/// Accumulated rows and paging progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfiniteScrollState<T> {
    pub accumulated_data: Vec<Row<T>>,
    pub last_loaded_page: usize,
    pub is_initialized: bool,
}

impl<T> Default for InfiniteScrollState<T> {
    fn default() -> Self {
        Self {
            accumulated_data: Vec::new(),
            last_loaded_page: 0,
            is_initialized: false,
        }
    }
}

/// A first page handed to the accumulator together with what identifies its dataset
#[derive(Debug, Clone)]
pub struct SeedBatch<T> {
    pub rows: Vec<Row<T>>,
    pub metadata: Option<PaginationMetadata>,
    pub order_by: Option<String>,
    pub dataset_id: u64,
}

/// Why a `load_more` request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotInitialized,
    LastPage,
    InFlight,
    /// The list pages instead of accumulating
    NotAccumulating,
}

/// Result of a `load_more` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { page: usize, appended: usize },
    Skipped(SkipReason),
}

struct Inner<T> {
    scroll: InfiniteScrollState<T>,
    metadata: Option<PaginationMetadata>,
    order_by: Option<String>,
    dataset_id: Option<u64>,
    /// Set once a page comes back empty
    exhausted: bool,
    /// Bumped on every reset so late responses from a previous dataset are discarded
    generation: u64,
    error: Option<String>,
}

/// Single-flight page accumulator for scroll navigation
pub struct InfiniteScrollAccumulator<T> {
    inner: RwLock<Inner<T>>,
    in_flight: AtomicBool,
    row_ids: Arc<RowIds<T>>,
    events: Arc<EventBus>,
}

impl<T> InfiniteScrollAccumulator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(row_ids: Arc<RowIds<T>>, events: Arc<EventBus>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                scroll: InfiniteScrollState::default(),
                metadata: None,
                order_by: None,
                dataset_id: None,
                exhausted: false,
                generation: 0,
                error: None,
            }),
            in_flight: AtomicBool::new(false),
            row_ids,
            events,
        }
    }

    /// Feed the first page of a dataset.
    ///
    /// Resets when the ordering key changed, or when the dataset changed while
    /// nothing has been accumulated; seeds when not yet initialized. Returns
    /// whether the batch was taken as the new seed.
    pub fn seed(&self, batch: SeedBatch<T>) -> bool {
        let mut inner = self.inner.write();

        let order_changed = inner.dataset_id.is_some() && inner.order_by != batch.order_by;
        let identity_changed = inner.dataset_id.is_some_and(|id| id != batch.dataset_id)
            && inner.scroll.accumulated_data.is_empty();
        if order_changed || identity_changed {
            info!(
                "Resetting accumulated rows (order changed: {}, dataset changed: {})",
                order_changed, identity_changed
            );
            Self::reset_inner(&mut inner);
        }

        inner.order_by = batch.order_by;
        inner.dataset_id = Some(batch.dataset_id);

        if inner.scroll.is_initialized {
            return false;
        }

        inner.scroll.last_loaded_page = batch.metadata.as_ref().map_or(1, |m| m.number + 1);
        inner.exhausted = batch.rows.is_empty();
        inner.scroll.accumulated_data = batch.rows;
        inner.scroll.is_initialized = true;
        inner.metadata = batch.metadata;
        inner.error = None;
        debug!(
            "Seeded {} rows at page {}",
            inner.scroll.accumulated_data.len(),
            inner.scroll.last_loaded_page
        );
        true
    }

    /// Drop everything; the next `seed` starts over
    pub fn reset(&self) {
        Self::reset_inner(&mut self.inner.write());
    }

    fn reset_inner(inner: &mut Inner<T>) {
        inner.scroll = InfiniteScrollState::default();
        inner.metadata = None;
        inner.exhausted = false;
        inner.error = None;
        inner.generation += 1;
    }

    /// Fetch and append the next page.
    ///
    /// `base` carries size, search and ordering; its page is replaced.
    pub async fn load_more(
        &self,
        source: &dyn DataSource<T>,
        base: FetchOptions,
    ) -> Result<LoadOutcome> {
        let (next_page, generation) = {
            let inner = self.inner.read();
            if !inner.scroll.is_initialized {
                return Ok(LoadOutcome::Skipped(SkipReason::NotInitialized));
            }
            if inner.exhausted || inner.metadata.as_ref().is_some_and(|m| m.last) {
                return Ok(LoadOutcome::Skipped(SkipReason::LastPage));
            }
            (inner.scroll.last_loaded_page + 1, inner.generation)
        };

        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            debug!("Load more dropped: page {} is already loading", next_page);
            return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
        };

        let options = FetchOptions {
            page: next_page,
            ..base
        };
        debug!("Loading page {} from {}", next_page, source.source_name());

        match source.invoke(options).await {
            Ok(response) => {
                let rows = self.row_ids.assign(response.data);
                let appended = rows.len();
                let metadata = response.pagination.or_else(|| source.pagination());

                let total_loaded = {
                    let mut inner = self.inner.write();
                    if inner.generation != generation {
                        debug!("Discarding page {} loaded for a previous dataset", next_page);
                        return Ok(LoadOutcome::Skipped(SkipReason::NotInitialized));
                    }
                    inner.scroll.accumulated_data.extend(rows);
                    inner.scroll.last_loaded_page = next_page;
                    inner.exhausted = appended == 0;
                    inner.metadata = metadata;
                    inner.error = None;
                    inner.scroll.accumulated_data.len()
                };

                self.events.publish(MoreLoaded {
                    page: next_page,
                    appended,
                    total_loaded,
                });
                Ok(LoadOutcome::Loaded {
                    page: next_page,
                    appended,
                })
            }
            Err(e) => {
                let error = PagerError::fetch(next_page, &e);
                warn!("Load more failed: {}", error);
                self.inner.write().error = Some(error.to_string());
                self.events.publish(FetchFailed {
                    source_name: source.source_name().to_string(),
                    page: next_page,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    pub fn state(&self) -> InfiniteScrollState<T> {
        self.inner.read().scroll.clone()
    }

    pub fn accumulated(&self) -> Vec<Row<T>> {
        self.inner.read().scroll.accumulated_data.clone()
    }

    /// No further page will be requested
    pub fn is_last_page(&self) -> bool {
        let inner = self.inner.read();
        inner.exhausted || inner.metadata.as_ref().is_some_and(|m| m.last)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn error(&self) -> Option<String> {
        self.inner.read().error.clone()
    }

    pub fn metadata(&self) -> Option<PaginationMetadata> {
        self.inner.read().metadata.clone()
    }
}
