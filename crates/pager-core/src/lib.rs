//! Core pagination and state-synchronization engine for list widgets
//!
//! This crate turns a local array or a server-paged source into a consistent
//! window of rows, and keeps selection, grouping, infinite scroll and
//! persisted state in step with it.

pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod filter;
pub mod grouping;
pub mod navigation;
pub mod persistence;
pub mod row;
pub mod scroll;
pub mod selection;
pub mod state;

pub(crate) mod flight;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::ListConfig;
pub use data::{DataSource, FetchOptions, PageResponse, PaginationMetadata};
pub use error::{PagerError, Result};
pub use events::EventBus;
pub use filter::{Filter, FilterMap, MatchMode, SortDirection, SortSpec};
pub use grouping::{GroupValue, GroupedDataItem};
pub use navigation::{
    NavigationFlags, NavigationMode, PaginationController, PaginationState, PaginationSubscriber,
    Transition,
};
pub use persistence::{MemoryStore, PersistedState, StatePersistence, StateStore, StorageKey, StorageScope};
pub use row::{Row, RowId, RowIds};
pub use scroll::{InfiniteScrollAccumulator, LoadOutcome, SkipReason};
pub use selection::{ClickModifiers, SelectionOutcome, SelectionPolicy, SelectionRecord, SelectionStateManager};
pub use state::{DisplayState, ListState};
