//! Pagination subscriber trait

use super::PaginationState;

/// Trait for components that re-render when pagination state changes
pub trait PaginationSubscriber: Send + Sync {
    /// Called after every state change, including optimistic updates and rollbacks
    fn on_pagination_change(&self, state: &PaginationState);
}
