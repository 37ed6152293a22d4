//! Stable row identity
//!
//! Every item entering the engine is wrapped in a [`Row`] carrying a [`RowId`].
//! Ids are assigned once, either from a declared key field or from a
//! monotonic counter, so selection and accumulation can match rows across
//! refetches with a cheap id comparison.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use serde::{Deserialize, Serialize};

/// Identifier stamped on a row when it enters the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowId {
    /// Key read from the item itself; stable across refetches
    Key(String),
    /// Counter-issued id; unique within one assigner
    Seq(u64),
}

impl RowId {
    /// Whether this id survives a refetch of the same item
    pub fn is_declared(&self) -> bool {
        matches!(self, RowId::Key(_))
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Key(key) => write!(f, "{}", key),
            RowId::Seq(n) => write!(f, "#{}", n),
        }
    }
}

/// An item together with its row id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row<T> {
    pub id: RowId,
    pub data: T,
}

impl<T: PartialEq> Row<T> {
    /// Whether two rows denote the same logical item.
    ///
    /// Declared keys decide on their own; otherwise equal ids or equal data match.
    pub fn same_item(&self, other: &Row<T>) -> bool {
        match (&self.id, &other.id) {
            (RowId::Key(a), RowId::Key(b)) => a == b,
            (a, b) => a == b || self.data == other.data,
        }
    }
}

type KeyFn<T> = Arc<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// Assigns row ids to incoming items
pub struct RowIds<T> {
    key_fn: Option<KeyFn<T>>,
    next: AtomicU64,
}

impl<T> RowIds<T> {
    /// Counter-only assigner
    pub fn sequential() -> Self {
        Self {
            key_fn: None,
            next: AtomicU64::new(1),
        }
    }

    /// Assigner that reads a declared key, falling back to the counter
    pub fn keyed<F>(key_fn: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            key_fn: Some(Arc::new(key_fn)),
            next: AtomicU64::new(1),
        }
    }

    /// Wrap a single item
    pub fn assign_one(&self, data: T) -> Row<T> {
        let id = self
            .key_fn
            .as_ref()
            .and_then(|f| f(&data))
            .map(RowId::Key)
            .unwrap_or_else(|| RowId::Seq(self.next.fetch_add(1, Ordering::Relaxed)));
        Row { id, data }
    }

    /// Wrap a batch of items, preserving order
    pub fn assign(&self, items: Vec<T>) -> Vec<Row<T>> {
        items.into_iter().map(|item| self.assign_one(item)).collect()
    }
}

impl RowIds<serde_json::Value> {
    /// Read the key from a top-level field of a JSON row
    pub fn by_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::keyed(move |value: &serde_json::Value| match value.get(&field)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    }
}

impl<T> Default for RowIds<T> {
    fn default() -> Self {
        Self::sequential()
    }
}
