//! Persisted list state
//!
//! A list's pagination, page size, selection records, search and sort are
//! stored as one JSON document under a namespaced key. The document is read
//! once at mount and rewritten after each committed change; returning to the
//! default state removes the key.

use std::fmt;
use std::sync::Arc;
use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::filter::{Filter, SortSpec};
use crate::selection::SelectionRecord;

/// Where a list keeps its state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Persistence disabled
    #[default]
    None,
    /// Lives as long as the process
    Session,
    /// Survives restarts
    Local,
}

impl fmt::Display for StorageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageScope::None => "none",
            StorageScope::Session => "session",
            StorageScope::Local => "local",
        };
        f.write_str(name)
    }
}

/// Namespaced storage key of one widget
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey {
    pub widget_name: String,
    pub widget_type: String,
    pub scope: StorageScope,
}

impl StorageKey {
    pub fn new(widget_name: impl Into<String>, widget_type: impl Into<String>, scope: StorageScope) -> Self {
        Self {
            widget_name: widget_name.into(),
            widget_type: widget_type.into(),
            scope,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.scope != StorageScope::None
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scope, self.widget_type, self.widget_name)
    }
}

fn first_page() -> usize {
    1
}

/// Serialized state of one list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default = "first_page")]
    pub pagination: usize,

    /// Page size chosen by the user, when it differs from the configured one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagesize: Option<usize>,

    /// Page size in effect when `selected_item` was captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actualpagesize: Option<usize>,

    #[serde(rename = "selectedItem", default)]
    pub selected_item: Vec<SelectionRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<Vec<Filter>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            pagination: first_page(),
            pagesize: None,
            actualpagesize: None,
            selected_item: Vec::new(),
            search: None,
            sort: None,
        }
    }
}

impl PersistedState {
    /// Whether there is nothing worth storing.
    ///
    /// `actualpagesize` only qualifies records and does not count.
    pub fn is_default(&self) -> bool {
        self.pagination <= 1
            && self.pagesize.is_none()
            && self.selected_item.is_empty()
            && self.search.as_ref().map_or(true, |s| s.is_empty())
            && self.sort.is_none()
    }
}

/// Key-value backend for persisted state
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: String) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store, used for session scope
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<AHashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Reads and writes the state of one list
pub struct StatePersistence {
    key: StorageKey,
    store: Arc<dyn StateStore>,
}

impl StatePersistence {
    pub fn new(key: StorageKey, store: Arc<dyn StateStore>) -> Self {
        Self { key, store }
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    /// Stored state, if any.
    ///
    /// Unreadable or malformed documents count as absent.
    pub fn restore(&self) -> Option<PersistedState> {
        if !self.key.is_enabled() {
            return None;
        }

        let raw = match self.store.get(&self.key.to_string()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read persisted state for {}: {}", self.key, e);
                return None;
            }
        };

        match serde_json::from_str::<PersistedState>(&raw) {
            Ok(state) => {
                debug!("Restored persisted state for {}", self.key);
                Some(state)
            }
            Err(e) => {
                warn!("Ignoring malformed persisted state for {}: {}", self.key, e);
                None
            }
        }
    }

    /// Store `state`, or remove the key when it is the default state
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        if !self.key.is_enabled() {
            return Ok(());
        }

        let key = self.key.to_string();
        if state.is_default() {
            debug!("State of {} is default, removing key", key);
            return self.store.remove(&key);
        }

        let json = serde_json::to_string(state)?;
        debug!("Persisting state of {}: {}", key, json);
        self.store.set(&key, json)
    }

    pub fn clear(&self) -> Result<()> {
        if !self.key.is_enabled() {
            return Ok(());
        }
        self.store.remove(&self.key.to_string())
    }

    /// Read-modify-write of the stored state; the last writer wins
    pub fn update<F>(&self, f: F) -> Result<PersistedState>
    where
        F: FnOnce(&mut PersistedState),
    {
        let mut state = self.restore().unwrap_or_default();
        f(&mut state);
        self.save(&state)?;
        Ok(state)
    }
}
