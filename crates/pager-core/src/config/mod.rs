//! Widget configuration

use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PagerError, Result};
use crate::navigation::NavigationMode;
use crate::persistence::{StorageKey, StorageScope};
use crate::selection::SelectionPolicy;

const BOTH_SELECTION_FLAGS: &str = "multiselect and radioselect are both set; using multiselect";

/// Configuration of one list widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Widget name, part of the storage key
    pub name: String,

    /// Widget type (list, table, cards), part of the storage key
    pub widget_type: String,

    pub storage_scope: StorageScope,

    pub navigation: NavigationMode,

    pub page_size: usize,

    pub multiselect: bool,

    pub radioselect: bool,

    /// Maximum number of selected items; 0 means unlimited
    pub selection_limit: usize,

    /// Dot-separated path to group rows by
    pub group_by: Option<String>,

    /// Initial ordering, e.g. `"name desc"`
    pub order_by: Option<String>,

    /// Top-level field holding a stable row key
    pub id_field: Option<String>,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            name: "list".to_string(),
            widget_type: "list".to_string(),
            storage_scope: StorageScope::None,
            navigation: NavigationMode::Basic,
            page_size: 10,
            multiselect: false,
            radioselect: false,
            selection_limit: 0,
            group_by: None,
            order_by: None,
            id_field: Some("id".to_string()),
        }
    }
}

impl ListConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ListConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PagerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(PagerError::InvalidPageSize);
        }
        if self.name.trim().is_empty() {
            return Err(PagerError::Config("widget name must not be empty".to_string()));
        }
        if self.group_by.as_deref().is_some_and(|g| g.trim().is_empty()) {
            return Err(PagerError::Config("group_by must not be empty".to_string()));
        }
        Ok(())
    }

    /// Effective selection policy; multiselect wins over radioselect
    pub fn selection_policy(&self) -> SelectionPolicy {
        if self.multiselect && self.radioselect {
            warn!("Widget {}: {}", self.name, BOTH_SELECTION_FLAGS);
        }
        SelectionPolicy::from_flags(self.multiselect, self.radioselect)
    }

    /// Conflicts that were resolved by a fixed policy
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.multiselect && self.radioselect {
            warnings.push(BOTH_SELECTION_FLAGS.to_string());
        }
        warnings
    }

    pub fn selection_limit(&self) -> Option<usize> {
        (self.selection_limit > 0).then_some(self.selection_limit)
    }

    pub fn storage_key(&self) -> StorageKey {
        StorageKey::new(self.name.clone(), self.widget_type.clone(), self.storage_scope)
    }
}
