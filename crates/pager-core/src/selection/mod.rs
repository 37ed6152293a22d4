//! Selection state for paged lists
//!
//! Live selection is a list of rows. What gets persisted is a set of
//! [`SelectionRecord`]s: the page a row was selected on and its index within
//! that page. Records only make sense together with the page size in effect
//! when they were taken, so a page-size change goes through
//! [`remap_for_new_page_size`].
//!
//! The manager never publishes events itself. Callers announce the returned
//! [`SelectionOutcome`] once they have released whatever guards the manager.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::events::{SelectionChanged, SelectionLimitExceeded};
use crate::events::EventBus;
use crate::row::{Row, RowId};

/// Selection policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Clicking never selects
    None,
    /// One item; clicking the selected item keeps it selected
    #[default]
    Single,
    /// Any number of items, bounded by the selection limit
    Multi,
    /// Behaves like `Single`
    Radio,
}

impl SelectionPolicy {
    /// Resolve widget flags. Multi-select wins when both flags are set.
    pub fn from_flags(multiselect: bool, radioselect: bool) -> Self {
        match (multiselect, radioselect) {
            (true, _) => SelectionPolicy::Multi,
            (false, true) => SelectionPolicy::Radio,
            (false, false) => SelectionPolicy::Single,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, SelectionPolicy::Multi)
    }
}

/// Modifier keys held during a click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickModifiers {
    /// Ctrl / Cmd: flip membership of the clicked item
    pub toggle: bool,
    /// Shift: select from the anchor to the clicked item
    pub range: bool,
}

impl ClickModifiers {
    pub const NONE: Self = Self { toggle: false, range: false };
    pub const TOGGLE: Self = Self { toggle: true, range: false };
    pub const RANGE: Self = Self { toggle: false, range: true };
}

/// Result of a selection operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The whole selection was replaced
    Replaced,
    /// Items were added to or removed from the selection
    Changed,
    Unchanged,
    /// Aborted without mutation
    LimitExceeded { limit: usize, attempted: usize },
}

impl SelectionOutcome {
    pub fn is_change(&self) -> bool {
        matches!(self, SelectionOutcome::Replaced | SelectionOutcome::Changed)
    }

    /// Publish the events for this outcome; `selected` is the resulting selection size
    pub fn announce(&self, events: &EventBus, selected: usize) {
        match *self {
            SelectionOutcome::Replaced | SelectionOutcome::Changed => {
                events.publish(SelectionChanged { selected });
            }
            SelectionOutcome::LimitExceeded { limit, attempted } => {
                events.publish(SelectionLimitExceeded { limit, attempted });
            }
            SelectionOutcome::Unchanged => {}
        }
    }
}

/// Position of a selected row: page it was captured on and index within that page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub page: usize,
    pub index: usize,
}

impl SelectionRecord {
    pub fn new(page: usize, index: usize) -> Self {
        Self { page, index }
    }

    /// Offset of the record across all pages
    pub fn absolute_offset(&self, page_size: usize) -> usize {
        self.page.saturating_sub(1) * page_size + self.index
    }

    pub fn from_offset(offset: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            page: offset / page_size + 1,
            index: offset % page_size,
        }
    }
}

/// Owns the live selection of one list
pub struct SelectionStateManager<T> {
    policy: SelectionPolicy,
    limit: Option<usize>,
    selected: Vec<Row<T>>,
    /// Row of the last plain or toggle click; ranges start here while it is visible
    anchor: Option<Row<T>>,
}

impl<T: Clone + PartialEq> SelectionStateManager<T> {
    pub fn new(policy: SelectionPolicy, limit: Option<usize>) -> Self {
        Self {
            policy,
            limit: limit.filter(|l| *l > 0),
            selected: Vec::new(),
            anchor: None,
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn selected(&self) -> &[Row<T>] {
        &self.selected
    }

    pub fn selected_ids(&self) -> Vec<RowId> {
        self.selected.iter().map(|r| r.id.clone()).collect()
    }

    pub fn is_selected(&self, row: &Row<T>) -> bool {
        self.selected.iter().any(|s| s.same_item(row))
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Apply a click on `item`, which is shown in `page_items`
    pub fn click(
        &mut self,
        item: &Row<T>,
        page_items: &[Row<T>],
        modifiers: ClickModifiers,
    ) -> SelectionOutcome {
        match self.policy {
            SelectionPolicy::None => SelectionOutcome::Unchanged,
            SelectionPolicy::Single | SelectionPolicy::Radio => self.replace_with(item),
            SelectionPolicy::Multi if modifiers.range => {
                match page_items.iter().position(|r| r.same_item(item)) {
                    Some(target) => self.select_range(target, page_items),
                    None => self.toggle(item),
                }
            }
            SelectionPolicy::Multi if modifiers.toggle => self.toggle(item),
            SelectionPolicy::Multi => self.replace_with(item),
        }
    }

    /// Select every item on the page (multi only), honouring the limit
    pub fn select_all(&mut self, page_items: &[Row<T>]) -> SelectionOutcome {
        if !self.policy.is_multi() {
            return SelectionOutcome::Unchanged;
        }
        self.extend_with(page_items.iter())
    }

    pub fn deselect(&mut self, item: &Row<T>) -> SelectionOutcome {
        let before = self.selected.len();
        self.selected.retain(|s| !s.same_item(item));
        if self.selected.len() == before {
            SelectionOutcome::Unchanged
        } else {
            SelectionOutcome::Changed
        }
    }

    pub fn clear(&mut self) -> SelectionOutcome {
        self.anchor = None;
        if self.selected.is_empty() {
            return SelectionOutcome::Unchanged;
        }
        self.selected.clear();
        SelectionOutcome::Replaced
    }

    /// Records for the selected rows visible on `current_page`.
    ///
    /// Rows that are not on this page produce no record.
    pub fn to_persisted_records(&self, page_items: &[Row<T>], current_page: usize) -> Vec<SelectionRecord> {
        self.selected
            .iter()
            .filter_map(|selected| {
                page_items
                    .iter()
                    .position(|r| r.same_item(selected))
                    .map(|index| SelectionRecord::new(current_page, index))
            })
            .collect()
    }

    /// Re-select the rows addressed by `records` on the current page.
    ///
    /// Returns how many rows were selected.
    pub fn restore_from_records(
        &mut self,
        records: &[SelectionRecord],
        page_items: &[Row<T>],
        current_page: usize,
    ) -> usize {
        if self.policy == SelectionPolicy::None {
            return 0;
        }

        let mut restored = 0;
        for record in records.iter().filter(|r| r.page == current_page) {
            let Some(row) = page_items.get(record.index) else {
                continue;
            };
            if self.is_selected(row) {
                continue;
            }
            if !self.policy.is_multi() {
                self.selected.clear();
            } else if self.limit.is_some_and(|l| self.selected.len() >= l) {
                break;
            }
            self.selected.push(row.clone());
            self.anchor = Some(row.clone());
            restored += 1;
            if !self.policy.is_multi() {
                break;
            }
        }

        if restored > 0 {
            debug!("Restored {} selected rows on page {}", restored, current_page);
        }
        restored
    }

    fn replace_with(&mut self, item: &Row<T>) -> SelectionOutcome {
        if self.selected.len() == 1 && self.selected[0].same_item(item) {
            return SelectionOutcome::Unchanged;
        }
        self.selected = vec![item.clone()];
        self.anchor = Some(item.clone());
        SelectionOutcome::Replaced
    }

    fn toggle(&mut self, item: &Row<T>) -> SelectionOutcome {
        if self.is_selected(item) {
            self.selected.retain(|s| !s.same_item(item));
            self.anchor = Some(item.clone());
            return SelectionOutcome::Changed;
        }
        if let Some(limit) = self.limit {
            if self.selected.len() + 1 > limit {
                return self.limit_exceeded(limit, self.selected.len() + 1);
            }
        }
        self.selected.push(item.clone());
        self.anchor = Some(item.clone());
        SelectionOutcome::Changed
    }

    /// Select from the anchor to `target`; an anchor outside `page_items` selects `target` alone
    fn select_range(&mut self, target: usize, page_items: &[Row<T>]) -> SelectionOutcome {
        let anchor = self
            .anchor
            .as_ref()
            .and_then(|a| page_items.iter().position(|r| r.same_item(a)))
            .unwrap_or(target);
        let (start, end) = if anchor <= target { (anchor, target) } else { (target, anchor) };
        self.extend_with(page_items[start..=end].iter())
    }

    /// Add rows, all or nothing with respect to the limit
    fn extend_with<'a>(&mut self, rows: impl Iterator<Item = &'a Row<T>>) -> SelectionOutcome
    where
        T: 'a,
    {
        let mut additions: Vec<Row<T>> = Vec::new();
        for row in rows {
            if !self.is_selected(row) && !additions.iter().any(|a| a.same_item(row)) {
                additions.push(row.clone());
            }
        }
        if additions.is_empty() {
            return SelectionOutcome::Unchanged;
        }

        let attempted = self.selected.len() + additions.len();
        if let Some(limit) = self.limit {
            if attempted > limit {
                return self.limit_exceeded(limit, attempted);
            }
        }
        self.selected.extend(additions);
        SelectionOutcome::Changed
    }

    fn limit_exceeded(&self, limit: usize, attempted: usize) -> SelectionOutcome {
        debug!("Selection of {} items exceeds limit {}", attempted, limit);
        SelectionOutcome::LimitExceeded { limit, attempted }
    }
}

/// Combine records captured on the current page with previously persisted ones.
///
/// Multi-select keeps records from other pages. Single and radio selection
/// keep only the newest record; with nothing selected on this page the
/// previous record stands.
pub fn merge_with_existing(
    new_records: &[SelectionRecord],
    existing: &[SelectionRecord],
    is_multi: bool,
    current_page: usize,
) -> Vec<SelectionRecord> {
    if !is_multi {
        return match new_records.first() {
            Some(record) => vec![*record],
            None => existing.first().copied().into_iter().collect(),
        };
    }

    let mut merged: Vec<SelectionRecord> = existing
        .iter()
        .filter(|r| r.page != current_page)
        .copied()
        .chain(new_records.iter().copied())
        .collect();
    merged.sort();
    merged.dedup();
    merged
}

/// Re-express records captured under `old_size` for `new_size`
pub fn remap_for_new_page_size(
    records: &[SelectionRecord],
    old_size: usize,
    new_size: usize,
) -> Vec<SelectionRecord> {
    records
        .iter()
        .map(|r| SelectionRecord::from_offset(r.absolute_offset(old_size), new_size))
        .collect()
}
