//! List state: wires pagination, scrolling, grouping, selection and persistence
//! behind the callbacks a list widget forwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use ahash::AHashSet;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ListConfig;
use crate::data::DataSource;
use crate::error::Result;
use crate::events::events::{ConfigWarning, StateRestored};
use crate::events::EventBus;
use crate::filter::{convert_filter_array_to_object, Filter, FilterMap, SortSpec};
use crate::grouping::{flatten, group, paginate_groups, GroupValue, GroupedDataItem};
use crate::navigation::{NavigationFlags, PaginationController, PaginationState, Transition};
use crate::persistence::{PersistedState, StatePersistence, StateStore};
use crate::row::{Row, RowId, RowIds};
use crate::scroll::{InfiniteScrollAccumulator, LoadOutcome, SeedBatch, SkipReason};
use crate::selection::{
    merge_with_existing, remap_for_new_page_size, ClickModifiers, SelectionOutcome, SelectionRecord,
    SelectionStateManager,
};

/// Everything the display layer needs to render one frame of the list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState<T> {
    pub current_items: Vec<Row<T>>,
    /// Empty unless the list is grouped; collapsed groups carry no rows
    pub groups: Vec<GroupedDataItem<T>>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub page_size: usize,
    pub is_first_page: bool,
    pub is_last_page: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub navigation: NavigationFlags,
    pub selected: Vec<RowId>,
}

#[derive(Debug, Clone, Default)]
struct QueryState {
    search: Vec<Filter>,
    sort: Option<SortSpec>,
}

impl QueryState {
    fn filter_fields(&self) -> Option<FilterMap> {
        let map = convert_filter_array_to_object(&self.search);
        (!map.is_empty()).then_some(map)
    }

    fn order_by(&self) -> Option<String> {
        self.sort.as_ref().map(SortSpec::to_order_by)
    }
}

/// State of one list widget
pub struct ListState<T> {
    config: ListConfig,
    controller: PaginationController<T>,
    accumulator: InfiniteScrollAccumulator<T>,
    selection: Mutex<SelectionStateManager<T>>,
    persistence: StatePersistence,
    events: Arc<EventBus>,
    query: RwLock<QueryState>,
    collapsed: RwLock<AHashSet<String>>,
    /// Selection records as last persisted
    records: Mutex<Vec<SelectionRecord>>,
    dataset_id: AtomicU64,
}

impl ListState<Value> {
    /// List over JSON rows keyed by the configured id field
    pub fn for_json(
        config: ListConfig,
        source: Arc<dyn DataSource<Value>>,
        store: Arc<dyn StateStore>,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        let row_ids = match &config.id_field {
            Some(field) => RowIds::by_field(field.clone()),
            None => RowIds::sequential(),
        };
        Self::new(config, source, row_ids, store, events)
    }
}

impl<T> ListState<T>
where
    T: GroupValue + Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(
        config: ListConfig,
        source: Arc<dyn DataSource<T>>,
        row_ids: RowIds<T>,
        store: Arc<dyn StateStore>,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        config.validate()?;
        for message in config.warnings() {
            events.publish(ConfigWarning {
                widget: config.name.clone(),
                message,
            });
        }

        let row_ids = Arc::new(row_ids);
        let controller = PaginationController::new(
            source,
            row_ids.clone(),
            config.page_size,
            config.navigation,
            events.clone(),
        );
        let accumulator = InfiniteScrollAccumulator::new(row_ids, events.clone());
        let selection = SelectionStateManager::new(config.selection_policy(), config.selection_limit());
        let persistence = StatePersistence::new(config.storage_key(), store);
        let query = QueryState {
            search: Vec::new(),
            sort: config.order_by.as_deref().and_then(SortSpec::parse),
        };

        Ok(Self {
            config,
            controller,
            accumulator,
            selection: Mutex::new(selection),
            persistence,
            events,
            query: RwLock::new(query),
            collapsed: RwLock::new(AHashSet::new()),
            records: Mutex::new(Vec::new()),
            dataset_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    pub fn controller(&self) -> &PaginationController<T> {
        &self.controller
    }

    pub fn accumulator(&self) -> &InfiniteScrollAccumulator<T> {
        &self.accumulator
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Selection records as they were last written
    pub fn persisted_records(&self) -> Vec<SelectionRecord> {
        self.records.lock().clone()
    }

    /// Server pages are appended by the accumulator instead of replaced
    fn uses_accumulator(&self) -> bool {
        self.controller.is_server_paged() && self.config.navigation.accumulates()
    }

    /// Restore persisted state and run the first load
    pub async fn mount(&self) -> Result<DisplayState<T>> {
        let restored = self.persistence.restore();

        if let Some(state) = &restored {
            let mut query = self.query.write();
            if let Some(search) = &state.search {
                query.search = search.clone();
            }
            if state.sort.is_some() {
                query.sort = state.sort.clone();
            }
        }
        let (filter_fields, order_by) = {
            let query = self.query.read();
            (query.filter_fields(), query.order_by())
        };
        self.controller.restore_query(filter_fields, order_by);

        if let Some(state) = &restored {
            let page = if self.uses_accumulator() { 1 } else { state.pagination };
            self.controller.restore_position(page, state.pagesize);

            let page_size = self.controller.state().page_size;
            let records = match state.actualpagesize {
                Some(captured) if captured != page_size => {
                    remap_for_new_page_size(&state.selected_item, captured, page_size)
                }
                _ => state.selected_item.clone(),
            };
            *self.records.lock() = records;
        }

        self.controller.load().await?;
        self.seed_accumulator();

        if restored.is_some() {
            let selected_records = self.restore_selection(self.restore_windows());
            let page = self.controller.state().current_page;
            info!(
                "Restored {} at page {} with {} selected rows",
                self.persistence.key(),
                page,
                selected_records
            );
            self.events.publish(StateRestored {
                key: self.persistence.key().clone(),
                page,
                selected_records,
            });
        }

        self.persist(false);
        Ok(self.snapshot())
    }

    pub fn snapshot(&self) -> DisplayState<T> {
        let state = self.controller.state();
        let (current_items, groups) = self.window(&state);
        let groups = self.apply_collapsed(groups);

        let (current_page, is_first_page, is_last_page) = if self.uses_accumulator() {
            (
                self.accumulator.state().last_loaded_page.max(1),
                true,
                self.accumulator.is_last_page(),
            )
        } else {
            (
                state.current_page,
                self.controller.is_first_page(),
                self.controller.is_last_page(),
            )
        };

        DisplayState {
            current_items,
            groups,
            current_page,
            total_pages: state.total_pages,
            total_items: state.total_items,
            page_size: state.page_size,
            is_first_page,
            is_last_page,
            is_loading: state.is_loading || self.accumulator.is_loading(),
            error: state.error.or_else(|| self.accumulator.error()),
            navigation: NavigationFlags::from_bounds(is_first_page, is_last_page),
            selected: self.selection.lock().selected_ids(),
        }
    }

    pub async fn on_page_change(&self, page: usize) -> Result<Transition> {
        let transition = self.controller.go_to_page(page).await?;
        if matches!(transition, Transition::Committed { .. }) {
            self.restore_loaded_pages();
            self.persist(false);
        }
        Ok(transition)
    }

    /// Manual page entry, committed on blur
    pub async fn on_page_input(&self, raw: &str) -> Result<Transition> {
        let transition = self.controller.commit_page_input(raw).await?;
        if matches!(transition, Transition::Committed { .. }) {
            self.restore_loaded_pages();
            self.persist(false);
        }
        Ok(transition)
    }

    pub async fn on_page_size_change(&self, page_size: usize) -> Result<Transition> {
        let previous = self.controller.state().page_size;
        let transition = self.controller.change_page_size(page_size).await?;
        if !matches!(transition, Transition::Committed { .. }) {
            return Ok(transition);
        }

        {
            let mut records = self.records.lock();
            let remapped = remap_for_new_page_size(&records, previous, page_size);
            *records = remapped;
        }
        if self.uses_accumulator() {
            self.start_new_dataset();
            self.seed_accumulator();
        }
        self.restore_loaded_pages();
        self.persist(false);
        Ok(transition)
    }

    /// Grow the window by one page in on-demand and scroll modes
    pub async fn on_load_more(&self) -> Result<LoadOutcome> {
        if self.uses_accumulator() {
            let base = self
                .controller
                .fetch_options(1, self.controller.state().page_size);
            let outcome = self
                .accumulator
                .load_more(self.controller.source().as_ref(), base)
                .await?;
            if matches!(outcome, LoadOutcome::Loaded { .. }) {
                self.restore_loaded_pages();
                self.persist(false);
            }
            return Ok(outcome);
        }

        if !self.config.navigation.accumulates() {
            return Ok(LoadOutcome::Skipped(SkipReason::NotAccumulating));
        }

        let before = self.controller.current_items().len();
        let outcome = match self.controller.next().await? {
            Transition::Committed { page } => {
                let appended = self.controller.current_items().len().saturating_sub(before);
                self.persist(false);
                LoadOutcome::Loaded { page, appended }
            }
            Transition::Unchanged => LoadOutcome::Skipped(SkipReason::LastPage),
            Transition::Dropped => LoadOutcome::Skipped(SkipReason::InFlight),
        };
        Ok(outcome)
    }

    /// Click on a visible row
    pub fn on_item_click(&self, row_id: &RowId, modifiers: ClickModifiers) -> SelectionOutcome {
        let state = self.controller.state();
        let (items, _) = self.window(&state);
        let Some(item) = items.iter().find(|r| &r.id == row_id).cloned() else {
            debug!("Ignoring click on row {} outside the window", row_id);
            return SelectionOutcome::Unchanged;
        };

        self.select(|selection| selection.click(&item, &items, modifiers))
    }

    pub fn on_select_all(&self) -> SelectionOutcome {
        let state = self.controller.state();
        let (items, _) = self.window(&state);
        self.select(|selection| selection.select_all(&items))
    }

    pub fn on_clear_selection(&self) -> SelectionOutcome {
        self.select(|selection| selection.clear())
    }

    /// Toggle a group header; returns whether the group is now collapsed
    pub fn on_header_click(&self, group_key: &str) -> bool {
        let mut collapsed = self.collapsed.write();
        if collapsed.remove(group_key) {
            false
        } else {
            collapsed.insert(group_key.to_string());
            true
        }
    }

    /// Replace the search filters and reload from the first page
    pub async fn on_search(&self, filters: Vec<Filter>) -> Result<Transition> {
        let map = convert_filter_array_to_object(&filters);
        let filter_fields = (!map.is_empty()).then_some(map);
        let order_by = self.query.read().order_by();
        self.requery(filter_fields, order_by, move |query| query.search = filters)
            .await
    }

    /// Replace the ordering and reload from the first page
    pub async fn on_sort(&self, sort: Option<SortSpec>) -> Result<Transition> {
        let filter_fields = self.query.read().filter_fields();
        let order_by = sort.as_ref().map(SortSpec::to_order_by);
        self.requery(filter_fields, order_by, move |query| query.sort = sort)
            .await
    }

    async fn requery<F>(
        &self,
        filter_fields: Option<FilterMap>,
        order_by: Option<String>,
        apply: F,
    ) -> Result<Transition>
    where
        F: FnOnce(&mut QueryState),
    {
        // A rejected fetch leaves the displayed rows, the buffer and the records alone
        let transition = self.controller.set_query(filter_fields, order_by).await?;
        if transition == Transition::Dropped {
            return Ok(transition);
        }

        apply(&mut *self.query.write());
        // Records address positions in the previous result set
        self.records.lock().clear();
        self.start_new_dataset();
        self.seed_accumulator();
        self.persist(false);
        Ok(transition)
    }

    fn start_new_dataset(&self) {
        let id = self.dataset_id.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Starting dataset {}", id);
        self.accumulator.reset();
    }

    fn seed_accumulator(&self) {
        if !self.uses_accumulator() {
            return;
        }
        self.accumulator.seed(SeedBatch {
            rows: self.controller.rows(),
            metadata: self.controller.metadata(),
            order_by: self.controller.order_by(),
            dataset_id: self.dataset_id.load(Ordering::Acquire),
        });
    }

    /// Visible rows in display order, and their groups when grouping is on
    fn window(&self, state: &PaginationState) -> (Vec<Row<T>>, Vec<GroupedDataItem<T>>) {
        let accumulating = self.uses_accumulator();
        let Some(path) = self.config.group_by.as_deref() else {
            let items = if accumulating {
                self.accumulator.accumulated()
            } else {
                self.controller.current_items()
            };
            return (items, Vec::new());
        };

        let groups = if accumulating {
            group(&self.accumulator.accumulated(), path)
        } else if self.controller.is_server_paged() {
            group(&self.controller.rows(), path)
        } else {
            paginate_groups(
                &group(&self.controller.rows(), path),
                state.current_page,
                state.page_size,
                state.navigation_mode,
            )
        };
        (flatten(&groups), groups)
    }

    fn apply_collapsed(&self, groups: Vec<GroupedDataItem<T>>) -> Vec<GroupedDataItem<T>> {
        let collapsed = self.collapsed.read();
        groups
            .into_iter()
            .map(|mut g| {
                if collapsed.contains(&g.key) {
                    g.data.clear();
                }
                g
            })
            .collect()
    }

    /// Visible rows split into the pages they were loaded as
    fn record_windows(&self) -> Vec<(usize, Vec<Row<T>>)> {
        let state = self.controller.state();
        let (items, _) = self.window(&state);
        if !state.navigation_mode.accumulates() {
            return vec![(state.current_page, items)];
        }
        items
            .chunks(state.page_size.max(1))
            .enumerate()
            .map(|(i, chunk)| (i + 1, chunk.to_vec()))
            .collect()
    }

    /// Pages whose rows are available for restoring a selection.
    ///
    /// Local sources hold every row, so every page qualifies.
    fn restore_windows(&self) -> Vec<(usize, Vec<Row<T>>)> {
        if self.controller.is_server_paged() {
            return self.record_windows();
        }
        let page_size = self.controller.state().page_size.max(1);
        let rows = match self.config.group_by.as_deref() {
            Some(path) => flatten(&group(&self.controller.rows(), path)),
            None => self.controller.rows(),
        };
        rows.chunks(page_size)
            .enumerate()
            .map(|(i, chunk)| (i + 1, chunk.to_vec()))
            .collect()
    }

    /// Run a selection operation, then persist and announce it with the selection unlocked
    fn select<F>(&self, operation: F) -> SelectionOutcome
    where
        F: FnOnce(&mut SelectionStateManager<T>) -> SelectionOutcome,
    {
        let (outcome, selected) = {
            let mut selection = self.selection.lock();
            let outcome = operation(&mut selection);
            (outcome, selection.selected().len())
        };
        match outcome {
            SelectionOutcome::Replaced => self.persist(true),
            SelectionOutcome::Changed => self.persist(false),
            SelectionOutcome::Unchanged | SelectionOutcome::LimitExceeded { .. } => {}
        }
        outcome.announce(&self.events, selected);
        outcome
    }

    /// Re-select persisted records found in `windows`; returns how many rows were selected
    fn restore_selection(&self, windows: Vec<(usize, Vec<Row<T>>)>) -> usize {
        let records = self.records.lock().clone();
        if records.is_empty() {
            return 0;
        }
        let (restored, selected) = {
            let mut selection = self.selection.lock();
            let restored = windows
                .iter()
                .map(|(page, rows)| selection.restore_from_records(&records, rows, *page))
                .sum::<usize>();
            (restored, selection.selected().len())
        };
        if restored > 0 {
            SelectionOutcome::Changed.announce(&self.events, selected);
        }
        restored
    }

    /// Server sources only hold the pages they fetched, so records for a
    /// newly fetched page become live selection when it arrives
    fn restore_loaded_pages(&self) {
        if self.controller.is_server_paged() {
            self.restore_selection(self.record_windows());
        }
    }

    /// Write the committed state; `replaced` discards records from other pages
    fn persist(&self, replaced: bool) {
        let windows = self.record_windows();
        let records = {
            let selection = self.selection.lock();
            let mut records = self.records.lock();
            if replaced {
                records.clear();
            }
            for (page, rows) in &windows {
                let captured = selection.to_persisted_records(rows, *page);
                let merged = merge_with_existing(&captured, &records, selection.policy().is_multi(), *page);
                *records = merged;
            }
            records.clone()
        };

        let state = self.controller.state();
        let query = self.query.read().clone();
        let persisted = PersistedState {
            pagination: state.current_page,
            pagesize: (state.page_size != self.config.page_size).then_some(state.page_size),
            actualpagesize: (!records.is_empty()).then_some(state.page_size),
            selected_item: records,
            search: (!query.search.is_empty()).then_some(query.search),
            sort: query.sort,
        };

        if let Err(e) = self.persistence.save(&persisted) {
            warn!("Failed to persist state of {}: {}", self.persistence.key(), e);
        }
    }
}
