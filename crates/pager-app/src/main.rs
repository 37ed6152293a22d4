//! Drives a server-paged list through navigation, selection and persistence

mod create_sample_db;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pager_core::events::events::{
    ConfigWarning, FetchFailed, MoreLoaded, PageChanged, PageSizeChanged, SelectionChanged,
    SelectionLimitExceeded, StateRestored,
};
use pager_core::{
    ClickModifiers, DisplayState, EventBus, Filter, ListConfig, ListState, MatchMode, MemoryStore,
    NavigationMode, SortDirection, SortSpec, StateStore, StorageScope,
};
use pager_data::{FileStore, SqliteSource};

const SAMPLE_ROWS: usize = 137;

fn demo_config() -> ListConfig {
    ListConfig {
        name: "orders".to_string(),
        widget_type: "table".to_string(),
        storage_scope: StorageScope::Local,
        navigation: NavigationMode::Pager,
        page_size: 10,
        multiselect: true,
        selection_limit: 5,
        group_by: Some("region".to_string()),
        ..ListConfig::default()
    }
}

fn log_events(events: &EventBus) {
    events.on::<PageChanged, _>(|e| info!("page {} -> {}", e.previous, e.page));
    events.on::<PageSizeChanged, _>(|e| info!("page size {} -> {}", e.previous, e.page_size));
    events.on::<MoreLoaded, _>(|e| info!("loaded page {} (+{}, {} total)", e.page, e.appended, e.total_loaded));
    events.on::<SelectionChanged, _>(|e| info!("{} rows selected", e.selected));
    events.on::<SelectionLimitExceeded, _>(|e| {
        warn!("selection of {} rows exceeds the limit of {}", e.attempted, e.limit)
    });
    events.on::<FetchFailed, _>(|e| warn!("{} failed on page {}: {}", e.source_name, e.page, e.error));
    events.on::<StateRestored, _>(|e| {
        info!("restored {} at page {} ({} selected)", e.key, e.page, e.selected_records)
    });
    events.on::<ConfigWarning, _>(|e| warn!("{}: {}", e.widget, e.message));
}

fn render(label: &str, view: &DisplayState<Value>) {
    info!(
        "[{}] page {}/{} ({} items, size {}){}{}",
        label,
        view.current_page,
        view.total_pages,
        view.total_items,
        view.page_size,
        if view.is_loading { " loading" } else { "" },
        view.error.as_deref().map(|e| format!(" error: {}", e)).unwrap_or_default(),
    );
    if view.groups.is_empty() {
        for row in &view.current_items {
            info!("    {} {}", row.id, row.data);
        }
    } else {
        for group in &view.groups {
            info!(
                "  {} ({} of {}, from {})",
                group.key,
                group.data.len(),
                group.original_data_length,
                group.start_index_in_group
            );
            for row in &group.data {
                info!("    {} {}", row.id, row.data);
            }
        }
    }
    info!("  selected: {:?}", view.selected);
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ListConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => demo_config(),
    };

    let work_dir: PathBuf = std::env::temp_dir().join("pager-demo");
    std::fs::create_dir_all(&work_dir)?;
    let db_path = work_dir.join("orders.db");
    create_sample_db::create_sample_database(&db_path, SAMPLE_ROWS)?;
    info!("Sample database at {}", db_path.display());

    let store: Arc<dyn StateStore> = match config.storage_scope {
        StorageScope::Local => Arc::new(FileStore::open(work_dir.join("state.json"))?),
        StorageScope::Session | StorageScope::None => Arc::new(MemoryStore::new()),
    };
    let events = Arc::new(EventBus::new());
    log_events(&events);

    let source = Arc::new(SqliteSource::new(&db_path, "orders").await?);
    let list = ListState::for_json(config, source, store, events)?;

    render("mount", &list.mount().await?);

    if list.config().navigation.accumulates() {
        for _ in 0..2 {
            list.on_load_more().await?;
        }
        render("load more", &list.snapshot());
    } else {
        list.on_page_change(3).await?;
        render("page 3", &list.snapshot());
    }

    let visible: Vec<_> = list.snapshot().current_items.iter().map(|r| r.id.clone()).collect();
    if let [first, second, .., last] = visible.as_slice() {
        list.on_item_click(first, ClickModifiers::NONE);
        list.on_item_click(second, ClickModifiers::TOGGLE);
        // Exceeds the selection limit on a full page and leaves the selection alone
        list.on_item_click(last, ClickModifiers::RANGE);
    }
    if let Some(group) = list.snapshot().groups.first() {
        list.on_header_click(&group.key);
    }
    render("selection", &list.snapshot());

    list.on_page_size_change(20).await?;
    render("page size 20", &list.snapshot());

    list.on_search(vec![Filter::new("region", "north", MatchMode::Equals)]).await?;
    list.on_sort(Some(SortSpec::new("amount", SortDirection::Desc))).await?;
    render("north by amount", &list.snapshot());

    match list.on_page_input("999").await {
        Ok(transition) => info!("page input 999 -> {:?}", transition),
        Err(e) => warn!("page input failed: {}", e),
    }
    info!("Persisted selection records: {:?}", list.persisted_records());

    Ok(())
}
