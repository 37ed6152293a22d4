//! SQLite data source with server-side paging

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use parking_lot::RwLock;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Number, Value};
use tracing::debug;
use pager_core::data::{DataSource, FetchOptions, PageResponse, PaginationMetadata};
use pager_core::filter::{FilterMap, LogicalOp, MatchMode, SortDirection, SortSpec};

use crate::DataError;

/// SQLite table paged with `LIMIT/OFFSET` and counted with `COUNT(*)`
pub struct SqliteSource {
    path: PathBuf,
    table_name: String,
    columns: Vec<String>,
    max_results: AtomicUsize,
    last: RwLock<Option<PaginationMetadata>>,
}

/// A statement fragment with its bound parameters
struct Clause {
    sql: String,
    params: Vec<SqlValue>,
}

impl SqliteSource {
    /// Open `table_name` in the database at `path`
    pub async fn new<P: AsRef<Path>>(path: P, table_name: impl Into<String>) -> Result<Self, DataError> {
        let path = path.as_ref().to_path_buf();
        let table_name = table_name.into();
        if !is_identifier(&table_name) {
            return Err(DataError::InvalidTable(table_name));
        }

        let columns = tokio::task::spawn_blocking({
            let path = path.clone();
            let table_name = table_name.clone();
            move || -> Result<Vec<String>, DataError> {
                let conn = Connection::open(&path)?;
                Self::detect_columns(&conn, &table_name)
            }
        })
        .await??;

        Ok(Self {
            path,
            table_name,
            columns,
            max_results: AtomicUsize::new(10),
            last: RwLock::new(None),
        })
    }

    /// Column names from `PRAGMA table_info`
    fn detect_columns(conn: &Connection, table_name: &str) -> Result<Vec<String>, DataError> {
        let query = format!("PRAGMA table_info(\"{}\")", table_name);
        let mut stmt = conn.prepare(&query)?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(DataError::InvalidTable(format!("table '{}' has no columns", table_name)));
        }
        Ok(columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn column(&self, name: &str) -> Result<String, DataError> {
        if self.columns.iter().any(|c| c == name) {
            Ok(format!("\"{}\"", name))
        } else {
            Err(DataError::InvalidColumn(name.to_string()))
        }
    }

    /// `WHERE` clause for a filter object; conditions combine left to right
    fn where_clause(&self, filters: Option<&FilterMap>) -> Result<Clause, DataError> {
        let mut sql = String::new();
        let mut params = Vec::new();

        for (field, condition) in filters.into_iter().flatten() {
            let column = self.column(field)?;
            let text = match &condition.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let escaped = text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");

            let (predicate, param) = match condition.match_mode {
                MatchMode::StartsWith => (format!("{} LIKE ? ESCAPE '\\'", column), SqlValue::Text(format!("{}%", escaped))),
                MatchMode::Contains => (format!("{} LIKE ? ESCAPE '\\'", column), SqlValue::Text(format!("%{}%", escaped))),
                MatchMode::NotContains => (format!("{} NOT LIKE ? ESCAPE '\\'", column), SqlValue::Text(format!("%{}%", escaped))),
                MatchMode::EndsWith => (format!("{} LIKE ? ESCAPE '\\'", column), SqlValue::Text(format!("%{}", escaped))),
                MatchMode::Equals => (format!("{} = ?", column), to_sql_value(&condition.value)),
                MatchMode::NotEquals => (format!("{} <> ?", column), to_sql_value(&condition.value)),
                MatchMode::LessThan => (format!("{} < ?", column), to_sql_value(&condition.value)),
                MatchMode::LessThanOrEqual => (format!("{} <= ?", column), to_sql_value(&condition.value)),
                MatchMode::GreaterThan => (format!("{} > ?", column), to_sql_value(&condition.value)),
                MatchMode::GreaterThanOrEqual => (format!("{} >= ?", column), to_sql_value(&condition.value)),
            };

            if sql.is_empty() {
                sql.push_str(" WHERE ");
            } else {
                sql.push_str(match condition.logical_op {
                    LogicalOp::And => " AND ",
                    LogicalOp::Or => " OR ",
                });
            }
            sql.push_str(&predicate);
            params.push(param);
        }

        Ok(Clause { sql, params })
    }

    fn order_clause(&self, order_by: Option<&str>) -> Result<String, DataError> {
        let Some(sort) = order_by.and_then(SortSpec::parse) else {
            return Ok(String::new());
        };
        let direction = match sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        Ok(format!(" ORDER BY {} {}", self.column(&sort.field)?, direction))
    }

    /// Count and fetch one page
    fn query_page(
        path: &Path,
        table_name: &str,
        filter: Clause,
        order: String,
        limit: usize,
        offset: usize,
    ) -> Result<(usize, Vec<Value>), DataError> {
        let conn = Connection::open(path)?;

        let count_sql = format!("SELECT COUNT(*) FROM \"{}\"{}", table_name, filter.sql);
        let total: i64 = conn.query_row(&count_sql, params_from_iter(filter.params.iter()), |row| row.get(0))?;

        let page_sql = format!(
            "SELECT * FROM \"{}\"{}{} LIMIT {} OFFSET {}",
            table_name, filter.sql, order, limit, offset
        );
        let mut stmt = conn.prepare(&page_sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

        let mut rows = stmt.query(params_from_iter(filter.params.iter()))?;
        let mut data = Vec::new();
        while let Some(row) = rows.next()? {
            let mut object = Map::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                object.insert(name.clone(), to_json(row.get_ref(idx)?));
            }
            data.push(Value::Object(object));
        }

        Ok((usize::try_from(total).unwrap_or(0), data))
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

#[async_trait]
impl DataSource<Value> for SqliteSource {
    async fn invoke(&self, options: FetchOptions) -> anyhow::Result<PageResponse<Value>> {
        let page = options.page.max(1);
        let size = options.size.unwrap_or_else(|| self.max_results()).max(1);
        let filter = self.where_clause(options.filter_fields.as_ref())?;
        let order = self.order_clause(options.order_by.as_deref())?;
        debug!("Querying {} page {} (size {}){}{}", self.table_name, page, size, filter.sql, order);

        let (total, data) = tokio::task::spawn_blocking({
            let path = self.path.clone();
            let table_name = self.table_name.clone();
            move || Self::query_page(&path, &table_name, filter, order, size, (page - 1) * size)
        })
        .await
        .map_err(DataError::from)??;

        let metadata = PaginationMetadata::for_page(page, size, total, data.len());
        *self.last.write() = Some(metadata.clone());
        Ok(PageResponse::new(data, Some(metadata)))
    }

    fn pagination(&self) -> Option<PaginationMetadata> {
        self.last.read().clone()
    }

    fn is_pageable(&self) -> bool {
        true
    }

    fn max_results(&self) -> usize {
        self.max_results.load(Ordering::Relaxed)
    }

    fn set_max_results(&self, max_results: usize) {
        self.max_results.store(max_results, Ordering::Relaxed);
    }

    fn source_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use pager_core::events::EventBus;
    use pager_core::filter::{convert_filter_array_to_object, Filter};
    use pager_core::navigation::{NavigationMode, PaginationController, Transition};
    use pager_core::row::RowIds;
    use tempfile::TempDir;

    fn sample_db(rows: usize) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, team TEXT, score REAL);")
            .unwrap();
        for i in 0..rows {
            let team = if i % 2 == 0 { "red" } else { "blue" };
            conn.execute(
                "INSERT INTO people (id, name, team, score) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![i as i64, format!("person_{:02}", i), team, i as f64 / 2.0],
            )
            .unwrap();
        }
        (dir, path)
    }

    fn ids(rows: &[Value]) -> Vec<i64> {
        rows.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[tokio::test]
    async fn test_detects_columns() {
        let (_dir, path) = sample_db(3);
        let source = SqliteSource::new(&path, "people").await.unwrap();
        assert_eq!(source.columns(), &["id", "name", "team", "score"]);
        assert_eq!(source.source_name(), "sample.db");
    }

    #[tokio::test]
    async fn test_last_page_window_and_metadata() {
        let (_dir, path) = sample_db(25);
        let source = SqliteSource::new(&path, "people").await.unwrap();

        let response = source.invoke(FetchOptions::page(3).with_size(10)).await.unwrap();
        assert_eq!(ids(&response.data), vec![20, 21, 22, 23, 24]);

        let meta = response.pagination.unwrap();
        assert_eq!(meta.total_elements, Some(25));
        assert_eq!(meta.total_pages, Some(3));
        assert_eq!(meta.number, 2);
        assert!(meta.last);
        assert!(!meta.first);
        assert_eq!(source.pagination(), Some(meta));
    }

    #[tokio::test]
    async fn test_filters_and_order_are_pushed_down() {
        let (_dir, path) = sample_db(20);
        let source = SqliteSource::new(&path, "people").await.unwrap();
        let filters = convert_filter_array_to_object(&[
            Filter::new("team", "red", MatchMode::Equals),
            Filter::new("score", 3, MatchMode::GreaterThanOrEqual),
        ]);
        let options = FetchOptions {
            filter_fields: Some(filters),
            order_by: Some("score desc".to_string()),
            ..FetchOptions::page(1).with_size(3)
        };

        let response = source.invoke(options).await.unwrap();
        assert_eq!(ids(&response.data), vec![18, 16, 14]);
        // red rows with score >= 3: ids 6, 8, ..., 18
        assert_eq!(response.pagination.unwrap().total_elements, Some(7));
    }

    #[tokio::test]
    async fn test_like_wildcards_are_escaped() {
        let (_dir, path) = sample_db(12);
        let source = SqliteSource::new(&path, "people").await.unwrap();
        let search = |value: &str| FetchOptions {
            filter_fields: Some(convert_filter_array_to_object(&[Filter::new(
                "name",
                value,
                MatchMode::StartsWith,
            )])),
            ..FetchOptions::page(1).with_size(20)
        };

        assert_eq!(ids(&source.invoke(search("person_1")).await.unwrap().data), vec![10, 11]);
        // A literal "%" matches nothing instead of everything
        assert!(source.invoke(search("person%1")).await.unwrap().data.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_columns_and_tables_rejected() {
        let (_dir, path) = sample_db(5);
        assert!(matches!(
            SqliteSource::new(&path, "people; DROP TABLE people").await,
            Err(DataError::InvalidTable(_))
        ));
        assert!(matches!(
            SqliteSource::new(&path, "missing").await,
            Err(DataError::InvalidTable(_))
        ));

        let source = SqliteSource::new(&path, "people").await.unwrap();
        let options = FetchOptions {
            order_by: Some("password asc".to_string()),
            ..FetchOptions::page(1)
        };
        assert!(source.invoke(options).await.is_err());
    }

    #[tokio::test]
    async fn test_drives_pagination_controller() {
        let (_dir, path) = sample_db(45);
        let source = Arc::new(SqliteSource::new(&path, "people").await.unwrap());
        let controller = PaginationController::new(
            source,
            Arc::new(RowIds::by_field("id")),
            20,
            NavigationMode::Basic,
            Arc::new(EventBus::new()),
        );

        controller.load().await.unwrap();
        assert_eq!(controller.state().total_pages, 3);
        assert_eq!(controller.last().await.unwrap(), Transition::Committed { page: 3 });
        assert_eq!(controller.current_items().len(), 5);
        assert!(controller.is_last_page());
    }
}
