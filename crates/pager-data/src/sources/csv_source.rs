//! CSV file loaded as JSON rows

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use csv::ReaderBuilder;
use serde_json::{Map, Number, Value};
use tracing::info;
use pager_core::data::{DataSource, FetchOptions, PageResponse, PaginationMetadata};

use super::local_source::LocalSource;
use crate::DataError;

/// CSV data source; rows are held in memory and paged locally
pub struct CsvSource {
    path: PathBuf,
    columns: Vec<String>,
    rows: LocalSource<Value>,
}

impl CsvSource {
    /// Read the whole file on a blocking thread
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref().to_path_buf();
        let (columns, rows) = tokio::task::spawn_blocking({
            let path = path.clone();
            move || Self::read_file(&path)
        })
        .await??;

        info!("Loaded {} rows with {} columns from {}", rows.len(), columns.len(), path.display());
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.csv")
            .to_string();

        Ok(Self {
            rows: LocalSource::json(name, rows),
            path,
            columns,
        })
    }

    fn read_file(path: &Path) -> Result<(Vec<String>, Vec<Value>), DataError> {
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Map<String, Value> = columns
                .iter()
                .zip(record.iter())
                .map(|(column, cell)| (column.clone(), parse_cell(cell)))
                .collect();
            rows.push(Value::Object(row));
        }
        Ok((columns, rows))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Type a cell: integers, floats and booleans become JSON scalars, blanks become null
fn parse_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

#[async_trait]
impl DataSource<Value> for CsvSource {
    async fn invoke(&self, options: FetchOptions) -> anyhow::Result<PageResponse<Value>> {
        self.rows.invoke(options).await
    }

    fn pagination(&self) -> Option<PaginationMetadata> {
        None
    }

    fn is_pageable(&self) -> bool {
        false
    }

    fn max_results(&self) -> usize {
        self.rows.max_results()
    }

    fn set_max_results(&self, max_results: usize) {
        self.rows.set_max_results(max_results);
    }

    fn source_name(&self) -> &str {
        self.rows.source_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use pager_core::filter::{convert_filter_array_to_object, Filter, MatchMode};
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_cells_are_typed() {
        let file = write_csv("id,name,score,active\n1,Ann,4.5,true\n2,Ben,,false\n3, Cy ,7,yes\n");
        let source = CsvSource::new(file.path()).await.unwrap();

        assert_eq!(source.columns(), &["id", "name", "score", "active"]);
        assert_eq!(source.row_count(), 3);

        let rows = source.invoke(FetchOptions::page(1)).await.unwrap().data;
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["score"], 4.5);
        assert_eq!(rows[0]["active"], true);
        assert!(rows[1]["score"].is_null());
        assert_eq!(rows[2]["name"], "Cy");
        assert_eq!(rows[2]["active"], "yes");
    }

    #[tokio::test]
    async fn test_search_runs_in_memory() {
        let file = write_csv("id,city\n1,Oslo\n2,Osaka\n3,Lima\n");
        let source = CsvSource::new(file.path()).await.unwrap();

        let options = FetchOptions {
            filter_fields: Some(convert_filter_array_to_object(&[Filter::new(
                "city",
                "os",
                MatchMode::StartsWith,
            )])),
            order_by: Some("city asc".to_string()),
            ..FetchOptions::page(1)
        };
        let rows = source.invoke(options).await.unwrap().data;
        let cities: Vec<&str> = rows.iter().filter_map(|r| r["city"].as_str()).collect();
        assert_eq!(cities, vec!["Osaka", "Oslo"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CsvSource::new(dir.path().join("absent.csv")).await;
        assert!(matches!(result, Err(DataError::Io(_))));
    }
}
