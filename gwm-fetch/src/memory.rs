use crate::{Direction, FetchError, Filter, PageRange, TableQuery, TabularSource};
use csv::ReaderBuilder;
use gwm_core::Row;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// Tables held in memory behind the [`TabularSource`] contract.
///
/// Applies filters, ordering, range and projection the way the HTTP
/// backend does, and counts requests so callers can assert on traffic.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: HashMap<String, Vec<Row>>,
    requests: AtomicUsize,
    fail_from: Option<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.insert(table.into(), rows);
        self
    }

    /// Every request numbered `index` or later (zero-based) fails with a
    /// transport error.
    pub fn failing_from(mut self, index: usize) -> Self {
        self.fail_from = Some(index);
        self
    }

    /// Number of `fetch_range` calls served so far.
    pub fn requests(&self) -> usize {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    /// Load a table from CSV text with a header row.
    ///
    /// Every field is kept as text; empty fields become null.
    pub fn rows_from_csv(csv_data: &str) -> Result<Vec<Row>, csv::Error> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_data.as_bytes());
        let headers = rdr.headers()?.clone();
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let row = headers
                .iter()
                .zip(record.iter())
                .map(|(field, value)| {
                    let value = value.trim();
                    let value = if value.is_empty() {
                        Value::Null
                    } else {
                        Value::String(value.to_string())
                    };
                    (field.trim().to_string(), value)
                });
            rows.push(Row::from_pairs(row));
        }
        Ok(rows)
    }

    /// Load every `<table>.csv` file in `dir` as a table named after the file.
    pub fn from_csv_dir(dir: &Path) -> Result<Self, csv::Error> {
        let mut source = MemorySource::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(table) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let csv_data = std::fs::read_to_string(&path)?;
            let rows = Self::rows_from_csv(&csv_data)?;
            log::info!("offline source: loaded {} rows into {}", rows.len(), table);
            source.tables.insert(table.to_string(), rows);
        }
        Ok(source)
    }

    fn matches(row: &Row, filter: &Filter) -> bool {
        match filter {
            Filter::Eq(column, value) => row.text(column).as_deref() == Some(value.as_str()),
            Filter::NotNull(column) => !row.is_null(column),
        }
    }
}

/// Numbers compare numerically, text lexically, nulls greatest.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => value_text(x).cmp(&value_text(y)),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl TabularSource for MemorySource {
    async fn fetch_range(&self, query: &TableQuery, range: PageRange) -> Result<Vec<Row>, FetchError> {
        let index = self.requests.fetch_add(1, AtomicOrdering::SeqCst);
        if self.fail_from.is_some_and(|from| index >= from) {
            return Err(FetchError::Transport(format!("request {} refused", index)));
        }
        let Some(rows) = self.tables.get(&query.table) else {
            return Err(FetchError::Status {
                status: 404,
                body: format!("relation \"{}\" does not exist", query.table),
            });
        };

        let mut selected: Vec<&Row> = rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| Self::matches(row, f)))
            .collect();
        if let Some((column, direction)) = &query.order {
            selected.sort_by(|a, b| {
                let ordering = compare_values(a.get(column), b.get(column));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        Ok(selected
            .into_iter()
            .skip(range.from)
            .take(range.len())
            .map(|row| row.project(&query.columns))
            .collect())
    }
}
