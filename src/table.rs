use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::domain::TVError;

pub type Row = Map<String, Value>;

/// A page of rows as delivered by the data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    pub total_rows: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TableData {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            total_rows: rows.len(),
            columns,
            rows,
        }
    }

    /// Cell lookup, `None` when the row does not carry the field.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    pub fn load(path: &Path) -> Result<Self, TVError> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TVError::FileNotFound,
            ErrorKind::PermissionDenied => TVError::PermissionDenied,
            _ => TVError::IoError(e),
        })?;
        let data: TableData = serde_json::from_str(&content)?;
        info!(
            "Loaded {} rows x {} columns from {}",
            data.rows.len(),
            data.columns.len(),
            path.display()
        );
        Ok(data)
    }
}
