//! Per table view preferences.
//!
//! Only the view mode, the density and the column widths are remembered. They
//! are stored as a small JSON record under a key derived from the table
//! identity. Storage problems never reach the user: they are logged and the
//! defaults are used instead.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::TVError;
use crate::layout::ColumnWidths;

const KEY_PREFIX: &str = "ldb-view-";
const PREFS_PATH_ENV: &str = "TVGRID_PREFS_PATH";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Row,
    Column,
}

impl ViewMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "row" => Some(ViewMode::Row),
            "column" => Some(ViewMode::Column),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Row => ViewMode::Column,
            ViewMode::Column => ViewMode::Row,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    #[default]
    Standard,
    Compact,
}

impl Density {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(Density::Standard),
            "compact" => Some(Density::Compact),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Density::Standard => Density::Compact,
            Density::Compact => Density::Standard,
        }
    }
}

/// Which table the preferences belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableIdentity {
    pub db_path: String,
    pub table_name: String,
}

impl TableIdentity {
    pub fn new(db_path: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            table_name: table_name.into(),
        }
    }

    /// Storage key, `None` while either part is unknown.
    pub fn key(&self) -> Option<String> {
        if self.db_path.is_empty() || self.table_name.is_empty() {
            return None;
        }
        Some(prefs_key(&self.db_path, &self.table_name))
    }
}

/// Encodes the pair as a JSON array so that no two distinct tables share a
/// key, whatever characters their names contain.
pub fn prefs_key(db_path: &str, table_name: &str) -> String {
    let pair = Value::from(vec![db_path, table_name]);
    format!("{KEY_PREFIX}{pair}")
}

pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, TVError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), TVError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, TVError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), TVError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Keeps all records in one JSON object file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `$TVGRID_PREFS_PATH`, else `<config dir>/tvgrid/view-prefs.json`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(PREFS_PATH_ENV) {
            return PathBuf::from(path);
        }
        let mut base = dirs::config_dir().unwrap_or_else(std::env::temp_dir);
        base.push("tvgrid");
        base.push("view-prefs.json");
        base
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, TVError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, TVError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), TVError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// The part of the view state that outlives a table switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedViewPrefs {
    pub view_mode: ViewMode,
    pub density: Density,
    pub column_widths: ColumnWidths,
}

impl PersistedViewPrefs {
    /// Reads the record for `key`. Missing or unreadable records give the
    /// defaults; malformed fields are dropped one by one.
    pub fn load(store: &dyn PreferenceStore, key: &str) -> Self {
        let raw = match store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No view preferences stored for {key}");
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to load view preferences for {key}: {e}");
                return Self::default();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                warn!("Failed to parse view preferences for {key}: {e}");
                Self::default()
            }
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let mut prefs = Self::default();
        let Some(record) = value.as_object() else {
            warn!("View preference record is not an object, ignoring it");
            return prefs;
        };
        if let Some(mode) = record
            .get("viewMode")
            .and_then(Value::as_str)
            .and_then(ViewMode::parse)
        {
            prefs.view_mode = mode;
        }
        if let Some(density) = record
            .get("density")
            .and_then(Value::as_str)
            .and_then(Density::parse)
        {
            prefs.density = density;
        }
        if let Some(widths) = record.get("columnWidths").and_then(Value::as_object) {
            for (column, width) in widths {
                match width.as_f64().filter(|w| w.is_finite()) {
                    Some(w) => {
                        prefs.column_widths.set(column, w.round() as i64);
                    }
                    None => debug!("Dropping stored width {width} for column {column}"),
                }
            }
        }
        prefs
    }

    /// Writes the record; failures are logged and discarded.
    pub fn save(&self, store: &mut dyn PreferenceStore, key: &str) {
        let result = serde_json::to_string(self)
            .map_err(TVError::from)
            .and_then(|json| store.set(key, &json));
        if let Err(e) = result {
            warn!("Failed to save view preferences for {key}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{MAX_COLUMN_WIDTH, MIN_COLUMN_WIDTH};
    use serde_json::json;

    struct BrokenStore;

    impl PreferenceStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, TVError> {
            Err(std::io::Error::other("unavailable").into())
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), TVError> {
            Err(std::io::Error::other("unavailable").into())
        }
    }

    #[test]
    fn keys_do_not_collide() {
        assert_ne!(prefs_key("a::b", "c"), prefs_key("a", "b::c"));
        assert_eq!(prefs_key("/db", "t"), prefs_key("/db", "t"));
        assert!(prefs_key("/db", "t").starts_with(KEY_PREFIX));
        assert_eq!(TableIdentity::new("", "t").key(), None);
        assert_eq!(TableIdentity::new("/db", "").key(), None);
    }

    #[test]
    fn round_trips_through_store() {
        let mut store = MemoryStore::new();
        let mut prefs = PersistedViewPrefs {
            view_mode: ViewMode::Column,
            density: Density::Compact,
            ..Default::default()
        };
        prefs.column_widths.set("name", 240);
        prefs.save(&mut store, "k");
        let raw = store.get("k").unwrap().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&raw).unwrap(),
            json!({"viewMode": "column", "density": "compact", "columnWidths": {"name": 240}})
        );
        assert_eq!(PersistedViewPrefs::load(&store, "k"), prefs);
    }

    #[test]
    fn malformed_fields_are_dropped_individually() {
        let value = json!({
            "viewMode": "diagonal",
            "density": "compact",
            "columnWidths": {"a": 20, "b": 5000, "c": "wide", "d": 150.6, "e": null}
        });
        let prefs = PersistedViewPrefs::from_value(&value);
        assert_eq!(prefs.view_mode, ViewMode::Row);
        assert_eq!(prefs.density, Density::Compact);
        assert_eq!(prefs.column_widths.get("a"), Some(MIN_COLUMN_WIDTH));
        assert_eq!(prefs.column_widths.get("b"), Some(MAX_COLUMN_WIDTH));
        assert_eq!(prefs.column_widths.get("c"), None);
        assert_eq!(prefs.column_widths.get("d"), Some(151));
        assert_eq!(prefs.column_widths.get("e"), None);
    }

    #[test]
    fn corrupt_or_failing_store_gives_defaults() {
        let mut store = MemoryStore::new();
        store.set("k", "{not json").unwrap();
        assert_eq!(PersistedViewPrefs::load(&store, "k"), PersistedViewPrefs::default());
        store.set("k", "[1, 2]").unwrap();
        assert_eq!(PersistedViewPrefs::load(&store, "k"), PersistedViewPrefs::default());

        let mut broken = BrokenStore;
        assert_eq!(PersistedViewPrefs::load(&broken, "k"), PersistedViewPrefs::default());
        PersistedViewPrefs::default().save(&mut broken, "k");
    }

    #[test]
    fn file_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("view-prefs.json");
        let mut store = FileStore::new(path.clone());
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        let reopened = FileStore::new(path);
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view-prefs.json");
        fs::write(&path, "garbage").unwrap();
        let store = FileStore::new(path);
        assert!(matches!(store.get("a"), Err(TVError::JsonError(_))));
        assert_eq!(PersistedViewPrefs::load(&store, "a"), PersistedViewPrefs::default());
    }
}
