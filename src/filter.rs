use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::format::{normalize_filter, to_filter_text};
use crate::table::{Row, TableData};

/// Normalized, non-empty predicates derived from the raw user input.
struct Predicates<'a> {
    global: Option<String>,
    columns: Vec<(&'a str, String)>,
}

impl<'a> Predicates<'a> {
    fn new(global: &str, column_filters: &'a BTreeMap<String, String>) -> Self {
        let global = Some(normalize_filter(global)).filter(|g| !g.is_empty());
        let columns = column_filters
            .iter()
            .map(|(name, term)| (name.as_str(), normalize_filter(term)))
            .filter(|(_, term)| !term.is_empty())
            .collect();
        Self { global, columns }
    }

    fn is_empty(&self) -> bool {
        self.global.is_none() && self.columns.is_empty()
    }

    fn matches(&self, row: &Row, columns: &[String]) -> bool {
        if let Some(global) = &self.global {
            let hit = columns
                .iter()
                .any(|c| to_filter_text(row.get(c)).contains(global.as_str()));
            if !hit {
                return false;
            }
        }
        self.columns
            .iter()
            .all(|(name, term)| to_filter_text(row.get(*name)).contains(term.as_str()))
    }
}

/// Returns the original indices of all rows matching the global filter and
/// every active column filter, in their original order.
pub fn filter_rows(
    table: &TableData,
    global: &str,
    column_filters: &BTreeMap<String, String>,
) -> Vec<usize> {
    let predicates = Predicates::new(global, column_filters);
    if predicates.is_empty() {
        return (0..table.rows.len()).collect();
    }
    table
        .rows
        .par_iter()
        .enumerate()
        .filter(|(_, row)| predicates.matches(row, &table.columns))
        .map(|(idx, _)| idx)
        .collect()
}

/// True when any filter input would restrict the row set.
pub fn has_active_filters(global: &str, column_filters: &BTreeMap<String, String>) -> bool {
    !Predicates::new(global, column_filters).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> TableData {
        let rows = vec![
            json!({"id": 1, "name": "Alpha", "notes": "ABCdef"}),
            json!({"id": 2, "name": "beta", "notes": null}),
            json!({"id": 3, "name": "Gamma", "vec": [0.5, 1.5]}),
            json!({"id": 10, "name": "alphabet"}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
        TableData::new(
            vec!["id".into(), "name".into(), "notes".into(), "vec".into()],
            rows,
        )
    }

    fn column(name: &str, term: &str) -> BTreeMap<String, String> {
        BTreeMap::from([(name.to_string(), term.to_string())])
    }

    #[test]
    fn no_filters_keeps_everything() {
        let t = table();
        assert_eq!(filter_rows(&t, "  ", &BTreeMap::new()), vec![0, 1, 2, 3]);
        assert_eq!(filter_rows(&t, "", &column("name", " ")), vec![0, 1, 2, 3]);
    }

    #[test]
    fn global_filter_is_case_insensitive_substring() {
        let t = table();
        assert_eq!(filter_rows(&t, "abc", &BTreeMap::new()), vec![0]);
        assert_eq!(filter_rows(&t, " ALPHA ", &BTreeMap::new()), vec![0, 3]);
    }

    #[test]
    fn global_filter_matches_raw_vector_json() {
        let t = table();
        assert_eq!(filter_rows(&t, "0.5,1.5", &BTreeMap::new()), vec![2]);
        assert!(filter_rows(&t, "vector", &BTreeMap::new()).is_empty());
    }

    #[test]
    fn column_filters_and_global_combine() {
        let t = table();
        assert_eq!(filter_rows(&t, "", &column("id", "1")), vec![0, 3]);
        assert_eq!(filter_rows(&t, "alpha", &column("id", "1")), vec![0, 3]);
        assert_eq!(filter_rows(&t, "bet", &column("id", "1")), vec![3]);
        assert!(filter_rows(&t, "", &column("unknown", "x")).is_empty());
    }

    #[test]
    fn result_is_subset_and_idempotent() {
        let t = table();
        let filters = column("name", "a");
        let first = filter_rows(&t, "a", &filters);
        assert!(first.len() <= t.rows.len());
        for &idx in &first {
            assert!(to_filter_text(t.rows[idx].get("name")).contains('a'));
        }
        let subset = TableData::new(
            t.columns.clone(),
            first.iter().map(|&i| t.rows[i].clone()).collect(),
        );
        assert_eq!(filter_rows(&subset, "a", &filters).len(), first.len());
    }

    #[test]
    fn detects_active_filters() {
        assert!(!has_active_filters(" ", &column("a", "")));
        assert!(has_active_filters("", &column("a", "x")));
        assert!(has_active_filters("x", &BTreeMap::new()));
    }
}
