use std::cmp::Ordering;

use crate::format::compare_values;
use crate::table::TableData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }
}

/// Next sort state after a click on `column`.
///
/// Cycles ascending, descending, unsorted on the same column; clicking a
/// different column starts over with ascending.
pub fn toggle_sort(current: Option<&SortSpec>, column: &str) -> Option<SortSpec> {
    match current {
        Some(spec) if spec.column == column => match spec.direction {
            SortDirection::Ascending => Some(SortSpec {
                column: spec.column.clone(),
                direction: SortDirection::Descending,
            }),
            SortDirection::Descending => None,
        },
        _ => Some(SortSpec::ascending(column)),
    }
}

/// Stable sort of original row indices.
///
/// The direction is applied to the comparator result as a whole, so missing
/// values sort last when ascending and first when descending.
pub fn sort_rows(table: &TableData, indices: &mut [usize], spec: Option<&SortSpec>) {
    let Some(spec) = spec else {
        return;
    };
    let column = spec.column.as_str();
    indices.sort_by(|&a, &b| {
        spec.direction
            .apply(compare_values(table.cell(a, column), table.cell(b, column)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn ages() -> TableData {
        let rows = [json!({"age": 30}), json!({"age": null}), json!({"age": 5})]
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        TableData::new(vec!["age".into()], rows)
    }

    fn sorted_ages(direction: SortDirection) -> Vec<Value> {
        let t = ages();
        let mut idx: Vec<usize> = (0..t.rows.len()).collect();
        let spec = SortSpec {
            column: "age".into(),
            direction,
        };
        sort_rows(&t, &mut idx, Some(&spec));
        idx.iter().map(|&i| t.rows[i]["age"].clone()).collect()
    }

    #[test]
    fn ascending_puts_nulls_last() {
        assert_eq!(
            sorted_ages(SortDirection::Ascending),
            vec![json!(5), json!(30), Value::Null]
        );
    }

    #[test]
    fn descending_puts_nulls_first() {
        assert_eq!(
            sorted_ages(SortDirection::Descending),
            vec![Value::Null, json!(30), json!(5)]
        );
    }

    #[test]
    fn no_spec_keeps_order() {
        let t = ages();
        let mut idx = vec![2, 0, 1];
        sort_rows(&t, &mut idx, None);
        assert_eq!(idx, vec![2, 0, 1]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let rows = [
            json!({"k": "a", "n": 1}),
            json!({"k": "B", "n": 2}),
            json!({"k": "A", "n": 3}),
            json!({"k": "b", "n": 4}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
        let t = TableData::new(vec!["k".into(), "n".into()], rows);
        let mut idx: Vec<usize> = (0..4).collect();
        sort_rows(&t, &mut idx, Some(&SortSpec::ascending("k")));
        assert_eq!(idx, vec![0, 2, 1, 3]);
    }

    #[test]
    fn sorted_output_respects_comparator() {
        let rows = ["row10", "row9", "Row1", "row100"]
            .into_iter()
            .map(|s| json!({"name": s}).as_object().cloned().unwrap())
            .collect();
        let t = TableData::new(vec!["name".into()], rows);
        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let spec = SortSpec {
                column: "name".into(),
                direction,
            };
            let mut idx: Vec<usize> = (0..4).collect();
            sort_rows(&t, &mut idx, Some(&spec));
            for pair in idx.windows(2) {
                let ord = compare_values(t.cell(pair[0], "name"), t.cell(pair[1], "name"));
                assert_ne!(direction.apply(ord), Ordering::Greater);
            }
        }
    }

    #[test]
    fn toggle_cycles_through_three_states() {
        let first = toggle_sort(None, "age");
        assert_eq!(first, Some(SortSpec::ascending("age")));
        let second = toggle_sort(first.as_ref(), "age");
        assert_eq!(
            second.as_ref().map(|s| s.direction),
            Some(SortDirection::Descending)
        );
        assert_eq!(toggle_sort(second.as_ref(), "age"), None);
    }

    #[test]
    fn toggle_on_other_column_restarts_ascending() {
        let desc = SortSpec {
            column: "age".into(),
            direction: SortDirection::Descending,
        };
        assert_eq!(
            toggle_sort(Some(&desc), "name"),
            Some(SortSpec::ascending("name"))
        );
    }
}
