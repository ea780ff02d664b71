//! Text renderings of cell values.
//!
//! Each consumer gets its own rendering: the grid shows short labels for
//! composite values, tooltips and the detail overlay show indented JSON, the
//! filter matches against lower-cased JSON and sorting compares naturally.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use serde_json::{Number, Value};

fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn number_text(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && (f.abs() >= 1e21 || (f != 0.0 && f.abs() < 1e-6)) => {
            exponent_text(f)
        }
        Some(f) if f.is_finite() && f.fract() == 0.0 => format!("{f:.0}"),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Very large and very small magnitudes use exponent notation with an
/// explicit sign on positive exponents, like `1e+21` and `1.5e-7`.
fn exponent_text(f: f64) -> String {
    let text = format!("{f:e}");
    match text.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => text,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Short label used inside grid cells.
pub fn format_cell_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Array(items)) => match items.first() {
            Some(Value::Number(_)) => format!("[Vector dim={}]", items.len()),
            _ => format!("[Array({})]", items.len()),
        },
        Some(obj @ Value::Object(_)) => obj.to_string(),
        Some(v) => scalar_text(v),
    }
}

pub fn format_tooltip_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(v @ (Value::Array(_) | Value::Object(_))) => pretty_json(v),
        Some(v) => scalar_text(v),
    }
}

pub fn format_detail_value(value: Option<&Value>) -> String {
    format_tooltip_value(value)
}

/// Text a substring filter is matched against.
///
/// Arrays are matched against their JSON, not the vector label.
pub fn to_filter_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_lowercase(),
        Some(v @ (Value::Array(_) | Value::Object(_))) => v.to_string().to_lowercase(),
        Some(v) => scalar_text(v).to_lowercase(),
    }
}

pub fn to_sort_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(v @ (Value::Array(_) | Value::Object(_))) => v.to_string(),
        Some(v) => scalar_text(v),
    }
}

/// Normalizes user typed filter text.
pub fn normalize_filter(term: &str) -> String {
    term.trim().to_lowercase()
}

/// Orders two cell values.
///
/// Missing values always compare greater than present ones. The sort engine
/// applies its direction after this, so missing values end up last when
/// ascending and first when descending.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (is_missing(a), is_missing(b)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    if let (Some(Value::Number(x)), Some(Value::Number(y))) = (a, b)
        && let (Some(x), Some(y)) = (x.as_f64(), y.as_f64())
    {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    natural_cmp(&to_sort_text(a), &to_sort_text(b))
}

fn take_digits(it: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(&c) = it.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        it.next();
    }
    digits
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Case-insensitive comparison where digit runs compare by value, so
/// `row9` sorts before `row10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        let (ca, cb) = match (ai.peek(), bi.peek()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&ca), Some(&cb)) => (ca, cb),
        };
        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let ord = cmp_digit_runs(&take_digits(&mut ai), &take_digits(&mut bi));
            if ord != Ordering::Equal {
                return ord;
            }
            continue;
        }
        let ord = ca.to_lowercase().cmp(cb.to_lowercase());
        if ord != Ordering::Equal {
            return ord;
        }
        ai.next();
        bi.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cell_labels() {
        assert_eq!(format_cell_value(Some(&json!([1, 2, 3]))), "[Vector dim=3]");
        assert_eq!(format_cell_value(Some(&json!(["a", "b"]))), "[Array(2)]");
        assert_eq!(format_cell_value(Some(&json!([]))), "[Array(0)]");
        assert_eq!(format_cell_value(Some(&Value::Null)), "");
        assert_eq!(format_cell_value(None), "");
        assert_eq!(format_cell_value(Some(&json!({"a": 1}))), r#"{"a":1}"#);
        assert_eq!(format_cell_value(Some(&json!("text"))), "text");
        assert_eq!(format_cell_value(Some(&json!(true))), "true");
        assert_eq!(format_cell_value(Some(&json!(30.0))), "30");
        assert_eq!(format_cell_value(Some(&json!(1.5))), "1.5");
    }

    #[test]
    fn extreme_magnitudes_use_exponents() {
        assert_eq!(format_cell_value(Some(&json!(1e21))), "1e+21");
        assert_eq!(format_cell_value(Some(&json!(-2.5e30))), "-2.5e+30");
        assert_eq!(format_cell_value(Some(&json!(1.5e-7))), "1.5e-7");
        assert_eq!(format_cell_value(Some(&json!(1e20))), "100000000000000000000");
        assert_eq!(format_cell_value(Some(&json!(0.000001))), "0.000001");
        assert_eq!(to_filter_text(Some(&json!(1e21))), "1e+21");
    }

    #[test]
    fn tooltip_and_detail_are_indented() {
        let v = json!({"a": [1, 2]});
        let expected = "{\n  \"a\": [\n    1,\n    2\n  ]\n}";
        assert_eq!(format_tooltip_value(Some(&v)), expected);
        assert_eq!(format_detail_value(Some(&v)), expected);
        assert_eq!(format_detail_value(Some(&json!(42))), "42");
        assert_eq!(format_detail_value(None), "");
    }

    #[test]
    fn filter_text_uses_raw_json() {
        assert_eq!(to_filter_text(Some(&json!("  ABCdef "))), "abcdef");
        assert_eq!(to_filter_text(Some(&json!([1, 2, 3]))), "[1,2,3]");
        assert_eq!(to_filter_text(Some(&json!({"Key": "V"}))), r#"{"key":"v"}"#);
        assert_eq!(to_filter_text(Some(&json!(false))), "false");
        assert_eq!(to_filter_text(None), "");
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(
            compare_values(Some(&json!(5)), Some(&json!(30))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(Some(&json!(2.5)), Some(&json!(2))),
            Ordering::Greater
        );
    }

    #[test]
    fn missing_values_compare_greater() {
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!("a")), Some(&Value::Null)), Ordering::Less);
        assert_eq!(compare_values(None, Some(&Value::Null)), Ordering::Equal);
    }

    #[test]
    fn strings_compare_naturally() {
        assert_eq!(natural_cmp("row9", "row10"), Ordering::Less);
        assert_eq!(natural_cmp("Apple", "apple"), Ordering::Equal);
        assert_eq!(natural_cmp("apple", "Banana"), Ordering::Less);
        assert_eq!(natural_cmp("a007", "a7"), Ordering::Equal);
        assert_eq!(natural_cmp("abc", "abcd"), Ordering::Less);
        assert_eq!(
            compare_values(Some(&json!("10")), Some(&json!(9))),
            Ordering::Greater
        );
    }
}
