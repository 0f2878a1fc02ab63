//! Text formatting for tool output.

use serde_json::{Map, Value as JsonValue};

/// Width of the header separator line.
const SEPARATOR_WIDTH: usize = 80;

/// Render a single value for the row table.
pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    }
}

/// Render a result set as a tab-separated table:
/// header, separator, rows, then a `Total rows: N` trailer.
pub fn format_rows(columns: &[String], rows: &[Map<String, JsonValue>]) -> String {
    let mut out = String::new();

    if !columns.is_empty() {
        out.push_str(&columns.join("\t"));
        out.push('\n');
        out.push_str(&"-".repeat(SEPARATOR_WIDTH));
        out.push('\n');
    }

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|col| format_value(row.get(col).unwrap_or(&JsonValue::Null)))
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }

    out.push_str(&format!("\nTotal rows: {}", rows.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, JsonValue)]) -> Map<String, JsonValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!(null)), "NULL");
        assert_eq!(format_value(&json!(true)), "true");
        assert_eq!(format_value(&json!(42)), "42");
        assert_eq!(format_value(&json!("x")), "x");
        assert_eq!(format_value(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_format_rows_shape() {
        let columns = vec!["n".to_string()];
        let rows = vec![row(&[("n", json!(1))])];
        let text = format_rows(&columns, &rows);

        assert!(text.starts_with("n\n"));
        assert!(text.contains(&"-".repeat(80)));
        assert!(text.contains("\n1\n"));
        assert!(text.ends_with("\nTotal rows: 1"));
    }

    #[test]
    fn test_format_rows_multiple_columns_tab_separated() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let rows = vec![row(&[("a", json!(1)), ("b", json!("x"))])];
        let text = format_rows(&columns, &rows);
        assert!(text.contains("a\tb"));
        assert!(text.contains("1\tx"));
    }

    #[test]
    fn test_format_rows_empty() {
        let text = format_rows(&[], &[]);
        assert_eq!(text, "\nTotal rows: 0");
    }

    #[test]
    fn test_format_rows_null_cells() {
        let columns = vec!["a".to_string()];
        let rows = vec![row(&[("a", json!(null))])];
        let text = format_rows(&columns, &rows);
        assert!(text.contains("NULL"));
    }
}
