use crate::types::RowValues;

use super::{ResultSet, Row};

/// Normalise one raw cell.
///
/// Text that reads as a decimal number becomes `Int` or `Float`; other text is untouched.
/// `Null` yields `None` so the column is left out of the shaped row.
#[must_use]
pub fn coerce_value(value: RowValues) -> Option<RowValues> {
    match value {
        RowValues::Null => None,
        RowValues::Text(text) => Some(parse_numeric(&text).unwrap_or(RowValues::Text(text))),
        other => Some(other),
    }
}

fn parse_numeric(text: &str) -> Option<RowValues> {
    let trimmed = text.trim();
    if !looks_numeric(trimmed) {
        return None;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(RowValues::Int(int));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(RowValues::Float)
}

// Rejects the words f64::from_str accepts ("inf", "NaN") and anything without a digit.
fn looks_numeric(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    body.bytes().any(|b| b.is_ascii_digit())
        && body
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
}

/// Turn a raw result set into shaped rows, preserving row order.
#[must_use]
pub fn shape_result_set(result_set: ResultSet) -> Vec<Row> {
    let (column_names, rows) = result_set.into_rows();
    rows.into_iter()
        .map(|raw| {
            let values = raw
                .into_iter()
                .enumerate()
                .filter_map(|(idx, value)| coerce_value(value).map(|v| (idx, v)))
                .collect();
            Row::new(column_names.clone(), values)
        })
        .collect()
}
