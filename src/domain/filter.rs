//! Row batch transformations applied to every file contributing to a sheet.
//!
//! Stages run in a fixed order (blank rows, column values, key extraction,
//! key filter) and only ever narrow the batch.

use crate::domain::entities::merge::{ExtractedKeySet, Row};

pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.is_empty())
}

pub fn remove_blank_rows(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter().filter(|row| !is_blank_row(row)).collect()
}

/// Keeps rows whose `column` cell matches an allowed value, ignoring case
/// and surrounding whitespace. Rows too short to have the column are dropped.
pub fn filter_by_column_value(
    rows: Vec<Row>,
    column: Option<usize>,
    allowed: &[String],
) -> Vec<Row> {
    let Some(column) = column else {
        return rows;
    };
    if allowed.is_empty() {
        return rows;
    }

    let allowed: Vec<String> = allowed.iter().map(|value| normalize(value)).collect();

    rows.into_iter()
        .filter(|row| {
            row.get(column)
                .map(|cell| allowed.contains(&normalize(cell)))
                .unwrap_or(false)
        })
        .collect()
}

pub fn find_key_column(header: &[String], marker: &str) -> Option<usize> {
    let marker = marker.to_lowercase();
    header
        .iter()
        .position(|title| title.to_lowercase().contains(&marker))
}

/// Adds the trimmed, non-empty key cells of `rows` to `keys` and returns how
/// many new keys were inserted.
pub fn extract_keys(
    header: &[String],
    rows: &[Row],
    marker: &str,
    keys: &mut ExtractedKeySet,
) -> usize {
    let Some(column) = find_key_column(header, marker) else {
        return 0;
    };

    let mut inserted = 0;
    for row in rows {
        if let Some(cell) = row.get(column) {
            let key = cell.trim();
            if !key.is_empty() && keys.insert(key) {
                inserted += 1;
            }
        }
    }
    inserted
}

/// Fail-closed: without a key column or without keys nothing survives.
pub fn filter_by_keys(
    header: &[String],
    rows: Vec<Row>,
    keys: &ExtractedKeySet,
    marker: &str,
) -> Vec<Row> {
    if keys.is_empty() {
        return Vec::new();
    }
    let Some(column) = find_key_column(header, marker) else {
        return Vec::new();
    };

    rows.into_iter()
        .filter(|row| {
            row.get(column)
                .map(|cell| keys.contains(cell.trim()))
                .unwrap_or(false)
        })
        .collect()
}
