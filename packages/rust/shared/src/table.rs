//! In-memory tabular model used by the result assembler.
//!
//! The surrounding system reads and writes spreadsheet files; the core only
//! sees this structure. Row matching always goes through [`normalize_key`] on
//! both sides — spreadsheet readers routinely turn a numeric barcode into
//! `"7891234.0"`, and an unnormalized comparison silently drops every update.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CopyforgeError, Result};

/// A rectangular table: named columns and string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Column headers, in display order.
    pub columns: Vec<String>,
    /// Row cells; each inner vec has `columns.len()` entries.
    pub rows: Vec<Vec<String>>,
}

/// Normalize a row key for matching: trim whitespace and strip the trailing
/// `.0` float artifact produced by spreadsheet numeric coercion.
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_suffix(".0") {
        Some(stem) if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()) => {
            stem.to_string()
        }
        _ => trimmed.to_string(),
    }
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Index of a column by exact header name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of the key column, or a validation error naming it.
    pub fn key_index(&self, key_column: &str) -> Result<usize> {
        self.column_index(key_column).ok_or_else(|| {
            CopyforgeError::validation(format!("key column '{key_column}' not found in table"))
        })
    }

    /// Cell value at (row, column name), if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }

    /// Append a column, padding existing rows with empty cells.
    /// No-op if the column already exists.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.columns.len() - 1
    }

    /// Append a row, padding or truncating to the column count.
    pub fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.columns.len(), String::new());
        self.rows.push(cells);
    }

    /// Overlay `updates` onto this table, matched by normalized key.
    ///
    /// Only cells named in an update are written; every other row, column,
    /// and cell passes through unchanged. Update columns missing from the
    /// table are appended. Updates whose key matches no row are ignored and
    /// reported back to the caller.
    pub fn update_preserving(
        &mut self,
        key_column: &str,
        updates: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<Vec<String>> {
        let key_idx = self.key_index(key_column)?;

        for columns in updates.values() {
            for name in columns.keys() {
                self.ensure_column(name);
            }
        }

        let mut matched: Vec<bool> = vec![false; updates.len()];
        let keys: Vec<&String> = updates.keys().collect();

        for row in &mut self.rows {
            let row_key = normalize_key(&row[key_idx]);
            let Some(pos) = keys.iter().position(|k| normalize_key(k) == row_key) else {
                continue;
            };
            matched[pos] = true;
            for (name, value) in &updates[keys[pos]] {
                // ensure_column above guarantees presence
                let idx = self.columns.iter().position(|c| c == name).unwrap();
                row[idx] = value.clone();
            }
        }

        let unmatched = keys
            .iter()
            .zip(&matched)
            .filter(|(_, hit)| !**hit)
            .map(|(k, _)| (*k).clone())
            .collect();
        Ok(unmatched)
    }

    /// Rows whose normalized key is in `keys`, as a new table with the same
    /// columns.
    pub fn filter_by_keys(&self, key_column: &str, keys: &[String]) -> Result<Table> {
        let key_idx = self.key_index(key_column)?;
        let wanted: Vec<String> = keys.iter().map(|k| normalize_key(k)).collect();

        let rows = self
            .rows
            .iter()
            .filter(|row| wanted.contains(&normalize_key(&row[key_idx])))
            .cloned()
            .collect();

        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table {
            columns: vec!["_SKU".into(), "name".into(), "brand".into()],
            rows: vec![
                vec!["7891234.0".into(), "Aspirin 500mg".into(), "Acme".into()],
                vec!["  4005 ".into(), "Vitamin C".into(), "Beta".into()],
                vec!["9999".into(), "Bandages".into(), "Gamma".into()],
            ],
        }
    }

    #[test]
    fn normalize_strips_float_artifact_and_whitespace() {
        assert_eq!(normalize_key("7891234.0"), "7891234");
        assert_eq!(normalize_key("  4005 "), "4005");
        assert_eq!(normalize_key("ABC-1.0"), "ABC-1.0"); // non-numeric stem untouched
        assert_eq!(normalize_key("1.5"), "1.5");
        assert_eq!(normalize_key(".0"), ".0");
    }

    #[test]
    fn update_matches_normalized_keys_both_sides() {
        let mut table = sample();
        let mut updates = BTreeMap::new();
        updates.insert(
            "7891234".to_string(),
            BTreeMap::from([("seo_title".to_string(), "Buy Aspirin".to_string())]),
        );
        updates.insert(
            "4005.0".to_string(),
            BTreeMap::from([("seo_title".to_string(), "Vitamin C Online".to_string())]),
        );

        let unmatched = table.update_preserving("_SKU", &updates).unwrap();
        assert!(unmatched.is_empty());

        assert_eq!(table.cell(0, "seo_title"), Some("Buy Aspirin"));
        assert_eq!(table.cell(1, "seo_title"), Some("Vitamin C Online"));
        assert_eq!(table.cell(2, "seo_title"), Some(""));
        // Untouched columns preserved exactly, including the raw key cell.
        assert_eq!(table.cell(0, "_SKU"), Some("7891234.0"));
        assert_eq!(table.cell(2, "brand"), Some("Gamma"));
    }

    #[test]
    fn update_reports_unmatched_keys() {
        let mut table = sample();
        let updates = BTreeMap::from([(
            "0000".to_string(),
            BTreeMap::from([("seo_title".to_string(), "x".to_string())]),
        )]);

        let unmatched = table.update_preserving("_SKU", &updates).unwrap();
        assert_eq!(unmatched, vec!["0000".to_string()]);
    }

    #[test]
    fn update_requires_key_column() {
        let mut table = sample();
        let err = table
            .update_preserving("_EANSKU", &BTreeMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("_EANSKU"));
    }

    #[test]
    fn filter_by_keys_normalizes() {
        let table = sample();
        let subset = table
            .filter_by_keys("_SKU", &["7891234".to_string(), "9999.0".to_string()])
            .unwrap();
        assert_eq!(subset.rows.len(), 2);
        assert_eq!(subset.columns, table.columns);
    }

    #[test]
    fn ensure_column_pads_existing_rows() {
        let mut table = sample();
        let idx = table.ensure_column("html_body");
        assert_eq!(idx, 3);
        assert!(table.rows.iter().all(|r| r.len() == 4));
        // Idempotent.
        assert_eq!(table.ensure_column("html_body"), 3);
    }
}
