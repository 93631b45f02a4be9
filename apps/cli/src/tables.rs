//! File adapters between JSON table files and the core's in-memory model.
//!
//! The core never touches the filesystem; these helpers read the product
//! table (and optional catalog), turn rows into pipeline inputs, and write
//! the assembled result back out.

use std::collections::BTreeMap;
use std::path::Path;

use color_eyre::eyre::{Result, eyre};
use copyforge_shared::{ColumnsConfig, ContentBundle, Row, Table};
use serde::Deserialize;

/// Read a JSON table file (`{"columns": [...], "rows": [[...]]}`).
pub(crate) fn read_table(path: &Path) -> Result<Table> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read table file '{}': {e}", path.display()))?;
    let table: Table = serde_json::from_str(&content)
        .map_err(|e| eyre!("'{}' is not a valid table file: {e}", path.display()))?;

    for (i, row) in table.rows.iter().enumerate() {
        if row.len() != table.columns.len() {
            return Err(eyre!(
                "'{}': row {i} has {} cells but the table has {} columns",
                path.display(),
                row.len(),
                table.columns.len()
            ));
        }
    }
    Ok(table)
}

/// Write a table as pretty-printed JSON.
pub(crate) fn write_table(path: &Path, table: &Table) -> Result<()> {
    let content = serde_json::to_string_pretty(table)?;
    std::fs::write(path, content)
        .map_err(|e| eyre!("cannot write table file '{}': {e}", path.display()))?;
    Ok(())
}

/// Overlay catalog columns onto the product table, matched by key. Catalog
/// keys without a product row are reported back.
pub(crate) fn merge_catalog(table: &mut Table, catalog: &Table, key_column: &str) -> Result<Vec<String>> {
    let key_idx = catalog
        .column_index(key_column)
        .ok_or_else(|| eyre!("catalog table has no '{key_column}' column"))?;

    let mut updates: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for row in &catalog.rows {
        let mut cells = BTreeMap::new();
        for (idx, name) in catalog.columns.iter().enumerate() {
            if idx != key_idx {
                cells.insert(name.clone(), row[idx].clone());
            }
        }
        updates.insert(row[key_idx].clone(), cells);
    }

    Ok(table.update_preserving(key_column, &updates)?)
}

/// Turn table rows into pipeline inputs: the key column becomes the SKU, a
/// `name` column (when present) the product name, and every other column an
/// attribute.
pub(crate) fn rows_from_table(table: &Table, key_column: &str) -> Result<Vec<Row>> {
    let key_idx = table
        .column_index(key_column)
        .ok_or_else(|| eyre!("input table has no '{key_column}' column"))?;
    let name_idx = table.column_index("name");

    let mut rows = Vec::with_capacity(table.rows.len());
    for cells in &table.rows {
        let sku = cells[key_idx].trim().to_string();
        if sku.is_empty() {
            continue;
        }
        let name = name_idx
            .map(|i| cells[i].clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| sku.clone());

        let mut row = Row::new(sku, name);
        for (idx, column) in table.columns.iter().enumerate() {
            if idx == key_idx || Some(idx) == name_idx {
                continue;
            }
            row.attributes.insert(column.clone(), cells[idx].clone());
        }
        rows.push(row);
    }
    Ok(rows)
}

/// One entry of a reprocess request file: which row to redo and why.
#[derive(Debug, Deserialize)]
pub(crate) struct ReprocessItem {
    pub sku: String,
    pub feedback: String,
}

/// Read a reprocess request file (`[{"sku": ..., "feedback": ...}]`).
pub(crate) fn read_reprocess_items(path: &Path) -> Result<Vec<ReprocessItem>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read reprocess file '{}': {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| eyre!("'{}' is not a valid reprocess file: {e}", path.display()))
}

/// Reconstruct the stored content bundle for a row out of the table's output
/// columns, so a reprocess run can start from what was shipped.
pub(crate) fn prior_bundle(
    table: &Table,
    columns: &ColumnsConfig,
    row_index: usize,
) -> Result<ContentBundle> {
    let cell = |name: &str| {
        table
            .cell(row_index, name)
            .ok_or_else(|| eyre!("table has no '{name}' column; run a batch first"))
    };
    Ok(ContentBundle {
        title: cell(&columns.title)?.to_string(),
        meta_description: cell(&columns.meta_description)?.to_string(),
        html_body: cell(&columns.body)?.to_string(),
        raw: serde_json::Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_table() -> Table {
        let mut table = Table::with_columns(vec![
            "_SKU".into(),
            "name".into(),
            "validated".into(),
            "reference_url".into(),
        ]);
        table.push_row(vec![
            "1001".into(),
            "Vitamin C".into(),
            "yes".into(),
            "https://e.com/a".into(),
        ]);
        table.push_row(vec!["".into(), "No key".into(), "yes".into(), "".into()]);
        table
    }

    #[test]
    fn rows_from_table_maps_columns_to_attributes() {
        let rows = rows_from_table(&product_table(), "_SKU").unwrap();
        assert_eq!(rows.len(), 1, "blank-key rows are dropped");
        assert_eq!(rows[0].sku, "1001");
        assert_eq!(rows[0].name, "Vitamin C");
        assert_eq!(rows[0].attr("validated"), Some("yes"));
        assert_eq!(rows[0].attr("reference_url"), Some("https://e.com/a"));
        assert!(rows[0].attributes.get("name").is_none());
    }

    #[test]
    fn merge_catalog_overlays_extra_columns() {
        let mut table = product_table();
        let mut catalog = Table::with_columns(vec!["_SKU".into(), "brand".into()]);
        catalog.push_row(vec!["1001.0".into(), "Acme".into()]);

        let unmatched = merge_catalog(&mut table, &catalog, "_SKU").unwrap();
        assert!(unmatched.is_empty());
        assert_eq!(table.cell(0, "brand"), Some("Acme"));
    }

    #[test]
    fn prior_bundle_requires_output_columns() {
        let table = product_table();
        let err = prior_bundle(&table, &ColumnsConfig::default(), 0).unwrap_err();
        assert!(err.to_string().contains("seo_title"));
    }
}
