//! Folds batch outcomes back into the caller's table.
//!
//! The assembler writes generated columns only for successful rows and
//! leaves everything else byte-identical. Rows are matched by normalized key
//! so a `7891234.0` spreadsheet artifact still finds its product.

use std::collections::BTreeMap;

use copyforge_shared::{ColumnsConfig, Result, RowOutcome, Table};
use tracing::warn;

/// Overlay outcomes onto a copy of `original`. Missing output columns are
/// appended; skipped and errored rows pass through untouched.
pub fn assemble(original: &Table, outcomes: &[RowOutcome], columns: &ColumnsConfig) -> Result<Table> {
    let mut updates: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for outcome in outcomes {
        let RowOutcome::Success { sku, attempt, .. } = outcome else {
            continue;
        };
        let mut cells = BTreeMap::new();
        cells.insert(columns.title.clone(), attempt.bundle.title.clone());
        cells.insert(
            columns.meta_description.clone(),
            attempt.bundle.meta_description.clone(),
        );
        cells.insert(columns.body.clone(), attempt.bundle.html_body.clone());
        updates.insert(sku.clone(), cells);
    }

    let mut table = original.clone();
    let unmatched = table.update_preserving(&columns.key, &updates)?;
    for sku in unmatched {
        warn!(sku = %sku, "generated content has no matching table row");
    }
    Ok(table)
}

/// The subset of `original` whose rows finished below the score target.
/// Reviewers pull this table to drive the reprocess flow.
pub fn disapproved_rows(
    original: &Table,
    outcomes: &[RowOutcome],
    key_column: &str,
) -> Result<Table> {
    let skus: Vec<String> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            RowOutcome::Success {
                sku,
                accepted: false,
                ..
            } => Some(sku.clone()),
            _ => None,
        })
        .collect();
    original.filter_by_keys(key_column, &skus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use copyforge_shared::{Attempt, AuditResult, ContentBundle};

    fn success(sku: &str, accepted: bool) -> RowOutcome {
        RowOutcome::Success {
            sku: sku.to_string(),
            attempt: Attempt {
                number: 1,
                bundle: ContentBundle {
                    title: format!("Title {sku}"),
                    meta_description: format!("Meta {sku}"),
                    html_body: format!("<div>Body {sku}</div>"),
                    raw: serde_json::Value::Null,
                },
                audit: AuditResult::from_breakdown(Default::default()),
            },
            accepted,
        }
    }

    fn catalog() -> Table {
        let mut table = Table::with_columns(vec![
            "_SKU".to_string(),
            "name".to_string(),
            "price".to_string(),
        ]);
        table.push_row(vec!["1001".into(), "Vitamin C".into(), "9.90".into()]);
        table.push_row(vec!["1002.0".into(), "Zinc".into(), "7.50".into()]);
        table.push_row(vec!["1003".into(), "Magnesium".into(), "12.00".into()]);
        table
    }

    #[test]
    fn writes_only_successful_rows() {
        let outcomes = vec![
            success("1001", true),
            RowOutcome::Skipped {
                sku: "1003".into(),
                reason: "not validated".into(),
            },
        ];
        let assembled = assemble(&catalog(), &outcomes, &ColumnsConfig::default()).unwrap();

        assert_eq!(assembled.cell(0, "seo_title"), Some("Title 1001"));
        assert_eq!(assembled.cell(2, "seo_title"), Some(""));
        // untouched data is preserved
        assert_eq!(assembled.cell(2, "price"), Some("12.00"));
    }

    #[test]
    fn matches_rows_through_float_artifact_keys() {
        let outcomes = vec![success("1002", true)];
        let assembled = assemble(&catalog(), &outcomes, &ColumnsConfig::default()).unwrap();
        assert_eq!(assembled.cell(1, "seo_title"), Some("Title 1002"));
    }

    #[test]
    fn appends_missing_output_columns_once() {
        let outcomes = vec![success("1001", true), success("1003", true)];
        let assembled = assemble(&catalog(), &outcomes, &ColumnsConfig::default()).unwrap();
        assert_eq!(
            assembled.columns,
            vec!["_SKU", "name", "price", "html_body", "meta_description", "seo_title"]
        );
    }

    #[test]
    fn unknown_sku_leaves_table_intact() {
        let outcomes = vec![success("9999", true)];
        let assembled = assemble(&catalog(), &outcomes, &ColumnsConfig::default()).unwrap();
        for row in 0..3 {
            assert_eq!(assembled.cell(row, "seo_title"), Some(""));
        }
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let columns = ColumnsConfig {
            key: "barcode".into(),
            ..ColumnsConfig::default()
        };
        assert!(assemble(&catalog(), &[success("1001", true)], &columns).is_err());
    }

    #[test]
    fn disapproved_rows_selects_below_target_successes() {
        let outcomes = vec![
            success("1001", true),
            success("1002", false),
            RowOutcome::Error {
                sku: "1003".into(),
                reason: "boom".into(),
            },
        ];
        let table = disapproved_rows(&catalog(), &outcomes, "_SKU").unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.cell(0, "name"), Some("Zinc"));
    }
}
