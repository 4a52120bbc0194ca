//! Builds the raw values of the new sheet's rows from the predecessor's rows.

use crate::model::{DatedSheetName, Row};
use crate::rollover::{is_aggregate_row, ColumnMapping, ColumnSource};
use chrono::NaiveDate;

/// Transforms predecessor data rows (header excluded) into the rows of the new sheet using
/// `mapping`. Formula columns are left as empty placeholders.
///
/// Rows shorter than the schema are fine: missing cells read as `""`, or as the carry-forward
/// default. An aggregate row left below the data by a previous rollover is skipped. No rows in
/// means no rows out.
pub fn transform(predecessor_rows: &[Row], mapping: &ColumnMapping, today: NaiveDate) -> Vec<Row> {
    let date = DatedSheetName::for_date(today);
    predecessor_rows
        .iter()
        .filter(|row| !is_aggregate_row(row))
        .map(|row| transform_row(row, mapping, date.name()))
        .collect()
}

fn transform_row(row: &[String], mapping: &ColumnMapping, today: &str) -> Row {
    mapping
        .columns()
        .map(|(_, source)| match source {
            ColumnSource::Today => today.to_string(),
            ColumnSource::Copy { from } => from.get(row).unwrap_or_default().to_string(),
            ColumnSource::CarryForward { from, default } => {
                from.get(row).unwrap_or(default).to_string()
            }
            ColumnSource::Literal { value } => value.to_string(),
            ColumnSource::Formula => String::new(),
        })
        .collect()
}
