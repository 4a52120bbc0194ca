//! Types that describe the shape of a dated ledger sheet: columns, ranges, dated names and rows.
mod column;
mod dated;
mod range;

pub use column::Column;
pub use dated::DatedSheetName;
pub use range::{quote_sheet_name, CellRef, SheetRange};
use serde::{Deserialize, Serialize};

/// A row of cell values as exchanged with the spreadsheet. Values are strings and the sheet
/// interprets them (numbers, dates, formulas) on write.
pub type Row = Vec<String>;

/// The ledger schema has ten columns, `A` through `J`.
pub const COLUMN_COUNT: usize = 10;

/// The last column of the ledger schema.
pub const LAST_COLUMN: Column = Column::J;

/// Identifies a sheet (tab) within the spreadsheet document.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SheetRef {
    pub name: String,
    pub id: i64,
}

impl SheetRef {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// What the spreadsheet reports about itself: its locale and its sheets in tab order.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SpreadsheetMeta {
    pub locale: String,
    pub sheets: Vec<SheetRef>,
}
