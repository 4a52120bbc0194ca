//! The list of sheets in the document, in tab order.

use crate::api::Sheet;
use crate::error::Res;
use crate::model::{DatedSheetName, SheetRef, SpreadsheetMeta};
use anyhow::Context;
use serde::Serialize;

/// The sheets of a spreadsheet document in left-to-right tab order, along with the document
/// locale. A catalog is a snapshot taken at the start of a rollover and is never reused across
/// invocations.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize)]
pub struct SheetCatalog {
    locale: String,
    sheets: Vec<SheetRef>,
}

impl SheetCatalog {
    pub fn new(locale: impl Into<String>, sheets: Vec<SheetRef>) -> Self {
        Self {
            locale: locale.into(),
            sheets,
        }
    }

    /// Queries the document for its sheets. This is a read with no side effects.
    pub(crate) async fn list(sheet: &mut (dyn Sheet + Send)) -> Res<Self> {
        let meta = sheet
            .metadata()
            .await
            .context("Unable to list the sheets of the spreadsheet")?;
        Ok(meta.into())
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn sheets(&self) -> &[SheetRef] {
        &self.sheets
    }

    pub fn find(&self, name: &str) -> Option<&SheetRef> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// The sheets whose names encode a date, in tab order.
    pub fn dated(&self) -> impl Iterator<Item = DatedSheetName> + '_ {
        self.sheets
            .iter()
            .filter_map(|s| DatedSheetName::parse(&s.name))
    }

    /// The right-most sheet.
    pub fn last(&self) -> Option<&SheetRef> {
        self.sheets.last()
    }

    /// Drops `name` from the snapshot, used after that sheet has been deleted remotely.
    pub(crate) fn remove(&mut self, name: &str) {
        self.sheets.retain(|s| s.name != name);
    }
}

impl From<SpreadsheetMeta> for SheetCatalog {
    fn from(meta: SpreadsheetMeta) -> Self {
        Self::new(meta.locale, meta.sheets)
    }
}
