//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets.
//!
//! Documents are held in a process-wide map keyed by spreadsheet id, so a rollover run against a
//! `TestSheet` is visible to the next `TestSheet` created with the same id. This mirrors the way a
//! real document outlives the gateway that talks to it.

use crate::api::Sheet;
use crate::error::Res;
use crate::model::{Row, SheetRange, SheetRef, SpreadsheetMeta};
use anyhow::bail;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, OnceLock};

static DOCUMENTS: OnceLock<Mutex<HashMap<String, TestSheetState>>> = OnceLock::new();

fn documents() -> MutexGuard<'static, HashMap<String, TestSheetState>> {
    DOCUMENTS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A remote call that a `TestSheet` can be told to fail.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum FailOn {
    Metadata,
    GetValues,
    UpdateValues,
    AddSheet,
    DeleteSheet,
}

/// One tab of an in-memory document.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct TestTab {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) rows: Vec<Row>,
}

/// The full contents of an in-memory spreadsheet document.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct TestSheetState {
    pub(crate) locale: String,
    pub(crate) tabs: Vec<TestTab>,
    next_id: i64,
    /// Counts `update_values` calls that reached the document.
    pub(crate) value_writes: usize,
    pub(crate) fail_on: Option<FailOn>,
}

impl TestSheetState {
    pub(crate) fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            tabs: Vec::new(),
            next_id: 1000,
            value_writes: 0,
            fail_on: None,
        }
    }

    /// Appends a tab and returns its id.
    pub(crate) fn add_tab(&mut self, title: impl Into<String>, rows: Vec<Row>) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tabs.push(TestTab {
            id,
            title: title.into(),
            rows,
        });
        id
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn tab(&self, title: &str) -> Option<&TestTab> {
        self.tabs.iter().find(|t| t.title == title)
    }

    fn tab_mut(&mut self, title: &str) -> Res<&mut TestTab> {
        match self.tabs.iter_mut().find(|t| t.title == title) {
            Some(tab) => Ok(tab),
            None => bail!("Unable to parse range: sheet '{title}' does not exist"),
        }
    }

    fn check(&self, call: FailOn) -> Res<()> {
        if self.fail_on == Some(call) {
            bail!("Simulated remote failure during {call:?}");
        }
        Ok(())
    }
}

impl Default for TestSheetState {
    /// A small English inventory document with one dated sheet and one summary sheet.
    fn default() -> Self {
        let mut state = Self::new("en_US");
        state.add_tab("Summary", vec![]);
        state.add_tab("2025-06-01", load_csv(INVENTORY_DATA).unwrap_or_default());
        state
    }
}

/// An implementation of the `Sheet` trait that does not use Google sheets.
#[derive(Debug, Clone)]
pub(crate) struct TestSheet {
    spreadsheet_id: String,
}

impl TestSheet {
    /// A gateway to the in-memory document `spreadsheet_id`. The document is seeded with
    /// `TestSheetState::default()` the first time it is touched.
    pub(crate) fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn get_state(&self) -> TestSheetState {
        documents()
            .entry(self.spreadsheet_id.clone())
            .or_default()
            .clone()
    }

    /// Replaces the whole document.
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn set_state(&self, state: TestSheetState) {
        documents().insert(self.spreadsheet_id.clone(), state);
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TestSheetState) -> Res<T>) -> Res<T> {
        let mut documents = documents();
        let state = documents.entry(self.spreadsheet_id.clone()).or_default();
        f(state)
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn metadata(&mut self) -> Res<SpreadsheetMeta> {
        self.with_state(|state| {
            state.check(FailOn::Metadata)?;
            Ok(SpreadsheetMeta {
                locale: state.locale.clone(),
                sheets: state
                    .tabs
                    .iter()
                    .map(|t| SheetRef::new(&t.title, t.id))
                    .collect(),
            })
        })
    }

    async fn get_values(&mut self, range: &SheetRange) -> Res<Vec<Row>> {
        self.with_state(|state| {
            state.check(FailOn::GetValues)?;
            let tab = state.tab_mut(range.sheet())?;
            let first_row = range.start().row - 1;
            let last_row = range.end_row().unwrap_or(usize::MAX);
            let first_col = range.start().column.index();
            let last_col = range.end_column().index();
            let mut rows: Vec<Row> = tab
                .rows
                .iter()
                .enumerate()
                .skip(first_row)
                .take_while(|(i, _)| *i < last_row)
                .map(|(_, row)| {
                    let mut cells: Row = row
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i >= first_col && *i <= last_col)
                        .map(|(_, cell)| cell.clone())
                        .collect();
                    while cells.last().is_some_and(|c| c.is_empty()) {
                        cells.pop();
                    }
                    cells
                })
                .collect();
            while rows.last().is_some_and(|r| r.is_empty()) {
                rows.pop();
            }
            Ok(rows)
        })
    }

    async fn update_values(&mut self, range: &SheetRange, rows: &[Row]) -> Res<()> {
        self.with_state(|state| {
            state.check(FailOn::UpdateValues)?;
            let tab = state.tab_mut(range.sheet())?;
            let first_row = range.start().row - 1;
            let first_col = range.start().column.index();
            for (i, values) in rows.iter().enumerate() {
                let r = first_row + i;
                if tab.rows.len() <= r {
                    tab.rows.resize(r + 1, Vec::new());
                }
                let row = &mut tab.rows[r];
                for (j, value) in values.iter().enumerate() {
                    let c = first_col + j;
                    if row.len() <= c {
                        row.resize(c + 1, String::new());
                    }
                    row[c] = value.clone();
                }
            }
            state.value_writes += 1;
            Ok(())
        })
    }

    async fn add_sheet(&mut self, title: &str) -> Res<SheetRef> {
        self.with_state(|state| {
            state.check(FailOn::AddSheet)?;
            if state.tabs.iter().any(|t| t.title == title) {
                bail!("A sheet with the name \"{title}\" already exists");
            }
            let id = state.add_tab(title, Vec::new());
            Ok(SheetRef::new(title, id))
        })
    }

    async fn delete_sheet(&mut self, sheet_id: i64) -> Res<()> {
        self.with_state(|state| {
            state.check(FailOn::DeleteSheet)?;
            let before = state.tabs.len();
            state.tabs.retain(|t| t.id != sheet_id);
            if state.tabs.len() == before {
                bail!("No sheet with id {sheet_id}");
            }
            Ok(())
        })
    }
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> Res<Vec<Row>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed inventory data. Derived columns hold the values their formulas evaluated to.
const INVENTORY_DATA: &str = r##"Date,Product,Unit Cost,Margin %,Opening Stock,Units Sold,Price,Total Sold,Profit,Remaining Stock
2025-06-01,Soap,2.00,20,30,15,2.4,36,6,15
2025-06-01,Rice,1.10,10,40,12,1.21,14.52,1.32,28
2025-06-01,Coffee,4.50,25,10,10,5.625,56.25,11.25,0
"##;
