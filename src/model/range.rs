//! A1-notation addresses for cells and ranges within a named sheet.

use crate::model::Column;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A single cell address. `row` is 1-based, as in the spreadsheet UI.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CellRef {
    pub column: Column,
    pub row: usize,
}

impl CellRef {
    pub fn new(column: Column, row: usize) -> Self {
        Self { column, row }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

/// A range such as `'2025-06-01'!A2:J` or `'2025-06-02'!G2:G4`.
///
/// The end of a range may omit its row, meaning "to the last row with data".
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SheetRange {
    sheet: String,
    start: CellRef,
    end: Option<(Column, Option<usize>)>,
}

impl SheetRange {
    /// A range that covers a single cell, used as the anchor for writes.
    pub fn cell(sheet: impl Into<String>, column: Column, row: usize) -> Self {
        Self {
            sheet: sheet.into(),
            start: CellRef::new(column, row),
            end: None,
        }
    }

    /// A bounded rectangular range.
    pub fn rect(sheet: impl Into<String>, start: CellRef, end: CellRef) -> Self {
        Self {
            sheet: sheet.into(),
            start,
            end: Some((end.column, Some(end.row))),
        }
    }

    /// A range from `start` down to the last row with data, ending in `end_column`.
    pub fn open(sheet: impl Into<String>, start: CellRef, end_column: Column) -> Self {
        Self {
            sheet: sheet.into(),
            start,
            end: Some((end_column, None)),
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn start(&self) -> CellRef {
        self.start
    }

    /// The last column covered by this range.
    pub fn end_column(&self) -> Column {
        self.end.map(|(c, _)| c).unwrap_or(self.start.column)
    }

    /// The last row covered by this range, `None` when it is open-ended.
    pub fn end_row(&self) -> Option<usize> {
        match self.end {
            None => Some(self.start.row),
            Some((_, row)) => row,
        }
    }
}

/// Quotes a sheet name for use in a range or a cross-sheet formula reference. Embedded single
/// quotes are doubled.
pub fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", quote_sheet_name(&self.sheet), self.start)?;
        match self.end {
            None => Ok(()),
            Some((column, Some(row))) => write!(f, ":{column}{row}"),
            Some((column, None)) => write!(f, ":{column}"),
        }
    }
}

impl Serialize for SheetRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl FromStr for SheetRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sheet, cells) = split_sheet(s.trim())?;
        let (start, end) = match cells.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (cells, None),
        };
        let (start_column, start_row) = parse_cell(start)?;
        let start_row =
            start_row.ok_or_else(|| anyhow::anyhow!("The start of range '{s}' needs a row"))?;
        let end = match end {
            None => None,
            Some(end) => Some(parse_cell(end)?),
        };
        Ok(Self {
            sheet,
            start: CellRef::new(start_column, start_row),
            end,
        })
    }
}

fn split_sheet(s: &str) -> anyhow::Result<(String, &str)> {
    if let Some(rest) = s.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if let Some((_, '\'')) = chars.peek() {
                    name.push('\'');
                    chars.next();
                    continue;
                }
                let after = &rest[i + 1..];
                let cells = after
                    .strip_prefix('!')
                    .ok_or_else(|| anyhow::anyhow!("Expected '!' after the sheet name in '{s}'"))?;
                return Ok((name, cells));
            }
            name.push(c);
        }
        anyhow::bail!("Unterminated sheet name in '{s}'")
    }
    match s.rsplit_once('!') {
        Some((sheet, cells)) if !sheet.is_empty() => Ok((sheet.to_string(), cells)),
        _ => anyhow::bail!("Range '{s}' must be in the form 'Sheet'!A1:B2"),
    }
}

fn parse_cell(s: &str) -> anyhow::Result<(Column, Option<usize>)> {
    let split = s
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(s.len());
    let (letters, digits) = s.split_at(split);
    let column: Column = letters.parse()?;
    let row = if digits.is_empty() {
        None
    } else {
        let row: usize = digits
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid row in cell '{s}': {e}"))?;
        if row == 0 {
            anyhow::bail!("Rows start at 1, got cell '{s}'");
        }
        Some(row)
    };
    Ok((column, row))
}
