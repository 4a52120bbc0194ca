//! Sheet names that encode a calendar date, like `2025-06-01` or `2025-6-1`.

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// The name of a dated sheet along with the date it encodes.
///
/// Both the zero-padded `YYYY-MM-DD` form and the short `YYYY-M-D` form are recognized when reading
/// the names of existing sheets. Sheets created by this program always use the zero-padded form.
///
/// Ordering is by calendar date, not by string, so `2025-1-10` sorts after `2025-1-9`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DatedSheetName {
    name: String,
    date: NaiveDate,
}

impl DatedSheetName {
    /// Creates the name of the sheet for `date`, e.g. `2025-06-02`.
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            name: date.format("%Y-%m-%d").to_string(),
            date,
        }
    }

    /// Returns `Some` if `name` is a dated sheet name. Names that look dated but are not a real
    /// calendar date, like `2025-02-30`, are not dated sheets.
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.split('-');
        let year = parts.next()?;
        let month = parts.next()?;
        let day = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if !digits(year, 4, 4) || !digits(month, 1, 2) || !digits(day, 1, 2) {
            return None;
        }
        let date = NaiveDate::from_ymd_opt(
            year.parse().ok()?,
            month.parse().ok()?,
            day.parse().ok()?,
        )?;
        Some(Self {
            name: name.to_string(),
            date,
        })
    }

    /// The sheet name exactly as it appears in the document.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// True when both dates fall in the same calendar month of the same year.
    pub fn same_month(&self, other: NaiveDate) -> bool {
        self.date.year() == other.year() && self.date.month() == other.month()
    }
}

fn digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

impl Ord for DatedSheetName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for DatedSheetName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DatedSheetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for DatedSheetName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.name)
    }
}
