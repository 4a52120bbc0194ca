//! Picks the sheet that today's sheet rolls forward from.

use crate::model::DatedSheetName;
use crate::rollover::SheetCatalog;
use serde::{Deserialize, Serialize};

/// How to choose the predecessor ("yesterday") sheet.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// The dated sheet with the latest date. Sheets whose names are not dates are ignored.
    #[default]
    LatestDate,
    /// The right-most tab in the document, whatever its name is.
    LastTab,
}

serde_plain::derive_display_from_serialize!(ResolutionPolicy);
serde_plain::derive_fromstr_from_deserialize!(ResolutionPolicy);

/// Selects the predecessor sheet name from `catalog` under `policy`. Returns `None` when there is
/// nothing to roll forward from.
///
/// Under `LatestDate`, names are compared as calendar dates, so a mix of `2025-1-9` and
/// `2025-01-10` style names still resolves to the latest day.
pub fn resolve_predecessor(catalog: &SheetCatalog, policy: ResolutionPolicy) -> Option<String> {
    match policy {
        ResolutionPolicy::LatestDate => catalog
            .dated()
            .max()
            .map(|dated| dated.name().to_string()),
        ResolutionPolicy::LastTab => catalog.last().map(|s| s.name.clone()),
    }
}

/// Same as `resolve_predecessor` but never returns `exclude`. This keeps a same-day rerun from
/// rolling today's sheet forward onto itself.
pub(crate) fn resolve_excluding(
    catalog: &SheetCatalog,
    policy: ResolutionPolicy,
    exclude: &DatedSheetName,
) -> Option<String> {
    let mut catalog = catalog.clone();
    catalog.remove(exclude.name());
    resolve_predecessor(&catalog, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SheetRef;
    use chrono::NaiveDate;

    fn catalog(names: &[&str]) -> SheetCatalog {
        SheetCatalog::new(
            "en_US",
            names
                .iter()
                .enumerate()
                .map(|(i, n)| SheetRef::new(*n, i as i64))
                .collect(),
        )
    }

    #[test]
    fn test_latest_date_ignores_non_dated() {
        let c = catalog(&["2025-06-01", "Summary", "2025-06-03", "2025-06-02"]);
        assert_eq!(
            resolve_predecessor(&c, ResolutionPolicy::LatestDate).as_deref(),
            Some("2025-06-03")
        );
    }

    #[test]
    fn test_latest_date_unpadded_names() {
        // Comparing these as strings would pick "2025-1-9".
        let c = catalog(&["2025-1-9", "2025-1-10", "Summary"]);
        assert_eq!(
            resolve_predecessor(&c, ResolutionPolicy::LatestDate).as_deref(),
            Some("2025-1-10")
        );
    }

    #[test]
    fn test_latest_date_mixed_padding() {
        let c = catalog(&["2025-01-31", "2025-2-1", "2025-1-30"]);
        assert_eq!(
            resolve_predecessor(&c, ResolutionPolicy::LatestDate).as_deref(),
            Some("2025-2-1")
        );
    }

    #[test]
    fn test_latest_date_not_found() {
        let c = catalog(&["Summary", "Notes"]);
        assert_eq!(resolve_predecessor(&c, ResolutionPolicy::LatestDate), None);
        assert_eq!(
            resolve_predecessor(&catalog(&[]), ResolutionPolicy::LatestDate),
            None
        );
    }

    #[test]
    fn test_last_tab() {
        let c = catalog(&["2025-06-03", "2025-06-01"]);
        assert_eq!(
            resolve_predecessor(&c, ResolutionPolicy::LastTab).as_deref(),
            Some("2025-06-01")
        );
        // The last tab is picked even when it is not dated.
        let c = catalog(&["2025-06-01", "Summary"]);
        assert_eq!(
            resolve_predecessor(&c, ResolutionPolicy::LastTab).as_deref(),
            Some("Summary")
        );
        assert_eq!(
            resolve_predecessor(&catalog(&[]), ResolutionPolicy::LastTab),
            None
        );
    }

    #[test]
    fn test_resolve_excluding_today() {
        let today = DatedSheetName::for_date(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        let c = catalog(&["2025-06-01", "2025-06-02"]);
        for policy in [ResolutionPolicy::LatestDate, ResolutionPolicy::LastTab] {
            assert_eq!(
                resolve_excluding(&c, policy, &today).as_deref(),
                Some("2025-06-01")
            );
        }
        let only_today = catalog(&["2025-06-02"]);
        assert_eq!(
            resolve_excluding(&only_today, ResolutionPolicy::LatestDate, &today),
            None
        );
    }

    #[test]
    fn test_policy_strings() {
        assert_eq!(ResolutionPolicy::LastTab.to_string(), "last_tab");
        assert_eq!(
            "latest_date".parse::<ResolutionPolicy>().unwrap(),
            ResolutionPolicy::LatestDate
        );
    }
}
