use crate::api::{self, Mode};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::DatedSheetName;
use crate::rollover::{
    dialect_for, resolve_excluding, LocaleDialect, ResolutionPolicy, SheetCatalog,
};
use crate::{Config, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fmt::Write;

/// One sheet of the document as listed by `rollover sheets`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SheetListing {
    pub name: String,
    pub id: i64,
    /// The date encoded in the name, if any.
    pub date: Option<NaiveDate>,
}

/// What `rollover sheets` reports.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SheetsReport {
    pub locale: String,
    pub dialect: LocaleDialect,
    pub policy: ResolutionPolicy,
    pub sheets: Vec<SheetListing>,
    /// The sheet a rollover for today would read from.
    pub predecessor: Option<String>,
}

/// Lists the sheets of the configured spreadsheet and shows which one today's rollover would roll
/// forward from. Nothing is written.
pub async fn sheets(config: &Config, mode: Mode) -> Result<Out<SheetsReport>> {
    let mut sheet = api::sheet(config, mode).await.pub_result(ErrorType::Auth)?;
    let catalog = SheetCatalog::list(sheet.as_mut())
        .await
        .pub_result(ErrorType::Remote)?;
    let today = DatedSheetName::for_date(Local::now().date_naive());
    let report = report(&catalog, config, &today);

    let mut message = format!(
        "{} sheets, locale '{}'",
        report.sheets.len(),
        report.locale
    );
    for listing in &report.sheets {
        let _ = write!(message, "\n  {}", listing.name);
        if listing.date.is_some() {
            message.push_str(" (dated)");
        }
    }
    match &report.predecessor {
        Some(predecessor) => {
            let _ = write!(message, "\nToday's sheet would roll forward from '{predecessor}'");
        }
        None => message.push_str("\nThere is no sheet to roll forward from"),
    }
    Ok(Out::new(message, report))
}

fn report(catalog: &SheetCatalog, config: &Config, today: &DatedSheetName) -> SheetsReport {
    let locale = config.locale().unwrap_or(catalog.locale()).to_string();
    SheetsReport {
        dialect: dialect_for(&locale),
        locale,
        policy: config.policy(),
        sheets: catalog
            .sheets()
            .iter()
            .map(|s| SheetListing {
                name: s.name.clone(),
                id: s.id,
                date: DatedSheetName::parse(&s.name).map(|d| d.date()),
            })
            .collect(),
        predecessor: resolve_excluding(catalog, config.policy(), today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SheetRef;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_sheets_lists_seeded_document() {
        let env = TestEnv::new().await;
        let out = sheets(&env.config(), Mode::Test).await.unwrap();
        let report = out.structure().unwrap();
        assert_eq!(report.locale, "en_US");
        assert_eq!(report.dialect, LocaleDialect::ENGLISH);
        let names: Vec<&str> = report.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Summary", "2025-06-01"]);
        assert_eq!(report.sheets[0].date, None);
        assert_eq!(report.sheets[1].date, NaiveDate::from_ymd_opt(2025, 6, 1));
        assert!(out.message().contains("\n  2025-06-01 (dated)"));
        assert!(out.message().contains("\n  Summary\n"));
        assert!(!out.message().contains("Summary (dated)"));
    }

    #[tokio::test]
    async fn test_report_excludes_today() {
        let env = TestEnv::new().await;
        let catalog = SheetCatalog::new(
            "es_CO",
            vec![SheetRef::new("2025-06-01", 1), SheetRef::new("2025-06-02", 2)],
        );
        let today = DatedSheetName::for_date(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        let report = report(&catalog, &env.config(), &today);
        assert_eq!(report.predecessor.as_deref(), Some("2025-06-01"));
        assert_eq!(report.dialect, LocaleDialect::SPANISH);
    }
}
