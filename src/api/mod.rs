//! The spreadsheet gateway: a small trait over the handful of remote calls a rollover needs, with a
//! Google Sheets implementation and an in-memory implementation.

mod credentials;
mod files;
mod google_sheet;
mod oauth;
mod service_account;
mod test_sheet;

use crate::error::Res;
use crate::model::{Row, SheetRange, SheetRef, SpreadsheetMeta};
use crate::Config;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use credentials::GOOGLE_CREDENTIALS_ENV;
pub(crate) use credentials::{CredentialSource, Credentials};
pub(crate) use google_sheet::GoogleSheet;
pub(crate) use oauth::TokenProvider;
pub(crate) use test_sheet::TestSheet;
#[cfg(test)]
pub(crate) use test_sheet::{FailOn, TestSheetState};

/// The OAuth scope needed to read and write the spreadsheet.
pub(crate) const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// Environment variable that, when set and non-empty, switches to `Mode::Test`.
pub const TEST_MODE_ENV: &str = "ROLLOVER_IN_TEST_MODE";

/// The remote calls a rollover makes. Implementations do not retry; a failed call is reported to
/// the caller as-is.
#[async_trait::async_trait]
pub(crate) trait Sheet: Send {
    /// Returns the document locale and its sheets in tab order.
    async fn metadata(&mut self) -> Res<SpreadsheetMeta>;

    /// Reads the values of `range`. Trailing empty cells and rows are not returned.
    async fn get_values(&mut self, range: &SheetRange) -> Res<Vec<Row>>;

    /// Writes `rows` starting at the top-left of `range`. Values are interpreted the way the
    /// spreadsheet interprets typed input, so strings beginning with `=` become formulas.
    async fn update_values(&mut self, range: &SheetRange, rows: &[Row]) -> Res<()>;

    /// Adds a sheet named `title` at the end of the tab list.
    async fn add_sheet(&mut self, title: &str) -> Res<SheetRef>;

    /// Deletes the sheet with `sheet_id`.
    async fn delete_sheet(&mut self, sheet_id: i64) -> Res<()>;
}

/// Whether to talk to Google or to in-memory test sheets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Google,
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    /// `Mode::Test` when `ROLLOVER_IN_TEST_MODE` is set to a non-empty value, otherwise
    /// `Mode::Google`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// Constructs a gateway for the spreadsheet in `config`. Each call builds a fresh instance; nothing
/// is cached between rollovers.
pub(crate) async fn sheet(config: &Config, mode: Mode) -> Res<Box<dyn Sheet + Send>> {
    debug!("Creating a {mode} spreadsheet gateway");
    match mode {
        Mode::Google => {
            let credentials = Credentials::load(&CredentialSource::from_env(config)).await?;
            Ok(Box::new(
                GoogleSheet::new(config.spreadsheet_id(), credentials).await?,
            ))
        }
        Mode::Test => Ok(Box::new(TestSheet::new(config.spreadsheet_id()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_strings() {
        assert_eq!(Mode::Test.to_string(), "test");
        assert_eq!("google".parse::<Mode>().unwrap(), Mode::Google);
    }
}
