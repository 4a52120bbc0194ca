use crate::api::{self, Mode};
use crate::commands::Out;
use crate::error::{Error, ErrorType, IntoResult};
use crate::rollover::{Rollover, RolloverResult, RolloverSettings};
use crate::{Config, Result};
use anyhow::anyhow;
use chrono::{Local, NaiveDate};

/// Creates the sheet for `date` (today's local date when `None`) and reports the outcome. A failed
/// rollover is returned as an `Error` whose type matches the failure.
pub async fn run(
    config: &Config,
    mode: Mode,
    date: Option<NaiveDate>,
) -> Result<Out<RolloverResult>> {
    let today = date.unwrap_or_else(|| Local::now().date_naive());
    let result = rollover(config, mode, today).await?;
    match result.error_type() {
        None => Ok(Out::new(result.message(), result)),
        Some(error_type) => Err(Error::new(error_type, anyhow!(result.message()))),
    }
}

/// Runs one rollover with a freshly constructed gateway. Only gateway construction can fail here;
/// everything after that is reported in the `RolloverResult`.
pub(crate) async fn rollover(
    config: &Config,
    mode: Mode,
    today: NaiveDate,
) -> Result<RolloverResult> {
    let sheet = api::sheet(config, mode).await.pub_result(ErrorType::Auth)?;
    Ok(Rollover::new(sheet, RolloverSettings::from(config))
        .run(today)
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestSheetState;
    use crate::test::TestEnv;

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[tokio::test]
    async fn test_run_creates_sheet() {
        let env = TestEnv::new().await;
        let out = run(&env.config(), Mode::Test, Some(june(2))).await.unwrap();
        assert_eq!(out.message(), "Sheet '2025-06-02' created successfully");
        assert_eq!(out.structure().unwrap().rows_written, 3);

        let state = env.get_state();
        let tab = state.tab("2025-06-02").unwrap();
        assert_eq!(tab.rows.len(), 4);
        assert_eq!(tab.rows[1][0], "2025-06-02");
    }

    #[tokio::test]
    async fn test_run_without_predecessor() {
        let env = TestEnv::new().await;
        let mut state = TestSheetState::new("en_US");
        state.add_tab("Summary", vec![]);
        env.set_state(state);

        let err = run(&env.config(), Mode::Test, Some(june(2))).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
        assert_eq!(err.to_string(), "No prior sheet to roll forward from");
    }

    #[tokio::test]
    async fn test_rollover_twice_same_day() {
        let env = TestEnv::new().await;
        let first = rollover(&env.config(), Mode::Test, june(2)).await.unwrap();
        let second = rollover(&env.config(), Mode::Test, june(2)).await.unwrap();
        assert!(first.is_success());
        assert_eq!(first, second);
        let state = env.get_state();
        assert_eq!(state.tabs.len(), 3);
    }
}
