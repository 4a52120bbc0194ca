//! Runs one rollover from start to finish against a spreadsheet gateway.

use crate::api::Sheet;
use crate::error::ErrorType;
use crate::model::{CellRef, Column, DatedSheetName, Row, SheetRange, LAST_COLUMN};
use crate::rollover::{
    dialect_for, generate, resolve_excluding, transform, ColumnMapping, FormulaSet, Preset,
    ResolutionPolicy, SheetCatalog,
};
use crate::Config;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Display;
use tracing::{debug, info, warn};

/// What a rollover needs to know beyond the date. Usually built from `Config`.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct RolloverSettings {
    pub preset: Preset,
    pub policy: ResolutionPolicy,
    pub guard_formulas: bool,
    pub aggregate_row: bool,
    /// Overrides the locale the spreadsheet reports.
    pub locale: Option<String>,
}

impl From<&Config> for RolloverSettings {
    fn from(config: &Config) -> Self {
        Self {
            preset: config.preset(),
            policy: config.policy(),
            guard_formulas: config.guard_formulas(),
            aggregate_row: config.aggregate_row(),
            locale: config.locale().map(str::to_string),
        }
    }
}

/// Why a rollover failed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// There was no sheet to roll forward from. Nothing was changed.
    NoPredecessor,
    /// A remote call failed before the new sheet existed.
    Remote,
    /// A remote call failed after the new sheet was created. The sheet is left half-populated and
    /// running the rollover again replaces it.
    PartialWrite,
}

impl FailureKind {
    pub fn error_type(&self) -> ErrorType {
        match self {
            FailureKind::NoPredecessor => ErrorType::NotFound,
            FailureKind::Remote => ErrorType::Remote,
            FailureKind::PartialWrite => ErrorType::PartialWrite,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RolloverStatus {
    Success,
    Failure { kind: FailureKind, reason: String },
}

/// The outcome of `Rollover::run`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RolloverResult {
    pub sheet_name: String,
    pub rows_written: usize,
    pub status: RolloverStatus,
}

impl RolloverResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RolloverStatus::Success)
    }

    /// `None` on success.
    pub fn error_type(&self) -> Option<ErrorType> {
        match &self.status {
            RolloverStatus::Success => None,
            RolloverStatus::Failure { kind, .. } => Some(kind.error_type()),
        }
    }

    /// 200 on success, otherwise the status of the failure's `ErrorType`.
    pub fn http_status(&self) -> u16 {
        self.error_type().map(|t| t.http_status()).unwrap_or(200)
    }

    /// A one-line description suitable for showing to a user.
    pub fn message(&self) -> String {
        match &self.status {
            RolloverStatus::Success => {
                format!("Sheet '{}' created successfully", self.sheet_name)
            }
            RolloverStatus::Failure { reason, .. } => reason.clone(),
        }
    }
}

struct Failure {
    kind: FailureKind,
    reason: String,
}

impl Failure {
    fn no_predecessor() -> Self {
        Self {
            kind: FailureKind::NoPredecessor,
            reason: "No prior sheet to roll forward from".to_string(),
        }
    }
}

/// Adapts `anyhow` errors into a `Failure` of the given kind, keeping the context chain.
trait OrFail<T> {
    fn or_fail(self, kind: FailureKind) -> Result<T, Failure>;
}

impl<T, E: Display> OrFail<T> for Result<T, E> {
    fn or_fail(self, kind: FailureKind) -> Result<T, Failure> {
        self.map_err(|e| Failure {
            kind,
            reason: format!("{e:#}"),
        })
    }
}

/// Composes catalog, resolver, transformer and formula generator over one gateway. Every call to
/// `run` takes a fresh snapshot of the document.
pub(crate) struct Rollover {
    sheet: Box<dyn Sheet + Send>,
    settings: RolloverSettings,
}

impl Rollover {
    pub(crate) fn new(sheet: Box<dyn Sheet + Send>, settings: RolloverSettings) -> Self {
        Self { sheet, settings }
    }

    /// Creates the sheet for `today`. Never returns an error: every failure is folded into the
    /// returned `RolloverResult`.
    pub(crate) async fn run(&mut self, today: NaiveDate) -> RolloverResult {
        let name = DatedSheetName::for_date(today);
        info!(
            "Rolling over to '{}' ({} preset, {} policy)",
            name, self.settings.preset, self.settings.policy
        );
        match self.try_run(&name).await {
            Ok(rows_written) => {
                info!("Sheet '{name}' created with {rows_written} rows");
                RolloverResult {
                    sheet_name: name.name().to_string(),
                    rows_written,
                    status: RolloverStatus::Success,
                }
            }
            Err(Failure { kind, reason }) => {
                warn!("Rollover to '{name}' failed ({kind:?}): {reason}");
                RolloverResult {
                    sheet_name: name.name().to_string(),
                    rows_written: 0,
                    status: RolloverStatus::Failure { kind, reason },
                }
            }
        }
    }

    async fn try_run(&mut self, today: &DatedSheetName) -> Result<usize, Failure> {
        let mut catalog = SheetCatalog::list(self.sheet.as_mut())
            .await
            .or_fail(FailureKind::Remote)?;

        if let Some(existing) = catalog.find(today.name()).cloned() {
            debug!("Deleting the existing '{}' sheet", existing.name);
            self.sheet
                .delete_sheet(existing.id)
                .await
                .or_fail(FailureKind::Remote)?;
            catalog.remove(&existing.name);
        }

        let predecessor = resolve_excluding(&catalog, self.settings.policy, today)
            .ok_or_else(Failure::no_predecessor)?;
        debug!("Rolling forward from '{predecessor}'");

        // Reads have no side effects, so they happen before the new sheet exists.
        let header = self
            .sheet
            .get_values(&SheetRange::rect(
                &predecessor,
                CellRef::new(Column::A, 1),
                CellRef::new(LAST_COLUMN, 1),
            ))
            .await
            .or_fail(FailureKind::Remote)?;
        let body = self
            .sheet
            .get_values(&SheetRange::open(
                &predecessor,
                CellRef::new(Column::A, 2),
                LAST_COLUMN,
            ))
            .await
            .or_fail(FailureKind::Remote)?;

        self.sheet
            .add_sheet(today.name())
            .await
            .or_fail(FailureKind::Remote)?;

        // From here on the new sheet exists and a failure leaves it partially written.
        if !header.is_empty() {
            self.write(today, Column::A, 1, header).await?;
        }

        let mapping = ColumnMapping::for_preset(self.settings.preset);
        let rows = transform(&body, &mapping, today.date());
        if rows.is_empty() {
            info!("'{predecessor}' has no data rows, nothing to carry forward");
            return Ok(0);
        }
        let row_count = rows.len();
        self.write(today, Column::A, 2, rows).await?;

        let locale = match &self.settings.locale {
            Some(locale) => locale.as_str(),
            None => catalog.locale(),
        };
        let dialect = dialect_for(locale);
        let formula_set = FormulaSet::new(
            self.settings.preset,
            self.settings.guard_formulas,
            &predecessor,
            today.date(),
        );
        let generated = generate(
            row_count,
            &dialect,
            &formula_set,
            self.settings.aggregate_row,
        );
        for column in generated.columns {
            let values: Vec<Row> = column.formulas.into_iter().map(|f| vec![f]).collect();
            self.write(today, column.column, column.first_row, values)
                .await?;
        }
        if let Some(aggregate) = generated.aggregate {
            self.write(today, Column::A, aggregate.row, vec![aggregate.cells])
                .await?;
        }
        Ok(row_count)
    }

    async fn write(
        &mut self,
        today: &DatedSheetName,
        column: Column,
        row: usize,
        values: Vec<Row>,
    ) -> Result<(), Failure> {
        let range = SheetRange::cell(today.name(), column, row);
        self.sheet
            .update_values(&range, &values)
            .await
            .or_fail(FailureKind::PartialWrite)
    }
}
