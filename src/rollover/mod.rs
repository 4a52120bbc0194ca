//! The rollover engine: finds yesterday's sheet, carries its rows forward into a new sheet named
//! for today, and installs the derived-column formulas in the document's locale.

mod catalog;
mod dialect;
mod formula;
mod mapping;
mod orchestrator;
mod resolver;
mod transform;

pub use catalog::SheetCatalog;
pub use dialect::{dialect_for, LocaleDialect};
pub use formula::{
    generate, is_aggregate_row, AggregateRow, Expr, Formula, FormulaColumn, FormulaSet, Function,
    GeneratedFormulas, Op, AGGREGATE_LABEL,
};
pub use mapping::{ColumnMapping, ColumnSource, Preset};
pub(crate) use orchestrator::Rollover;
pub use orchestrator::{FailureKind, RolloverResult, RolloverSettings, RolloverStatus};
pub(crate) use resolver::resolve_excluding;
pub use resolver::{resolve_predecessor, ResolutionPolicy};
pub use transform::transform;
