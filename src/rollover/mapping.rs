//! The carry-forward policy: where each column of the new sheet gets its value from.

use crate::model::{Column, COLUMN_COUNT};
use serde::{Deserialize, Serialize};

/// The kind of ledger kept in the spreadsheet. Each preset has its own column mapping and its own
/// set of derived-column formulas.
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
pub enum Preset {
    /// Daily stock-keeping: A date, B product, C unit cost, D margin %, E opening stock,
    /// F units sold, G price, H total sold, I profit, J remaining stock.
    #[default]
    Inventory,
    /// Loan tracking: A date, B client, C principal lent today, D interest %, E opening balance,
    /// F payment, G amount due, H principal lent this month, I interest, J balance.
    Ledger,
}

serde_plain::derive_display_from_serialize!(Preset);
serde_plain::derive_fromstr_from_deserialize!(Preset);

/// Where a column of the new sheet gets its value.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum ColumnSource {
    /// The date of the new sheet, `YYYY-MM-DD`.
    Today,
    /// The same-row value of a predecessor column. Missing cells become `""`.
    Copy { from: Column },
    /// Yesterday's closing value becomes today's opening value. Missing cells become `default`.
    CarryForward {
        from: Column,
        default: &'static str,
    },
    /// A fixed value, e.g. a counter that resets every day.
    Literal { value: &'static str },
    /// Left blank by the transform and filled in later with a formula.
    Formula,
}

/// One `ColumnSource` per column of the schema, `A` through `J`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ColumnMapping {
    preset: Preset,
    sources: [ColumnSource; COLUMN_COUNT],
}

impl ColumnMapping {
    pub fn for_preset(preset: Preset) -> Self {
        match preset {
            Preset::Inventory => Self::inventory(),
            Preset::Ledger => Self::ledger(),
        }
    }

    pub fn inventory() -> Self {
        Self {
            preset: Preset::Inventory,
            sources: [
                ColumnSource::Today,
                ColumnSource::Copy { from: Column::B },
                ColumnSource::Copy { from: Column::C },
                ColumnSource::Copy { from: Column::D },
                ColumnSource::CarryForward {
                    from: Column::J,
                    default: "0",
                },
                ColumnSource::Literal { value: "0" },
                ColumnSource::Formula,
                ColumnSource::Formula,
                ColumnSource::Formula,
                ColumnSource::Formula,
            ],
        }
    }

    pub fn ledger() -> Self {
        Self {
            preset: Preset::Ledger,
            sources: [
                ColumnSource::Today,
                ColumnSource::Copy { from: Column::B },
                ColumnSource::Literal { value: "0" },
                ColumnSource::Copy { from: Column::D },
                ColumnSource::CarryForward {
                    from: Column::J,
                    default: "0",
                },
                ColumnSource::Literal { value: "0" },
                ColumnSource::Formula,
                ColumnSource::Formula,
                ColumnSource::Formula,
                ColumnSource::Formula,
            ],
        }
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn source(&self, column: Column) -> Option<ColumnSource> {
        self.sources.get(column.index()).copied()
    }

    /// Columns paired with their sources, in order.
    pub fn columns(&self) -> impl Iterator<Item = (Column, ColumnSource)> + '_ {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, s)| (Column::new(i), *s))
    }

    /// The columns that are populated by formulas.
    pub fn formula_columns(&self) -> Vec<Column> {
        self.columns()
            .filter(|(_, s)| matches!(s, ColumnSource::Formula))
            .map(|(c, _)| c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_carries_j_into_e() {
        let m = ColumnMapping::inventory();
        assert_eq!(
            m.source(Column::E),
            Some(ColumnSource::CarryForward {
                from: Column::J,
                default: "0"
            })
        );
        assert_eq!(m.source(Column::F), Some(ColumnSource::Literal { value: "0" }));
        assert_eq!(m.source(Column::A), Some(ColumnSource::Today));
        assert_eq!(m.source(Column::new(10)), None);
    }

    #[test]
    fn test_ledger_resets_principal() {
        let m = ColumnMapping::ledger();
        assert_eq!(m.source(Column::C), Some(ColumnSource::Literal { value: "0" }));
        assert_eq!(m.source(Column::D), Some(ColumnSource::Copy { from: Column::D }));
        assert_ne!(m, ColumnMapping::inventory());
    }

    #[test]
    fn test_formula_columns() {
        for preset in [Preset::Inventory, Preset::Ledger] {
            let m = ColumnMapping::for_preset(preset);
            assert_eq!(m.preset(), preset);
            assert_eq!(
                m.formula_columns(),
                vec![Column::G, Column::H, Column::I, Column::J]
            );
        }
    }

    #[test]
    fn test_preset_strings() {
        assert_eq!(Preset::Ledger.to_string(), "ledger");
        assert_eq!("inventory".parse::<Preset>().unwrap(), Preset::Inventory);
        assert!("loans".parse::<Preset>().is_err());
    }
}
