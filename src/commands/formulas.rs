use crate::args::FormulasArgs;
use crate::commands::Out;
use crate::model::DatedSheetName;
use crate::rollover::{dialect_for, generate, FormulaSet, GeneratedFormulas};
use crate::Result;
use chrono::Local;
use std::fmt::Write;

/// Renders the formulas a rollover would write for `args`. This is a pure computation and never
/// contacts a spreadsheet.
pub fn formulas(args: &FormulasArgs) -> Result<Out<GeneratedFormulas>> {
    let today = args.date().unwrap_or_else(|| Local::now().date_naive());
    let predecessor = match args.predecessor() {
        Some(predecessor) => predecessor.to_string(),
        None => {
            let yesterday = today.pred_opt().unwrap_or(today);
            DatedSheetName::for_date(yesterday).name().to_string()
        }
    };
    let dialect = dialect_for(args.locale());
    let formula_set = FormulaSet::new(args.preset(), !args.unguarded(), &predecessor, today);
    let generated = generate(args.rows(), &dialect, &formula_set, args.aggregate());

    let mut message = format!("Formulas for {} rows in locale '{}'", args.rows(), args.locale());
    for column in &generated.columns {
        for (offset, formula) in column.formulas.iter().enumerate() {
            let _ = write!(
                message,
                "\n  {}{}: {formula}",
                column.column,
                column.first_row + offset
            );
        }
    }
    if let Some(aggregate) = &generated.aggregate {
        let _ = write!(message, "\n  row {}: {}", aggregate.row, aggregate.cells.join(" | "));
    }
    Ok(Out::new(message, generated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;
    use crate::rollover::Preset;
    use chrono::NaiveDate;

    #[test]
    fn test_inventory_formulas_english() {
        let out = formulas(&FormulasArgs::new(2, "en_US", Preset::Inventory)).unwrap();
        let generated = out.structure().unwrap();
        assert_eq!(generated.columns.len(), 4);
        let g = &generated.columns[0];
        assert_eq!(g.column, Column::G);
        assert_eq!(g.first_row, 2);
        assert_eq!(g.formulas[0], r#"=IF(AND(C2<>"",D2<>""),C2*(1+D2/100),"")"#);
        assert_eq!(g.last_row(), 3);
        assert!(generated.aggregate.is_none());
        assert!(out.message().contains("G2: "));
    }

    #[test]
    fn test_unguarded_spanish_aggregate() {
        let args = FormulasArgs::new(3, "es_CO", Preset::Inventory)
            .with_unguarded(true)
            .with_aggregate(true);
        let out = formulas(&args).unwrap();
        let generated = out.structure().unwrap();
        assert_eq!(generated.columns[0].formulas[2], "=C4*(1+D4/100)");
        let aggregate = generated.aggregate.as_ref().unwrap();
        assert_eq!(aggregate.row, 5);
        assert_eq!(aggregate.cells[Column::H.index()], "=SUMA(H2:H4)");
    }

    #[test]
    fn test_ledger_references_predecessor() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let args =
            FormulasArgs::new(1, "en_US", Preset::Ledger).with_predecessor("2025-06-01", date);
        let out = formulas(&args).unwrap();
        let generated = out.structure().unwrap();
        let referenced = generated
            .columns
            .iter()
            .flat_map(|c| c.formulas.iter())
            .any(|f| f.contains("'2025-06-01'!"));
        assert!(referenced, "{generated:?}");
    }

    #[test]
    fn test_zero_rows() {
        let out = formulas(&FormulasArgs::new(0, "en_US", Preset::Inventory)).unwrap();
        assert_eq!(out.structure(), Some(&GeneratedFormulas::default()));
    }
}
