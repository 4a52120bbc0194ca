//! Derived-column formulas.
//!
//! Formulas are built as a small expression tree and only turned into text at the end, by
//! rendering against a `LocaleDialect`. The same tree renders as `=IF(AND(C2<>"",D2<>""),...)` for
//! an English spreadsheet and as `=SI(Y(C2<>"";D2<>"");...)` for a Spanish one.

use crate::model::{quote_sheet_name, CellRef, Column, DatedSheetName, Row, COLUMN_COUNT};
use crate::rollover::{LocaleDialect, Preset};
use chrono::NaiveDate;
use serde::Serialize;

/// The text written into column `A` of the trailing aggregate row. Rows starting with this label
/// are not data rows and are never rolled forward.
pub const AGGREGATE_LABEL: &str = "TOTAL";

/// A binary operator.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    NotEqual,
}

impl Op {
    fn symbol(&self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::NotEqual => "<>",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Op::NotEqual => 1,
            Op::Add | Op::Sub => 2,
            Op::Mul | Op::Div => 3,
        }
    }

    /// `a - (b - c)` is not `a - b - c`.
    fn is_left_associative_only(&self) -> bool {
        matches!(self, Op::Sub | Op::Div | Op::NotEqual)
    }
}

/// A spreadsheet function whose name depends on the locale.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Function {
    If,
    And,
    Sum,
}

impl Function {
    fn name(&self, dialect: &LocaleDialect) -> &'static str {
        match self {
            Function::If => dialect.if_fn,
            Function::And => dialect.and_fn,
            Function::Sum => dialect.sum_fn,
        }
    }
}

/// A formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A cell, optionally on another sheet.
    Cell {
        sheet: Option<String>,
        cell: CellRef,
    },
    Range(CellRef, CellRef),
    Number(f64),
    Text(String),
    Binary(Box<Expr>, Op, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    pub fn cell(column: Column, row: usize) -> Self {
        Expr::Cell {
            sheet: None,
            cell: CellRef::new(column, row),
        }
    }

    pub fn sheet_cell(sheet: impl Into<String>, column: Column, row: usize) -> Self {
        Expr::Cell {
            sheet: Some(sheet.into()),
            cell: CellRef::new(column, row),
        }
    }

    pub fn num(n: f64) -> Self {
        Expr::Number(n)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Expr::Text(s.into())
    }

    pub fn binary(left: Expr, op: Op, right: Expr) -> Self {
        Expr::Binary(Box::new(left), op, Box::new(right))
    }

    pub fn add(self, right: Expr) -> Self {
        Expr::binary(self, Op::Add, right)
    }

    pub fn sub(self, right: Expr) -> Self {
        Expr::binary(self, Op::Sub, right)
    }

    pub fn mul(self, right: Expr) -> Self {
        Expr::binary(self, Op::Mul, right)
    }

    pub fn div(self, right: Expr) -> Self {
        Expr::binary(self, Op::Div, right)
    }

    /// `self<>""`
    pub fn not_blank(self) -> Self {
        Expr::binary(self, Op::NotEqual, Expr::text(""))
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(_, op, _) => op.precedence(),
            _ => u8::MAX,
        }
    }

    /// Renders the expression, without the leading `=`.
    pub fn render(&self, dialect: &LocaleDialect) -> String {
        let mut out = String::new();
        self.write(dialect, &mut out);
        out
    }

    fn write(&self, dialect: &LocaleDialect, out: &mut String) {
        match self {
            Expr::Cell { sheet, cell } => {
                if let Some(sheet) = sheet {
                    out.push_str(&quote_sheet_name(sheet));
                    out.push('!');
                }
                out.push_str(&cell.to_string());
            }
            Expr::Range(start, end) => {
                out.push_str(&format!("{start}:{end}"));
            }
            Expr::Number(n) => {
                let s = n.to_string();
                out.push_str(&s.replace('.', &dialect.decimal_separator.to_string()));
            }
            Expr::Text(s) => {
                out.push('"');
                out.push_str(&s.replace('"', "\"\""));
                out.push('"');
            }
            Expr::Binary(left, op, right) => {
                let parent = op.precedence();
                write_operand(left, left.precedence() < parent, dialect, out);
                out.push_str(op.symbol());
                let right_parens = right.precedence() < parent
                    || (right.precedence() == parent && op.is_left_associative_only());
                write_operand(right, right_parens, dialect, out);
            }
            Expr::Call(function, args) => {
                out.push_str(function.name(dialect));
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(dialect.arg_separator);
                    }
                    arg.write(dialect, out);
                }
                out.push(')');
            }
        }
    }
}

fn write_operand(expr: &Expr, parens: bool, dialect: &LocaleDialect, out: &mut String) {
    if parens {
        out.push('(');
        expr.write(dialect, out);
        out.push(')');
    } else {
        expr.write(dialect, out);
    }
}

/// A complete formula, i.e. an expression that renders with a leading `=`.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula(pub Expr);

impl Formula {
    pub fn render(&self, dialect: &LocaleDialect) -> String {
        format!("={}", self.0.render(dialect))
    }
}

/// `IF(cond, value, "")`, or `IF(AND(cond, ...), value, "")` when there is more than one
/// condition.
fn guard(mut conditions: Vec<Expr>, value: Expr) -> Expr {
    let condition = if conditions.len() == 1 {
        conditions.remove(0)
    } else {
        Expr::Call(Function::And, conditions)
    };
    Expr::Call(Function::If, vec![condition, value, Expr::text("")])
}

/// The derived-column formulas of a preset, along with whatever context they need.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "preset")]
pub enum FormulaSet {
    /// G price with margin, H total sold, I profit, J remaining stock.
    Inventory { guarded: bool },
    /// G amount due, H principal lent this month, I interest, J running balance. The balance and
    /// the monthly principal refer to the predecessor sheet by name. When the predecessor is in a
    /// different calendar month, the monthly principal starts over.
    Ledger {
        predecessor: String,
        same_month: bool,
        guarded: bool,
    },
}

impl FormulaSet {
    /// Builds the formula set for `preset`. A predecessor whose name is not a date is treated as
    /// belonging to a different month.
    pub fn new(preset: Preset, guarded: bool, predecessor: &str, today: NaiveDate) -> Self {
        match preset {
            Preset::Inventory => FormulaSet::Inventory { guarded },
            Preset::Ledger => FormulaSet::Ledger {
                predecessor: predecessor.to_string(),
                same_month: DatedSheetName::parse(predecessor)
                    .map(|d| d.same_month(today))
                    .unwrap_or(false),
                guarded,
            },
        }
    }

    /// The columns that get a formula in every data row.
    pub fn columns(&self) -> [Column; 4] {
        [Column::G, Column::H, Column::I, Column::J]
    }

    /// The columns that are summed in the aggregate row.
    pub fn aggregate_columns(&self) -> &'static [Column] {
        match self {
            FormulaSet::Inventory { .. } => &[Column::H, Column::I],
            FormulaSet::Ledger { .. } => &[Column::F, Column::J],
        }
    }

    /// The formula of `column` in the 1-based `row`, or `None` if the column has no formula.
    pub fn formula(&self, column: Column, row: usize) -> Option<Formula> {
        let c = |col: Column| Expr::cell(col, row);
        let expr = match self {
            FormulaSet::Inventory { guarded } => {
                let (expr, conditions) = match column {
                    // C * (1 + D / 100)
                    Column::G => (
                        c(Column::C).mul(Expr::num(1.0).add(c(Column::D).div(Expr::num(100.0)))),
                        vec![c(Column::C).not_blank(), c(Column::D).not_blank()],
                    ),
                    // F * G
                    Column::H => (
                        c(Column::F).mul(c(Column::G)),
                        vec![c(Column::F).not_blank()],
                    ),
                    // H - C * F
                    Column::I => (
                        c(Column::H).sub(c(Column::C).mul(c(Column::F))),
                        vec![c(Column::G).not_blank(), c(Column::F).not_blank()],
                    ),
                    // E - F
                    Column::J => (
                        c(Column::E).sub(c(Column::F)),
                        vec![c(Column::E).not_blank(), c(Column::F).not_blank()],
                    ),
                    _ => return None,
                };
                if *guarded {
                    guard(conditions, expr)
                } else {
                    expr
                }
            }
            FormulaSet::Ledger {
                predecessor,
                same_month,
                guarded,
            } => {
                let with_interest =
                    || c(Column::C).mul(Expr::num(1.0).add(c(Column::D).div(Expr::num(100.0))));
                let (expr, conditions) = match column {
                    // C * (1 + D / 100)
                    Column::G => (
                        with_interest(),
                        vec![c(Column::C).not_blank(), c(Column::D).not_blank()],
                    ),
                    // 'yesterday'!H + C, or just C on the first day of a month
                    Column::H => {
                        let expr = if *same_month {
                            Expr::sheet_cell(predecessor, Column::H, row).add(c(Column::C))
                        } else {
                            c(Column::C)
                        };
                        (expr, vec![c(Column::C).not_blank()])
                    }
                    // C * D / 100
                    Column::I => (
                        c(Column::C).mul(c(Column::D)).div(Expr::num(100.0)),
                        vec![c(Column::C).not_blank(), c(Column::D).not_blank()],
                    ),
                    // 'yesterday'!J + C * (1 + D / 100) - F
                    Column::J => (
                        Expr::sheet_cell(predecessor, Column::J, row)
                            .add(with_interest())
                            .sub(c(Column::F)),
                        vec![c(Column::C).not_blank(), c(Column::D).not_blank()],
                    ),
                    _ => return None,
                };
                if *guarded {
                    guard(conditions, expr)
                } else {
                    expr
                }
            }
        };
        Some(Formula(expr))
    }
}

/// The formulas for one column, for rows `first_row..first_row + formulas.len()`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FormulaColumn {
    pub column: Column,
    pub first_row: usize,
    pub formulas: Vec<String>,
}

impl FormulaColumn {
    /// The last row covered, inclusive.
    pub fn last_row(&self) -> usize {
        self.first_row + self.formulas.len().saturating_sub(1)
    }
}

/// The trailing aggregate row, as a full row of the schema.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct AggregateRow {
    pub row: usize,
    pub cells: Row,
}

/// Everything `generate` produces.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize)]
pub struct GeneratedFormulas {
    pub columns: Vec<FormulaColumn>,
    pub aggregate: Option<AggregateRow>,
}

/// Generates the formula text for `row_count` data rows starting at row 2, and optionally the
/// aggregate row below them. The output depends only on the arguments.
pub fn generate(
    row_count: usize,
    dialect: &LocaleDialect,
    formula_set: &FormulaSet,
    aggregate: bool,
) -> GeneratedFormulas {
    if row_count == 0 {
        return GeneratedFormulas::default();
    }
    let first_row = 2;
    let last_row = first_row + row_count - 1;

    let columns = formula_set
        .columns()
        .into_iter()
        .map(|column| FormulaColumn {
            column,
            first_row,
            formulas: (first_row..=last_row)
                .filter_map(|row| formula_set.formula(column, row))
                .map(|f| f.render(dialect))
                .collect(),
        })
        .collect();

    let aggregate = aggregate.then(|| {
        let mut cells = vec![String::new(); COLUMN_COUNT];
        cells[Column::A.index()] = AGGREGATE_LABEL.to_string();
        for column in formula_set.aggregate_columns() {
            let sum = Expr::Call(
                Function::Sum,
                vec![Expr::Range(
                    CellRef::new(*column, first_row),
                    CellRef::new(*column, last_row),
                )],
            );
            cells[column.index()] = Formula(sum).render(dialect);
        }
        AggregateRow {
            row: last_row + 1,
            cells,
        }
    });

    GeneratedFormulas { columns, aggregate }
}

/// True for the aggregate row written below the data.
pub fn is_aggregate_row(row: &[String]) -> bool {
    Column::A
        .get(row)
        .map(|a| a.trim() == AGGREGATE_LABEL)
        .unwrap_or(false)
}
