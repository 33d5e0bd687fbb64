//! Pre-execution checks and the answer-availability heuristic.
//!
//! Proposed operations are untrusted input. Every proposal is checked here
//! against the current table and the executed-fingerprint set before the
//! catalog runs it.
use super::fingerprint::Fingerprint;
use super::heuristics::{self, Direction};
use crate::error::ChainError;
use crate::ops::Operation;
use crate::table::Table;
use std::collections::BTreeMap;

/// A refused proposal: the typed reason plus a hint for the next attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub error: ChainError,
    pub suggestion: String,
}

impl Rejection {
    pub fn new(error: ChainError) -> Self {
        let suggestion = suggest(&error);
        Self { error, suggestion }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self.error, ChainError::LoopDetected { .. })
    }
}

fn suggest(error: &ChainError) -> String {
    match error {
        ChainError::InvalidColumn { name, available } => format!(
            "column '{name}' missing; consider f_add_column first or use one of: {}",
            available.join(", ")
        ),
        ChainError::DuplicateColumn { name } => {
            format!("column '{name}' already exists; use it directly or pick a new name")
        }
        ChainError::InvalidRowRange { row_count, .. } => {
            if *row_count == 0 {
                "table has no rows to select".to_string()
            } else {
                format!("choose row numbers between 1 and {row_count}")
            }
        }
        ChainError::ArgumentShape { detail } => format!("fix the argument shape: {detail}"),
        ChainError::LoopDetected { step, .. } => {
            format!("same operation already applied at step {step}; choose a different operation")
        }
        ChainError::BudgetExhausted { max_steps } => {
            format!("raise max_steps above {max_steps} or simplify the question")
        }
    }
}

/// Check a proposal's arguments against the current table.
pub fn validate_operation(table: &Table, operation: &Operation) -> Result<(), Rejection> {
    check_arguments(table, operation).map_err(Rejection::new)
}

fn check_arguments(table: &Table, operation: &Operation) -> Result<(), ChainError> {
    match operation {
        Operation::AddColumn { name, values, .. } => {
            if name.trim().is_empty() {
                return Err(ChainError::ArgumentShape {
                    detail: "new column name must be non-empty".to_string(),
                });
            }
            if table.has_column(name) {
                return Err(ChainError::DuplicateColumn { name: name.clone() });
            }
            if let Some(values) = values {
                if values.len() != table.row_count() {
                    return Err(ChainError::ArgumentShape {
                        detail: format!(
                            "{} values supplied for {} rows",
                            values.len(),
                            table.row_count()
                        ),
                    });
                }
            }
        }
        Operation::SelectRow { indices } => {
            if indices.is_empty() {
                return Err(ChainError::ArgumentShape {
                    detail: "select at least one row".to_string(),
                });
            }
            let row_count = table.row_count();
            if let Some(&index) = indices.iter().find(|&&index| index == 0 || index > row_count) {
                return Err(ChainError::InvalidRowRange { index, row_count });
            }
        }
        Operation::SelectColumn { names } => {
            if names.is_empty() {
                return Err(ChainError::ArgumentShape {
                    detail: "select at least one column".to_string(),
                });
            }
            for (idx, name) in names.iter().enumerate() {
                require_column(table, name)?;
                if names[..idx].contains(name) {
                    return Err(ChainError::ArgumentShape {
                        detail: format!("column '{name}' selected more than once"),
                    });
                }
            }
        }
        Operation::GroupBy {
            column,
            count_column,
        } => {
            require_column(table, column)?;
            if count_column.trim().is_empty() {
                return Err(ChainError::ArgumentShape {
                    detail: "count column name must be non-empty".to_string(),
                });
            }
            if count_column == column {
                return Err(ChainError::DuplicateColumn {
                    name: count_column.clone(),
                });
            }
        }
        Operation::SortBy { column, .. } => require_column(table, column)?,
    }
    Ok(())
}

fn require_column(table: &Table, name: &str) -> Result<(), ChainError> {
    if table.has_column(name) {
        return Ok(());
    }
    Err(ChainError::InvalidColumn {
        name: name.to_string(),
        available: table.columns().to_vec(),
    })
}

/// Reject a fingerprint that was already executed; maps fingerprint to step.
pub fn check_loop(
    executed: &BTreeMap<Fingerprint, usize>,
    fingerprint: &Fingerprint,
) -> Result<(), Rejection> {
    match executed.get(fingerprint) {
        Some(&step) => Err(Rejection::new(ChainError::LoopDetected {
            fingerprint: fingerprint.as_str().to_string(),
            step,
        })),
        None => Ok(()),
    }
}

/// Why the current table is considered to hold the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerSignal {
    /// Reduced to a single row.
    SingleRow,
    /// A count column has a strict extreme in the direction the question asks.
    CountExtreme { row: usize, count_column: String },
}

/// Precision-favoring check for an unambiguous answer in `table`.
pub fn answer_available(table: &Table, question: &str) -> Option<AnswerSignal> {
    if table.row_count() == 1 && table.column_count() > 0 {
        return Some(AnswerSignal::SingleRow);
    }
    if table.row_count() < 2 {
        return None;
    }
    let direction: Direction = heuristics::superlative(question)?;
    let count_column = heuristics::count_column(table)?;
    let row = heuristics::strict_extreme(table, &count_column, direction)?;
    Some(AnswerSignal::CountExtreme { row, count_column })
}
