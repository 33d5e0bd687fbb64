//! Error taxonomy for table operations and reasoning runs.
//!
//! `ChainError` covers data conditions: the Validator converts them into
//! exclusion decisions, so they never fail a run. `RunError` covers caller
//! misconfiguration and is raised before the loop starts.
use thiserror::Error;

/// Data conditions raised by the operation catalog and the validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("column '{name}' not found (available: {})", available.join(", "))]
    InvalidColumn {
        name: String,
        available: Vec<String>,
    },

    #[error("column '{name}' already exists")]
    DuplicateColumn { name: String },

    #[error("row index {index} outside 1..={row_count}")]
    InvalidRowRange { index: usize, row_count: usize },

    #[error("argument shape mismatch: {detail}")]
    ArgumentShape { detail: String },

    #[error("operation already applied at step {step} (fingerprint {fingerprint})")]
    LoopDetected { fingerprint: String, step: usize },

    #[error("step budget of {max_steps} exhausted before an answer was available")]
    BudgetExhausted { max_steps: usize },
}

impl ChainError {
    /// Stable snake_case code used in audit records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidColumn { .. } => "invalid_column",
            Self::DuplicateColumn { .. } => "duplicate_column",
            Self::InvalidRowRange { .. } => "invalid_row_range",
            Self::ArgumentShape { .. } => "argument_shape",
            Self::LoopDetected { .. } => "loop_detected",
            Self::BudgetExhausted { .. } => "budget_exhausted",
        }
    }
}

/// Structural problems with a table value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("column name '{0}' appears more than once")]
    DuplicateColumnName(String),

    #[error("column names must be non-empty")]
    EmptyColumnName,

    #[error("row {row} has columns [{}], expected [{}]", found.join(", "), expected.join(", "))]
    RowShape {
        row: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Misconfigured runs, reported before any step executes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("max_steps must be positive (got {0})")]
    InvalidMaxSteps(usize),

    #[error("malformed initial table: {0}")]
    MalformedTable(#[from] TableError),
}
