//! Table model: ordered unique columns over rows of scalar cells.
//!
//! Tables are immutable values. Every operation builds a new `Table`, so the
//! previous snapshot stays available for the audit chain.
use crate::error::TableError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub mod io;

/// One row keyed by column name. The key set always equals the table's columns.
pub type Row = BTreeMap<String, Value>;

/// A scalar cell: a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(serde_json::Number),
    Text(String),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn int(value: i64) -> Self {
        Self::Number(value.into())
    }

    /// Floats that are not finite have no JSON representation and become text.
    pub fn float(value: f64) -> Self {
        match serde_json::Number::from_f64(value) {
            Some(number) => Self::Number(number),
            None => Self::Text(value.to_string()),
        }
    }

    /// Numeric view of the cell; numeric-looking text counts as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => number.as_f64(),
            Self::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite()),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    /// Equality key used for grouping: numbers and text never collide.
    ///
    /// Numbers key on their numeric value so `2` and `2.0` group together,
    /// matching [`Value::compare`].
    pub(crate) fn group_key(&self) -> (u8, String) {
        match self {
            Self::Number(number) => (0, number_key(number)),
            Self::Text(text) => (1, text.clone()),
        }
    }

    /// Total order used by sorting: numbers first (numerically), then text.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(left), Some(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.to_string().cmp(&other.to_string()),
        }
    }
}

fn number_key(number: &serde_json::Number) -> String {
    if let Some(int) = number.as_i64() {
        return int.to_string();
    }
    if let Some(int) = number.as_u64() {
        return int.to_string();
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => {
            (float as i64).to_string()
        }
        Some(float) => float.to_string(),
        None => number.to_string(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::int(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(serde_json::Number::from(value as u64))
    }
}

/// Column names plus rows; see the module docs for the invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

#[derive(Deserialize)]
struct RawTable {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl TryFrom<RawTable> for Table {
    type Error = TableError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        Table::new(raw.columns, raw.rows)
    }
}

impl Table {
    /// Build a table, checking unique non-empty columns and row shape.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, TableError> {
        check_columns(&columns)?;
        for (idx, row) in rows.iter().enumerate() {
            let shape_ok =
                row.len() == columns.len() && columns.iter().all(|col| row.contains_key(col));
            if !shape_ok {
                return Err(TableError::RowShape {
                    row: idx + 1,
                    expected: columns.clone(),
                    found: row.keys().cloned().collect(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from positional rows aligned with `columns`.
    pub fn from_grid<C, S>(columns: C, grid: Vec<Vec<Value>>) -> Result<Self, TableError>
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        check_columns(&columns)?;
        let mut rows = Vec::with_capacity(grid.len());
        for (idx, cells) in grid.into_iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(TableError::RowShape {
                    row: idx + 1,
                    expected: columns.clone(),
                    found: columns.iter().take(cells.len()).cloned().collect(),
                });
            }
            rows.push(columns.iter().cloned().zip(cells).collect());
        }
        Ok(Self { columns, rows })
    }

    /// Crate-internal constructor for operation results that are shaped by construction.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Row>) -> Self {
        debug_assert!(Table::new(columns.clone(), rows.clone()).is_ok());
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|col| col == name)
    }

    /// Cell at a 0-based row position.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|cells| cells.get(column))
    }

    /// Values of one column in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        if !self.has_column(column) {
            return None;
        }
        Some(self.rows.iter().filter_map(|row| row.get(column)).collect())
    }

    /// Cells of a row in column order.
    pub fn row_values(&self, row: usize) -> Option<Vec<&Value>> {
        let cells = self.rows.get(row)?;
        Some(self.columns.iter().filter_map(|col| cells.get(col)).collect())
    }

    /// Number of distinct values in a column.
    pub fn distinct_count(&self, column: &str) -> usize {
        self.rows
            .iter()
            .filter_map(|row| row.get(column))
            .map(Value::group_key)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Render as a pipe-delimited grid for prompts and terminals.
    pub fn render_pipe(&self) -> String {
        self.render_pipe_limited(None)
    }

    pub fn render_pipe_limited(&self, max_rows: Option<usize>) -> String {
        if self.rows.is_empty() {
            return "Empty table".to_string();
        }
        let header = self.columns.join(" | ");
        let mut lines = vec![header.clone(), "-".repeat(header.len())];
        let limit = max_rows.unwrap_or(self.rows.len());
        for idx in 0..self.rows.len().min(limit) {
            let cells = self.row_values(idx).unwrap_or_default();
            lines.push(
                cells
                    .iter()
                    .map(|value| value.to_string())
                    .collect::<Vec<_>>()
                    .join(" | "),
            );
        }
        if self.rows.len() > limit {
            lines.push(format!("... ({} more rows)", self.rows.len() - limit));
        }
        lines.join("\n")
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_pipe())
    }
}

fn check_columns(columns: &[String]) -> Result<(), TableError> {
    let mut seen = BTreeSet::new();
    for col in columns {
        if col.trim().is_empty() {
            return Err(TableError::EmptyColumnName);
        }
        if !seen.insert(col.as_str()) {
            return Err(TableError::DuplicateColumnName(col.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cyclists() -> Table {
        Table::from_grid(
            ["Rank", "Cyclist"],
            vec![
                vec![Value::int(1), Value::text("Alejandro (ESP)")],
                vec![Value::int(2), Value::text("Davide (ITA)")],
            ],
        )
        .expect("valid table")
    }

    #[test]
    fn rejects_duplicate_and_empty_columns() {
        let err = Table::from_grid(["A", "A"], Vec::new()).unwrap_err();
        assert_eq!(err, TableError::DuplicateColumnName("A".to_string()));
        let err = Table::from_grid(["A", " "], Vec::new()).unwrap_err();
        assert_eq!(err, TableError::EmptyColumnName);
    }

    #[test]
    fn rejects_rows_with_missing_or_extra_keys() {
        let mut row = Row::new();
        row.insert("A".to_string(), Value::int(1));
        row.insert("B".to_string(), Value::int(2));
        let err = Table::new(vec!["A".to_string()], vec![row]).unwrap_err();
        assert!(matches!(err, TableError::RowShape { row: 1, .. }));
    }

    #[test]
    fn render_pipe_keeps_column_order() {
        let rendered = cyclists().render_pipe();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Rank | Cyclist");
        assert_eq!(lines[2], "1 | Alejandro (ESP)");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn empty_table_renders_placeholder() {
        let table = Table::from_grid(["A"], Vec::new()).unwrap();
        assert_eq!(table.render_pipe(), "Empty table");
    }

    #[test]
    fn compare_orders_numbers_before_text() {
        assert_eq!(Value::int(2).compare(&Value::int(10)), Ordering::Less);
        assert_eq!(Value::text("10").compare(&Value::int(9)), Ordering::Greater);
        assert_eq!(Value::int(3).compare(&Value::text("abc")), Ordering::Less);
        assert_eq!(Value::text("b").compare(&Value::text("a")), Ordering::Greater);
    }

    #[test]
    fn deserialize_validates_shape() {
        let ok: Table =
            serde_json::from_str(r#"{"columns":["A"],"rows":[{"A":1}]}"#).expect("parse");
        assert_eq!(ok.row_count(), 1);
        let bad = serde_json::from_str::<Table>(r#"{"columns":["A"],"rows":[{"B":1}]}"#);
        assert!(bad.is_err());
    }
}
