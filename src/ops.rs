//! The atomic operation catalog.
//!
//! Five closed operation kinds, each a pure `Table × Args → Table` handler.
//! The validator pre-checks the same conditions, so in a normal run these
//! guards never fire; they keep the catalog total on its own.
use crate::error::ChainError;
use crate::table::{Row, Table, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default name of the count column produced by `f_group_by`.
pub const DEFAULT_COUNT_COLUMN: &str = "Count";

/// The five operation kinds. Adding a sixth is a deliberate extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "f_add_column")]
    AddColumn,
    #[serde(rename = "f_select_row")]
    SelectRow,
    #[serde(rename = "f_select_column")]
    SelectColumn,
    #[serde(rename = "f_group_by")]
    GroupBy,
    #[serde(rename = "f_sort_by")]
    SortBy,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::AddColumn,
        OperationKind::SelectRow,
        OperationKind::SelectColumn,
        OperationKind::GroupBy,
        OperationKind::SortBy,
    ];

    /// Keyword used in prompts, chain summaries, and LM replies.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::AddColumn => "f_add_column",
            Self::SelectRow => "f_select_row",
            Self::SelectColumn => "f_select_column",
            Self::GroupBy => "f_group_by",
            Self::SortBy => "f_sort_by",
        }
    }

    /// Accepts `f_group_by`, `group_by`, and `GroupBy` spellings.
    pub fn from_keyword(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .trim_start_matches("f_")
            .chars()
            .filter(|ch| *ch != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "addcolumn" => Some(Self::AddColumn),
            "selectrow" => Some(Self::SelectRow),
            "selectcolumn" => Some(Self::SelectColumn),
            "groupby" => Some(Self::GroupBy),
            "sortby" => Some(Self::SortBy),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::AddColumn => "Adds a new column to the table",
            Self::SelectRow => "Selects specific rows by index (1-indexed)",
            Self::SelectColumn => "Selects specific columns",
            Self::GroupBy => "Groups rows by a column and counts elements",
            Self::SortBy => "Sorts rows by a column",
        }
    }

    pub fn argument_shape(self) -> &'static str {
        match self {
            Self::AddColumn => "[column_name, [values_for_each_row]]",
            Self::SelectRow => "[row_numbers]",
            Self::SelectColumn => "[column_names]",
            Self::GroupBy => "column_name",
            Self::SortBy => "[column_name, ascending]",
        }
    }

    pub fn example(self) -> &'static str {
        match self {
            Self::AddColumn => r#"f_add_column(["Country", ["ESP", "ITA", "ITA"]])"#,
            Self::SelectRow => "f_select_row([1, 2, 3])",
            Self::SelectColumn => r#"f_select_column(["Name", "Country"])"#,
            Self::GroupBy => "f_group_by(Country)",
            Self::SortBy => r#"f_sort_by(["Rank", false])"#,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

fn blank_value() -> Value {
    Value::text("")
}

fn default_count_column() -> String {
    DEFAULT_COUNT_COLUMN.to_string()
}

fn default_ascending() -> bool {
    true
}

/// A concrete operation: kind plus arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "arguments")]
pub enum Operation {
    #[serde(rename = "f_add_column")]
    AddColumn {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        values: Option<Vec<Value>>,
        #[serde(default = "blank_value")]
        default: Value,
    },
    #[serde(rename = "f_select_row")]
    SelectRow { indices: Vec<usize> },
    #[serde(rename = "f_select_column")]
    SelectColumn { names: Vec<String> },
    #[serde(rename = "f_group_by")]
    GroupBy {
        column: String,
        #[serde(default = "default_count_column")]
        count_column: String,
    },
    #[serde(rename = "f_sort_by")]
    SortBy {
        column: String,
        #[serde(default = "default_ascending")]
        ascending: bool,
    },
}

impl Operation {
    pub fn add_column(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self::AddColumn {
            name: name.into(),
            values: Some(values),
            default: blank_value(),
        }
    }

    pub fn add_column_with_default(name: impl Into<String>, default: Value) -> Self {
        Self::AddColumn {
            name: name.into(),
            values: None,
            default,
        }
    }

    pub fn select_row(indices: Vec<usize>) -> Self {
        Self::SelectRow { indices }
    }

    pub fn select_column<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::SelectColumn {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn group_by(column: impl Into<String>) -> Self {
        Self::GroupBy {
            column: column.into(),
            count_column: default_count_column(),
        }
    }

    pub fn sort_by(column: impl Into<String>, ascending: bool) -> Self {
        Self::SortBy {
            column: column.into(),
            ascending,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::AddColumn { .. } => OperationKind::AddColumn,
            Self::SelectRow { .. } => OperationKind::SelectRow,
            Self::SelectColumn { .. } => OperationKind::SelectColumn,
            Self::GroupBy { .. } => OperationKind::GroupBy,
            Self::SortBy { .. } => OperationKind::SortBy,
        }
    }

    /// Apply to `table`, producing a new table or a typed rejection.
    pub fn apply(&self, table: &Table) -> Result<Table, ChainError> {
        match self {
            Self::AddColumn {
                name,
                values,
                default,
            } => add_column(table, name, values.as_deref(), default),
            Self::SelectRow { indices } => select_row(table, indices),
            Self::SelectColumn { names } => select_column(table, names),
            Self::GroupBy {
                column,
                count_column,
            } => group_by(table, column, count_column),
            Self::SortBy { column, ascending } => sort_by(table, column, *ascending),
        }
    }

    /// Argument list as shown in chain summaries, e.g. `Country` or `[1, 2, 3]`.
    /// Added column values are left out; the step's table shows them.
    pub fn arguments_display(&self) -> String {
        match self {
            Self::AddColumn { name, .. } => name.clone(),
            Self::SelectRow { indices } => format!(
                "[{}]",
                indices
                    .iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::SelectColumn { names } => format!("[{}]", names.join(", ")),
            Self::GroupBy {
                column,
                count_column,
            } => {
                if count_column == DEFAULT_COUNT_COLUMN {
                    column.clone()
                } else {
                    format!("{column}, {count_column}")
                }
            }
            Self::SortBy { column, ascending } => {
                format!("{column}, {}", if *ascending { "asc" } else { "desc" })
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.arguments_display())
    }
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

/// Append a column, filled from `values` or with `default`.
pub fn add_column(
    table: &Table,
    name: &str,
    values: Option<&[Value]>,
    default: &Value,
) -> Result<Table, ChainError> {
    if name.trim().is_empty() {
        return Err(ChainError::ArgumentShape {
            detail: "new column name must be non-empty".to_string(),
        });
    }
    if table.has_column(name) {
        return Err(ChainError::DuplicateColumn {
            name: name.to_string(),
        });
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
    let mut columns = table.columns().to_vec();
    columns.push(name.to_string());
    let rows = table
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut row = row.clone();
            let value = values
                .and_then(|values| values.get(idx))
                .unwrap_or(default)
                .clone();
            row.insert(name.to_string(), value);
            row
        })
        .collect();
    Ok(Table::from_parts(columns, rows))
}

/// Keep the rows at the given 1-based positions, in the given order.
pub fn select_row(table: &Table, indices: &[usize]) -> Result<Table, ChainError> {
    let row_count = table.row_count();
    let mut rows = Vec::with_capacity(indices.len());
    for &index in indices {
        if index == 0 || index > row_count {
            return Err(ChainError::InvalidRowRange { index, row_count });
        }
        rows.push(table.rows()[index - 1].clone());
    }
    Ok(Table::from_parts(table.columns().to_vec(), rows))
}

/// Keep the named columns, ordered as given.
pub fn select_column(table: &Table, names: &[String]) -> Result<Table, ChainError> {
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
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            names
                .iter()
                .filter_map(|name| row.get(name).map(|value| (name.clone(), value.clone())))
                .collect::<Row>()
        })
        .collect();
    Ok(Table::from_parts(names.to_vec(), rows))
}

/// One row per distinct value of `column` (first-seen order) with its count.
///
/// When `count_column` equals `column`, the grouped value is the first
/// occurrence of that name and stays authoritative: no count column is emitted.
pub fn group_by(table: &Table, column: &str, count_column: &str) -> Result<Table, ChainError> {
    require_column(table, column)?;
    if count_column.trim().is_empty() {
        return Err(ChainError::ArgumentShape {
            detail: "count column name must be non-empty".to_string(),
        });
    }
    let mut positions: BTreeMap<(u8, String), usize> = BTreeMap::new();
    let mut groups: Vec<(Value, usize)> = Vec::new();
    for row in table.rows() {
        let Some(value) = row.get(column) else {
            continue;
        };
        match positions.get(&value.group_key()) {
            Some(&pos) => groups[pos].1 += 1,
            None => {
                positions.insert(value.group_key(), groups.len());
                groups.push((value.clone(), 1));
            }
        }
    }

    let emit_count = count_column != column;
    let mut columns = vec![column.to_string()];
    if emit_count {
        columns.push(count_column.to_string());
    }
    let rows = groups
        .into_iter()
        .map(|(value, count)| {
            let mut row = Row::new();
            row.insert(column.to_string(), value);
            if emit_count {
                row.insert(count_column.to_string(), Value::from(count));
            }
            row
        })
        .collect();
    Ok(Table::from_parts(columns, rows))
}

/// Stable sort by `column`; descending reverses the comparison, not tie order.
pub fn sort_by(table: &Table, column: &str, ascending: bool) -> Result<Table, ChainError> {
    require_column(table, column)?;
    let mut rows = table.rows().to_vec();
    rows.sort_by(|left, right| {
        let ordering = match (left.get(column), right.get(column)) {
            (Some(left), Some(right)) => left.compare(right),
            _ => std::cmp::Ordering::Equal,
        };
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
    Ok(Table::from_parts(table.columns().to_vec(), rows))
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
