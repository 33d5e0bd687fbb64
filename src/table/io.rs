//! Loading, saving, and sanity-checking tables on disk.
//!
//! JSON tables are either an array of row objects (column order follows the
//! first row's key order) or the `{columns, rows}` form this crate writes.
//! CSV cells are parsed as integers, then floats, and otherwise kept as text.
use super::{Row, Table, Value};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Counts reported by [`validate_table_format`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub rows: usize,
    pub columns: usize,
    pub blank_cells: usize,
}

/// Non-fatal observations about a loaded table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableReport {
    pub stats: TableStats,
    pub warnings: Vec<String>,
}

/// Load a `.json` or `.csv` table, chosen by extension.
pub fn load_table(path: &Path) -> Result<Table> {
    let ext = extension(path);
    match ext.as_str() {
        "json" => {
            let text =
                fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            parse_json_table(&text).with_context(|| format!("parse table {}", path.display()))
        }
        "csv" => {
            let reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_path(path)
                .with_context(|| format!("open {}", path.display()))?;
            read_csv_table(reader).with_context(|| format!("parse table {}", path.display()))
        }
        other => Err(anyhow!(
            "unsupported table format {other:?} for {} (use .json or .csv)",
            path.display()
        )),
    }
}

/// Parse a JSON table from text.
pub fn parse_json_table(text: &str) -> Result<Table> {
    let raw: serde_json::Value = serde_json::from_str(text).context("parse table JSON")?;
    if raw.is_object() && raw.get("columns").is_some() {
        return serde_json::from_value(raw).context("parse {columns, rows} table");
    }
    match raw {
        serde_json::Value::Array(items) => table_from_records(items),
        _ => Err(anyhow!(
            "table JSON must be an array of row objects or a {{columns, rows}} object"
        )),
    }
}

/// Parse CSV text; the header row names the columns.
pub fn parse_csv_table(text: &str) -> Result<Table> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    read_csv_table(reader)
}

fn read_csv_table<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Table> {
    let columns: Vec<String> = reader
        .headers()
        .context("read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    let mut grid = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("read CSV record {}", idx + 1))?;
        grid.push(record.iter().map(parse_csv_cell).collect());
    }
    Ok(Table::from_grid(columns, grid)?)
}

fn parse_csv_cell(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::int(int);
    }
    if raw.contains('.') {
        if let Ok(float) = raw.parse::<f64>() {
            if float.is_finite() {
                return Value::float(float);
            }
        }
    }
    Value::text(raw)
}

fn table_from_records(items: Vec<serde_json::Value>) -> Result<Table> {
    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let serde_json::Value::Object(map) = item else {
            return Err(anyhow!("row {} is not a JSON object", idx + 1));
        };
        if columns.is_none() {
            columns = Some(map.keys().cloned().collect());
        }
        let mut row = Row::new();
        for (key, cell) in map {
            let value = cell_from_json(cell)
                .with_context(|| format!("row {} column {key:?}", idx + 1))?;
            row.insert(key, value);
        }
        rows.push(row);
    }
    Ok(Table::new(columns.unwrap_or_default(), rows)?)
}

fn cell_from_json(cell: serde_json::Value) -> Result<Value> {
    match cell {
        serde_json::Value::Number(number) => Ok(Value::Number(number)),
        serde_json::Value::String(text) => Ok(Value::Text(text)),
        serde_json::Value::Bool(flag) => Ok(Value::text(flag.to_string())),
        serde_json::Value::Null => Ok(Value::text("")),
        other => Err(anyhow!("cells must be scalars (got {other})")),
    }
}

fn cell_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Number(number) => serde_json::Value::Number(number.clone()),
        Value::Text(text) => serde_json::Value::String(text.clone()),
    }
}

/// Rows as JSON objects in column order.
pub fn table_to_records(table: &Table) -> Vec<serde_json::Value> {
    table
        .rows()
        .iter()
        .map(|row| {
            let mut map = serde_json::Map::new();
            for col in table.columns() {
                if let Some(value) = row.get(col) {
                    map.insert(col.clone(), cell_to_json(value));
                }
            }
            serde_json::Value::Object(map)
        })
        .collect()
}

/// Save a table as `.json` (array of row objects) or `.csv`.
pub fn save_table(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    match extension(path).as_str() {
        "json" => {
            let text = serde_json::to_string_pretty(&table_to_records(table))
                .context("serialize table")?;
            fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))
        }
        "csv" => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("create {}", path.display()))?;
            writer.write_record(table.columns()).context("write CSV header")?;
            for idx in 0..table.row_count() {
                let cells: Vec<String> = table
                    .row_values(idx)
                    .unwrap_or_default()
                    .iter()
                    .map(|value| value.to_string())
                    .collect();
                writer.write_record(&cells).context("write CSV record")?;
            }
            writer.flush().context("flush CSV")?;
            Ok(())
        }
        other => Err(anyhow!(
            "unsupported table format {other:?} for {} (use .json or .csv)",
            path.display()
        )),
    }
}

/// Collect stats and warnings for a loaded table.
pub fn validate_table_format(table: &Table) -> TableReport {
    let blank_cells = table
        .rows()
        .iter()
        .flat_map(|row| row.values())
        .filter(|value| value.is_blank())
        .count();
    let mut warnings = Vec::new();
    if table.is_empty() {
        warnings.push("table has no rows".to_string());
    }
    if blank_cells > 0 {
        warnings.push(format!("{blank_cells} blank cells"));
    }
    TableReport {
        stats: TableStats {
            rows: table.row_count(),
            columns: table.column_count(),
            blank_cells,
        },
        warnings,
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_records_keep_first_row_key_order() {
        let table = parse_json_table(
            r#"[{"Rank": 1, "Cyclist": "Alejandro (ESP)"}, {"Rank": 2, "Cyclist": "Davide (ITA)"}]"#,
        )
        .expect("parse");
        assert_eq!(table.columns(), ["Rank", "Cyclist"]);
        assert_eq!(table.cell(1, "Rank"), Some(&Value::int(2)));
    }

    #[test]
    fn json_records_with_mismatched_keys_fail() {
        let err = parse_json_table(r#"[{"A": 1}, {"B": 2}]"#).unwrap_err();
        assert!(err.to_string().contains("row 2"), "{err}");
    }

    #[test]
    fn json_nested_cells_fail() {
        assert!(parse_json_table(r#"[{"A": [1, 2]}]"#).is_err());
    }

    #[test]
    fn csv_cells_parse_numbers() {
        let table = parse_csv_table("Name,Age,Score\nAlice, 25 ,1.5\nBob,x,2\n").expect("parse");
        assert_eq!(table.cell(0, "Age"), Some(&Value::int(25)));
        assert_eq!(table.cell(0, "Score"), Some(&Value::float(1.5)));
        assert_eq!(table.cell(1, "Age"), Some(&Value::text("x")));
    }

    #[test]
    fn save_and_reload_csv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.csv");
        let table = parse_csv_table("A,B\n1,x\n2,y\n").expect("parse");
        save_table(&table, &path).expect("save");
        let reloaded = load_table(&path).expect("load");
        assert_eq!(reloaded, table);
    }

    #[test]
    fn report_counts_blank_cells() {
        let table = parse_json_table(r#"[{"A": "", "B": null}, {"A": "x", "B": 1}]"#).unwrap();
        let report = validate_table_format(&table);
        assert_eq!(report.stats.blank_cells, 2);
        assert_eq!(report.warnings.len(), 1);
    }
}
