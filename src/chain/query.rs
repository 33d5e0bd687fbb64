//! Answer extraction from the final table.
use super::heuristics::{self, Direction};
use super::plan::history_line;
use crate::lm::grammar::{last_nonempty_line, strip_code_fences, tagged_value, unquote};
use crate::lm::{CallSite, Collaborator};
use crate::ops::Operation;
use crate::table::Table;

const QUERY_TEMPLATE: &str = include_str!("../../prompts/query.md");

/// Reply for a table with no rows.
pub const NO_ANSWER: &str = "Cannot be determined";

/// Ask the collaborator for the answer; extract it deterministically otherwise.
pub fn answer(
    collaborator: &mut Collaborator<'_>,
    table: &Table,
    question: &str,
    applied: &[Operation],
    step: usize,
) -> String {
    if collaborator.is_enabled() {
        let prompt = QUERY_TEMPLATE
            .replace("{table}", &table.render_pipe())
            .replace("{history}", &history_line(applied))
            .replace("{question}", question);
        if let Some(reply) = collaborator.ask(CallSite::Answer, step, &prompt) {
            if let Some(text) = parse_answer_reply(&reply) {
                return text;
            }
            tracing::debug!("answer reply empty");
        }
    }
    extract_answer(table, question)
}

/// Text after `ANSWER:`, else the last non-empty line.
pub fn parse_answer_reply(reply: &str) -> Option<String> {
    let cleaned = strip_code_fences(reply);
    let text = tagged_value(&cleaned, "ANSWER:")
        .or_else(|| last_nonempty_line(&cleaned).map(str::to_string))?;
    let text = unquote(&text);
    (!text.is_empty()).then(|| text.to_string())
}

/// Deterministic extraction that mirrors the answer-availability check.
///
/// One row: its cells joined. A count column: the other cells of the row at
/// the extreme the question asks for (maximum by default, earliest row on
/// ties). Otherwise the first cell of the first row.
pub fn extract_answer(table: &Table, question: &str) -> String {
    if table.row_count() == 0 || table.column_count() == 0 {
        return NO_ANSWER.to_string();
    }
    if table.row_count() == 1 {
        return join_row(table, 0, None);
    }
    if let Some(count_column) = heuristics::count_column(table) {
        let direction = heuristics::superlative(question).unwrap_or(Direction::Most);
        if let Some(row) = heuristics::first_extreme(table, &count_column, direction) {
            return join_row(table, row, Some(&count_column));
        }
    }
    table
        .row_values(0)
        .and_then(|values| values.first().map(|value| value.to_string()))
        .unwrap_or_else(|| NO_ANSWER.to_string())
}

fn join_row(table: &Table, row: usize, skip: Option<&str>) -> String {
    table
        .columns()
        .iter()
        .filter(|column| Some(column.as_str()) != skip)
        .filter_map(|column| table.cell(row, column))
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::testing::ScriptedGenerator;
    use crate::table::Value;

    fn counts(rows: &[(&str, i64)]) -> Table {
        Table::from_grid(
            ["Country", "Count"],
            rows.iter()
                .map(|(name, count)| vec![Value::text(*name), Value::int(*count)])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn count_table_reports_the_max_row() {
        let table = counts(&[("ESP", 1), ("ITA", 2)]);
        assert_eq!(
            extract_answer(&table, "What country has the most cyclists?"),
            "ITA"
        );
        assert_eq!(
            extract_answer(&table, "What country has the fewest cyclists?"),
            "ESP"
        );
    }

    #[test]
    fn count_ties_go_to_the_first_row() {
        let table = counts(&[("ESP", 2), ("ITA", 2)]);
        assert_eq!(extract_answer(&table, "Which is most common?"), "ESP");
    }

    #[test]
    fn single_row_joins_cells() {
        let table = Table::from_grid(
            ["Name", "Points"],
            vec![vec![Value::text("b"), Value::int(9)]],
        )
        .unwrap();
        assert_eq!(extract_answer(&table, "Who won?"), "b, 9");
    }

    #[test]
    fn other_tables_use_first_cell() {
        let table = Table::from_grid(
            ["Name", "Points"],
            vec![
                vec![Value::text("a"), Value::int(3)],
                vec![Value::text("b"), Value::int(9)],
            ],
        )
        .unwrap();
        assert_eq!(extract_answer(&table, "Who?"), "a");
        let empty = Table::from_grid(["Name"], Vec::new()).unwrap();
        assert_eq!(extract_answer(&empty, "Who?"), NO_ANSWER);
    }

    #[test]
    fn parses_answer_replies() {
        assert_eq!(
            parse_answer_reply("-> ITA has 2\nANSWER: ITA").as_deref(),
            Some("ITA")
        );
        assert_eq!(parse_answer_reply("\"Italy\"\n").as_deref(), Some("Italy"));
        assert_eq!(parse_answer_reply("   \n"), None);
    }

    #[test]
    fn collaborator_answer_wins_over_extraction() {
        let generator = ScriptedGenerator::new([("FINAL TABLE", "ANSWER: Italy")]);
        let mut collaborator = Collaborator::new(Some(&generator));
        let table = counts(&[("ESP", 1), ("ITA", 2)]);
        let text = answer(&mut collaborator, &table, "Most?", &[], 3);
        assert_eq!(text, "Italy");
    }
}
