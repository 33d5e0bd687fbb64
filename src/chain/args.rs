//! Argument generation for a chosen operation kind.
//!
//! Collaborator replies go through a strict per-kind grammar. A reply that
//! does not fit falls back to the keyword rules. Either way the result is
//! re-checked by the validator before it runs.
use super::heuristics::{self, Direction};
use crate::lm::grammar::{
    leading_json, literal_line, single_line, strip_code_fences, tagged_value, unquote,
};
use crate::lm::{CallSite, Collaborator};
use crate::ops::{Operation, OperationKind};
use crate::table::{Table, Value};
use regex::Regex;

const ARGS_TEMPLATE: &str = include_str!("../../prompts/args.md");

/// Name used when the derived attribute has no better label.
const DERIVED_COLUMN: &str = "Derived";
/// Count column name used when the configured one collides with the group column.
const ALTERNATE_COUNT_COLUMN: &str = "Frequency";

pub struct ArgsContext<'a> {
    pub table: &'a Table,
    pub question: &'a str,
    pub kind: OperationKind,
    pub count_column: &'a str,
    /// Rejections earlier in this step, shown to the collaborator.
    pub feedback: &'a [String],
    pub step: usize,
}

pub fn generate_arguments(collaborator: &mut Collaborator<'_>, ctx: &ArgsContext<'_>) -> Operation {
    if collaborator.is_enabled() {
        let prompt = build_args_prompt(ctx);
        if let Some(reply) = collaborator.ask(CallSite::Args, ctx.step, &prompt) {
            match parse_arguments(ctx.kind, &reply, ctx.count_column) {
                Some(operation) => return operation,
                None => tracing::debug!(kind = %ctx.kind, "argument reply unparseable"),
            }
        }
    }
    let operation = fallback_arguments(ctx);
    tracing::debug!(step = ctx.step, %operation, "fallback arguments");
    operation
}

fn build_args_prompt(ctx: &ArgsContext<'_>) -> String {
    let rejection = if ctx.feedback.is_empty() {
        String::new()
    } else {
        format!("PREVIOUS ATTEMPTS REJECTED:\n{}\n\n", ctx.feedback.join("\n"))
    };
    ARGS_TEMPLATE
        .replace("{table}", &ctx.table.render_pipe())
        .replace("{columns}", &ctx.table.columns().join(", "))
        .replace("{question}", ctx.question)
        .replace("{operation}", ctx.kind.keyword())
        .replace("{description}", ctx.kind.description())
        .replace("{shape}", ctx.kind.argument_shape())
        .replace("{example}", ctx.kind.example())
        .replace("{rejection}", &rejection)
        .replace("{row_count}", &ctx.table.row_count().to_string())
}

/// Parse an `ARGUMENTS:` reply for `kind`.
pub fn parse_arguments(kind: OperationKind, reply: &str, count_column: &str) -> Option<Operation> {
    let cleaned = strip_code_fences(reply);
    let raw = tagged_value(&cleaned, "ARGUMENTS:")
        .or_else(|| single_line(&cleaned).map(str::to_string))
        .or_else(|| literal_line(&cleaned).map(str::to_string))?;
    let raw = raw.trim().trim_end_matches(';').trim();
    match kind {
        OperationKind::AddColumn => parse_add_column(raw),
        OperationKind::SelectRow => parse_select_row(raw),
        OperationKind::SelectColumn => parse_select_column(raw),
        OperationKind::GroupBy => parse_group_by(raw, count_column),
        OperationKind::SortBy => parse_sort_by(raw),
    }
}

fn parse_add_column(raw: &str) -> Option<Operation> {
    let serde_json::Value::Array(items) = leading_json(raw)? else {
        return None;
    };
    let name = items.first()?.as_str()?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let serde_json::Value::Array(cells) = items.get(1)? else {
        return None;
    };
    let values = cells.iter().map(scalar).collect::<Option<Vec<_>>>()?;
    let default = match items.get(2) {
        Some(cell) => scalar(cell)?,
        None => Value::text(""),
    };
    Some(Operation::AddColumn {
        name,
        values: Some(values),
        default,
    })
}

fn scalar(cell: &serde_json::Value) -> Option<Value> {
    match cell {
        serde_json::Value::Number(number) => Some(Value::Number(number.clone())),
        serde_json::Value::String(text) => Some(Value::text(text.clone())),
        serde_json::Value::Bool(flag) => Some(Value::text(flag.to_string())),
        serde_json::Value::Null => Some(Value::text("")),
        _ => None,
    }
}

fn parse_select_row(raw: &str) -> Option<Operation> {
    let pattern = Regex::new(r"\d+").expect("regex for row numbers");
    let indices = pattern
        .find_iter(raw)
        .map(|m| m.as_str().parse::<usize>().ok())
        .collect::<Option<Vec<_>>>()?;
    (!indices.is_empty()).then(|| Operation::select_row(indices))
}

fn parse_select_column(raw: &str) -> Option<Operation> {
    if let Some(serde_json::Value::Array(items)) = leading_json(raw) {
        let names = items
            .iter()
            .map(|item| item.as_str().map(|name| name.trim().to_string()))
            .collect::<Option<Vec<_>>>()?;
        return (!names.is_empty()).then(|| Operation::select_column(names));
    }
    bare_name(raw).map(|name| Operation::select_column([name]))
}

fn parse_group_by(raw: &str, count_column: &str) -> Option<Operation> {
    if let Some(serde_json::Value::Array(items)) = leading_json(raw) {
        let column = items.first()?.as_str()?.trim().to_string();
        let count = match items.get(1) {
            Some(item) => item.as_str()?.trim().to_string(),
            None => count_column.to_string(),
        };
        return Some(Operation::GroupBy {
            column,
            count_column: count,
        });
    }
    bare_name(raw).map(|column| Operation::GroupBy {
        column,
        count_column: count_column.to_string(),
    })
}

fn parse_sort_by(raw: &str) -> Option<Operation> {
    if let Some(serde_json::Value::Array(items)) = leading_json(raw) {
        let column = items.first()?.as_str()?.trim().to_string();
        let ascending = match items.get(1) {
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(word)) => direction_word(word)?,
            None => true,
            Some(_) => return None,
        };
        return Some(Operation::sort_by(column, ascending));
    }
    let text = unquote(raw);
    let lower = text.to_lowercase();
    for word in ["descending", "desc", "false", "ascending", "asc", "true"] {
        let Some(head) = lower.strip_suffix(word) else {
            continue;
        };
        if !head.ends_with([' ', ',']) {
            continue;
        }
        let column = unquote(text.get(..head.len())?.trim_end().trim_end_matches(','));
        let ascending = direction_word(word)?;
        return (!column.is_empty()).then(|| Operation::sort_by(column, ascending));
    }
    bare_name(raw).map(|column| Operation::sort_by(column, true))
}

fn direction_word(word: &str) -> Option<bool> {
    match word.trim().to_lowercase().as_str() {
        "asc" | "ascending" | "true" => Some(true),
        "desc" | "descending" | "false" => Some(false),
        _ => None,
    }
}

/// A single column name, bare or quoted; JSON-looking text is refused.
fn bare_name(raw: &str) -> Option<String> {
    let name = unquote(raw);
    if name.is_empty() || name.starts_with(['[', '{']) || name.contains('\n') {
        return None;
    }
    Some(name.to_string())
}

/// Deterministic arguments for `ctx.kind`.
pub fn fallback_arguments(ctx: &ArgsContext<'_>) -> Operation {
    let table = ctx.table;
    let question = ctx.question;
    match ctx.kind {
        OperationKind::AddColumn => fallback_add_column(table, question),
        OperationKind::SelectRow => {
            let rows = table.row_count();
            let take = match heuristics::row_limit(question) {
                Some(limit) => limit.min(rows),
                None if heuristics::superlative(question).is_some() => rows.min(1),
                None => rows,
            };
            Operation::select_row((1..=take).collect())
        }
        OperationKind::SelectColumn => Operation::select_column(table.columns().to_vec()),
        OperationKind::GroupBy => {
            let column = group_column(table, question);
            let count_column = if column == ctx.count_column {
                ALTERNATE_COUNT_COLUMN.to_string()
            } else {
                ctx.count_column.to_string()
            };
            Operation::GroupBy {
                column,
                count_column,
            }
        }
        OperationKind::SortBy => {
            let column = sort_column(table, question);
            let ascending = !matches!(heuristics::superlative(question), Some(Direction::Most));
            Operation::sort_by(column, ascending)
        }
    }
}

fn fallback_add_column(table: &Table, question: &str) -> Operation {
    let name = heuristics::missing_attribute(question, table)
        .map(|word| heuristics::title_case(&word))
        .unwrap_or_else(|| DERIVED_COLUMN.to_string());
    match heuristics::derived_tokens(table) {
        Some((_, tokens)) => Operation::add_column(
            name,
            tokens
                .into_iter()
                .map(|token| Value::text(token.unwrap_or_default()))
                .collect(),
        ),
        None => Operation::add_column_with_default(name, Value::text("")),
    }
}

fn group_column(table: &Table, question: &str) -> String {
    heuristics::nearest_mention(question, table, |column| {
        heuristics::has_repeats(table, column)
    })
    .or_else(|| heuristics::nearest_mention(question, table, |_| true))
    .or_else(|| {
        table
            .columns()
            .iter()
            .find(|column| heuristics::has_repeats(table, column))
            .cloned()
    })
    .or_else(|| table.columns().first().cloned())
    .unwrap_or_default()
}

fn sort_column(table: &Table, question: &str) -> String {
    heuristics::nearest_mention(question, table, |column| {
        heuristics::is_numeric_column(table, column)
    })
    .or_else(|| heuristics::count_column(table))
    .or_else(|| heuristics::nearest_mention(question, table, |_| true))
    .or_else(|| {
        table
            .columns()
            .iter()
            .find(|column| heuristics::is_numeric_column(table, column))
            .cloned()
    })
    .or_else(|| table.columns().first().cloned())
    .unwrap_or_default()
}
