//! Planner: choose the next operation kind or stop.
use super::heuristics;
use crate::lm::grammar::{last_nonempty_line, tagged_value};
use crate::lm::{CallSite, Collaborator};
use crate::ops::{Operation, OperationKind};
use crate::table::Table;
use std::collections::BTreeSet;

const PLAN_TEMPLATE: &str = include_str!("../../prompts/plan.md");

/// Tokens a collaborator may use to end the chain.
const END_TOKENS: &[&str] = &["[E]", "E", "END", "STOP", "<END>"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDecision {
    Apply(OperationKind),
    Stop,
}

/// What the planner sees at one step.
pub struct PlanContext<'a> {
    pub table: &'a Table,
    pub question: &'a str,
    /// Operations applied so far, in order.
    pub applied: &'a [Operation],
    pub excluded: &'a BTreeSet<OperationKind>,
    /// One line per rejected attempt in the current step.
    pub feedback: &'a [String],
    pub step: usize,
}

impl PlanContext<'_> {
    fn allowed(&self, kind: OperationKind) -> bool {
        !self.excluded.contains(&kind)
    }

    fn candidates(&self) -> Vec<OperationKind> {
        OperationKind::ALL
            .into_iter()
            .filter(|kind| self.allowed(*kind))
            .collect()
    }
}

/// Ask the collaborator for the next kind, falling back to the keyword rules.
pub fn plan(collaborator: &mut Collaborator<'_>, ctx: &PlanContext<'_>) -> PlanDecision {
    if ctx.candidates().is_empty() {
        tracing::debug!(step = ctx.step, "every operation kind excluded");
        return PlanDecision::Stop;
    }
    if collaborator.is_enabled() {
        let prompt = build_plan_prompt(ctx);
        if let Some(reply) = collaborator.ask(CallSite::Plan, ctx.step, &prompt) {
            match parse_plan_reply(&reply) {
                Some(PlanDecision::Apply(kind)) if !ctx.allowed(kind) => {
                    tracing::debug!(%kind, "collaborator chose an excluded kind");
                }
                Some(decision) => return decision,
                None => tracing::debug!("plan reply unparseable"),
            }
        }
    }
    let decision = fallback_plan(ctx);
    tracing::debug!(step = ctx.step, ?decision, "fallback plan");
    decision
}

/// Parse `OPERATION: f_kind` (or the last line) into a decision.
pub fn parse_plan_reply(reply: &str) -> Option<PlanDecision> {
    let line = tagged_value(reply, "OPERATION:")
        .or_else(|| last_nonempty_line(reply).map(str::to_string))?;
    let token = line
        .split(|ch: char| ch.is_whitespace() || ch == '(' || ch == ',')
        .find(|part| !part.is_empty())?
        .trim_matches(|ch: char| ch == '`' || ch == '"' || ch == '\'' || ch == '.');
    if END_TOKENS
        .iter()
        .any(|end| end.eq_ignore_ascii_case(token))
    {
        return Some(PlanDecision::Stop);
    }
    OperationKind::from_keyword(token).map(PlanDecision::Apply)
}

/// Keyword rules in preference order; excluded kinds are skipped.
pub fn fallback_plan(ctx: &PlanContext<'_>) -> PlanDecision {
    let table = ctx.table;
    let question = ctx.question;
    let direction = heuristics::superlative(question);
    let limit = heuristics::row_limit(question);
    let last_kind = ctx.applied.last().map(Operation::kind);

    if ctx.allowed(OperationKind::AddColumn)
        && heuristics::missing_attribute(question, table).is_some()
        && heuristics::derived_tokens(table).is_some()
    {
        return PlanDecision::Apply(OperationKind::AddColumn);
    }

    let narrow_to_limit = limit.is_some_and(|n| n < table.row_count());
    let take_sorted_top = limit.is_none()
        && direction.is_some()
        && last_kind == Some(OperationKind::SortBy)
        && table.row_count() > 1;
    if ctx.allowed(OperationKind::SelectRow) && (narrow_to_limit || take_sorted_top) {
        return PlanDecision::Apply(OperationKind::SelectRow);
    }

    if ctx.allowed(OperationKind::GroupBy)
        && heuristics::asks_frequency(question, table)
        && heuristics::count_column(table).is_none()
        && heuristics::column_mentions(question, table)
            .iter()
            .any(|(_, column)| heuristics::has_repeats(table, column))
    {
        return PlanDecision::Apply(OperationKind::GroupBy);
    }

    if ctx.allowed(OperationKind::SortBy)
        && direction.is_some()
        && last_kind != Some(OperationKind::SortBy)
        && table.row_count() > 1
        && has_sort_target(question, table)
    {
        return PlanDecision::Apply(OperationKind::SortBy);
    }

    PlanDecision::Stop
}

fn has_sort_target(question: &str, table: &Table) -> bool {
    heuristics::count_column(table).is_some()
        || heuristics::column_mentions(question, table)
            .iter()
            .any(|(_, column)| heuristics::is_numeric_column(table, column))
}

/// `[B], f_add_column(Country), f_select_row([1, 2, 3])`.
pub fn history_line(applied: &[Operation]) -> String {
    let mut parts = vec!["[B]".to_string()];
    parts.extend(applied.iter().map(Operation::to_string));
    parts.join(", ")
}

fn build_plan_prompt(ctx: &PlanContext<'_>) -> String {
    let candidates = ctx
        .candidates()
        .iter()
        .map(|kind| format!("{kind}: {}", kind.description()))
        .collect::<Vec<_>>()
        .join("\n");
    let rejections = if ctx.feedback.is_empty() {
        String::new()
    } else {
        format!(
            "REJECTED THIS STEP (do not repeat):\n{}\n\n",
            ctx.feedback.join("\n")
        )
    };
    PLAN_TEMPLATE
        .replace("{table}", &ctx.table.render_pipe())
        .replace("{question}", ctx.question)
        .replace("{history}", &history_line(ctx.applied))
        .replace("{candidates}", &candidates)
        .replace("{rejections}", &rejections)
}
