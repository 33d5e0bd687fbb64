//! The reasoning loop.
//!
//! A run moves the table through a chain of atomic operations until the
//! answer is available, the planner stops, or the step budget runs out.
//! All run state lives in one [`RunState`] value owned by [`Orchestrator::run`];
//! nothing is shared between runs.
//!
//! Per step:
//!
//! 1. stop if the answer-availability check fires
//! 2. ask the planner for a kind, minus the excluded kinds
//! 3. generate arguments
//! 4. reject repeats and invalid arguments; the kind joins the step's
//!    exclusion window and the planner is asked again
//! 5. otherwise apply, record, and advance the step counter
//!
//! Exclusions last for one step, except fingerprint repeats and kinds that
//! hit the per-kind rejection cap, which stay excluded for the whole run.
pub mod args;
pub mod fingerprint;
pub mod heuristics;
pub mod plan;
pub mod query;
pub mod validate;

use crate::error::{ChainError, RunError};
use crate::lm::{Collaborator, LmExchange, TextGenerator};
use crate::ops::{Operation, OperationKind, DEFAULT_COUNT_COLUMN};
use crate::table::{Row, Table};
use args::{generate_arguments, ArgsContext};
use fingerprint::Fingerprint;
use plan::{plan, PlanContext, PlanDecision};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use validate::{answer_available, check_loop, validate_operation, Rejection};

pub const DEFAULT_MAX_STEPS: usize = 10;
/// Rejections of one kind before it is excluded for the rest of the run.
pub const DEFAULT_MAX_REJECTIONS_PER_KIND: usize = 2;

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub max_steps: usize,
    pub count_column: String,
    pub max_rejections_per_kind: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            count_column: DEFAULT_COUNT_COLUMN.to_string(),
            max_rejections_per_kind: DEFAULT_MAX_REJECTIONS_PER_KIND,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    AnswerAvailable,
    ExplicitEnd,
    BudgetExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnswerAvailable => write!(f, "answer_available"),
            Self::ExplicitEnd => write!(f, "explicit_end"),
            Self::BudgetExhausted => write!(f, "budget_exhausted"),
        }
    }
}

/// One applied step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub step: usize,
    pub operation: Operation,
    pub fingerprint: Fingerprint,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: Vec<String>,
    pub columns_after: Vec<String>,
}

/// Chain entries: a begin marker, applied steps, and an end marker unless
/// the budget ran out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "marker", rename_all = "snake_case")]
pub enum ChainEntry {
    Begin,
    Step(OperationRecord),
    End,
}

impl ChainEntry {
    pub fn record(&self) -> Option<&OperationRecord> {
        match self {
            Self::Step(record) => Some(record),
            _ => None,
        }
    }
}

/// A proposal the validator refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedAttempt {
    pub step: usize,
    pub operation: Operation,
    pub code: String,
    pub error: String,
    pub suggestion: String,
    /// The kind stays excluded for the rest of the run.
    pub permanent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub question: String,
    pub answer: String,
    pub chain: Vec<ChainEntry>,
    /// The initial table followed by the table after each step.
    pub tables: Vec<Table>,
    pub final_table: Table,
    pub steps: usize,
    pub stop_reason: StopReason,
    pub max_steps: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<RejectedAttempt>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lm_exchanges: Vec<LmExchange>,
}

impl RunResult {
    pub fn records(&self) -> impl Iterator<Item = &OperationRecord> {
        self.chain.iter().filter_map(ChainEntry::record)
    }

    pub fn operations(&self) -> Vec<&Operation> {
        self.records().map(|record| &record.operation).collect()
    }

    /// The answer, or `BudgetExhausted` when the run ran out of steps.
    pub fn require_answer(&self) -> Result<&str, ChainError> {
        match self.stop_reason {
            StopReason::BudgetExhausted => Err(ChainError::BudgetExhausted {
                max_steps: self.max_steps,
            }),
            _ => Ok(&self.answer),
        }
    }
}

/// Mutable state of a single run.
struct RunState {
    table: Table,
    chain: Vec<ChainEntry>,
    tables: Vec<Table>,
    applied: Vec<Operation>,
    steps: usize,
    executed: BTreeMap<Fingerprint, usize>,
    permanent: BTreeSet<OperationKind>,
    rejection_counts: BTreeMap<OperationKind, usize>,
    rejections: Vec<RejectedAttempt>,
}

impl RunState {
    fn new(table: Table) -> Self {
        Self {
            tables: vec![table.clone()],
            table,
            chain: vec![ChainEntry::Begin],
            applied: Vec::new(),
            steps: 0,
            executed: BTreeMap::new(),
            permanent: BTreeSet::new(),
            rejection_counts: BTreeMap::new(),
            rejections: Vec::new(),
        }
    }
}

enum StepOutcome {
    Applied,
    Stop,
}

pub struct Orchestrator<'g> {
    config: RunConfig,
    generator: Option<&'g dyn TextGenerator>,
}

impl<'g> Orchestrator<'g> {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            generator: None,
        }
    }

    pub fn with_generator(mut self, generator: &'g dyn TextGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the table from raw rows, then run.
    pub fn run_rows(
        &self,
        columns: Vec<String>,
        rows: Vec<Row>,
        question: &str,
    ) -> Result<RunResult, RunError> {
        let table = Table::new(columns, rows)?;
        self.run(table, question)
    }

    pub fn run(&self, table: Table, question: &str) -> Result<RunResult, RunError> {
        let max_steps = self.config.max_steps;
        if max_steps == 0 {
            return Err(RunError::InvalidMaxSteps(max_steps));
        }
        let mut state = RunState::new(table);
        let mut collaborator = Collaborator::new(self.generator);
        tracing::info!(
            rows = state.table.row_count(),
            columns = state.table.column_count(),
            max_steps,
            collaborator = collaborator.is_enabled(),
            "run started"
        );

        let stop_reason = loop {
            if let Some(signal) = answer_available(&state.table, question) {
                tracing::info!(step = state.steps, ?signal, "answer available");
                break StopReason::AnswerAvailable;
            }
            if state.steps >= max_steps {
                tracing::info!(max_steps, "step budget exhausted");
                break StopReason::BudgetExhausted;
            }
            match self.step(&mut state, &mut collaborator, question) {
                StepOutcome::Applied => {}
                StepOutcome::Stop => {
                    tracing::info!(step = state.steps, "planner ended the chain");
                    break StopReason::ExplicitEnd;
                }
            }
        };

        if stop_reason != StopReason::BudgetExhausted {
            state.chain.push(ChainEntry::End);
        }
        let answer = query::answer(
            &mut collaborator,
            &state.table,
            question,
            &state.applied,
            state.steps,
        );
        tracing::info!(steps = state.steps, %stop_reason, %answer, "run finished");

        Ok(RunResult {
            question: question.to_string(),
            answer,
            chain: state.chain,
            tables: state.tables,
            final_table: state.table,
            steps: state.steps,
            stop_reason,
            max_steps,
            rejections: state.rejections,
            lm_exchanges: collaborator.into_exchanges(),
        })
    }

    /// Plan and apply one operation, retrying within the step's exclusion window.
    fn step(
        &self,
        state: &mut RunState,
        collaborator: &mut Collaborator<'_>,
        question: &str,
    ) -> StepOutcome {
        let step = state.steps + 1;
        let mut window = state.permanent.clone();
        let mut feedback: Vec<String> = Vec::new();
        loop {
            let decision = plan(
                collaborator,
                &PlanContext {
                    table: &state.table,
                    question,
                    applied: &state.applied,
                    excluded: &window,
                    feedback: &feedback,
                    step,
                },
            );
            let kind = match decision {
                PlanDecision::Apply(kind) => kind,
                PlanDecision::Stop => return StepOutcome::Stop,
            };
            let operation = generate_arguments(
                collaborator,
                &ArgsContext {
                    table: &state.table,
                    question,
                    kind,
                    count_column: &self.config.count_column,
                    feedback: &feedback,
                    step,
                },
            );
            let fingerprint = Fingerprint::of(&operation);
            let outcome = check_loop(&state.executed, &fingerprint)
                .and_then(|()| validate_operation(&state.table, &operation))
                .and_then(|()| operation.apply(&state.table).map_err(Rejection::new));
            match outcome {
                Ok(next) => {
                    record_step(state, step, operation, fingerprint, next);
                    return StepOutcome::Applied;
                }
                Err(rejection) => {
                    let count = state.rejection_counts.entry(kind).or_insert(0);
                    *count += 1;
                    let permanent =
                        rejection.is_loop() || *count >= self.config.max_rejections_per_kind;
                    tracing::warn!(
                        step,
                        %operation,
                        code = rejection.error.code(),
                        permanent,
                        "rejected proposal"
                    );
                    if permanent {
                        state.permanent.insert(kind);
                    }
                    window.insert(kind);
                    feedback.push(format!(
                        "{operation}: {} ({})",
                        rejection.error, rejection.suggestion
                    ));
                    state.rejections.push(RejectedAttempt {
                        step,
                        operation,
                        code: rejection.error.code().to_string(),
                        error: rejection.error.to_string(),
                        suggestion: rejection.suggestion,
                        permanent,
                    });
                }
            }
        }
    }
}

fn record_step(
    state: &mut RunState,
    step: usize,
    operation: Operation,
    fingerprint: Fingerprint,
    next: Table,
) {
    tracing::info!(
        step,
        %operation,
        %fingerprint,
        rows = next.row_count(),
        columns = next.column_count(),
        "applied operation"
    );
    state.chain.push(ChainEntry::Step(OperationRecord {
        step,
        operation: operation.clone(),
        fingerprint: fingerprint.clone(),
        rows_before: state.table.row_count(),
        rows_after: next.row_count(),
        columns_before: state.table.columns().to_vec(),
        columns_after: next.columns().to_vec(),
    }));
    state.executed.insert(fingerprint, step);
    state.applied.push(operation);
    state.tables.push(next.clone());
    state.table = next;
    state.steps = step;
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod tests;
