use super::*;
use crate::lm::testing::ScriptedGenerator;
use crate::table::Value;

const QUESTION: &str = "What country has the most cyclists in the top 3?";

fn cyclists() -> Table {
    Table::from_grid(
        ["Rank", "Cyclist"],
        vec![
            vec![Value::int(1), Value::text("Alejandro (ESP)")],
            vec![Value::int(2), Value::text("Davide (ITA)")],
            vec![Value::int(3), Value::text("Paolo (ITA)")],
            vec![Value::int(4), Value::text("Haimar (ESP)")],
        ],
    )
    .expect("valid table")
}

fn fallback_run(table: Table, question: &str, max_steps: usize) -> RunResult {
    let config = RunConfig {
        max_steps,
        ..RunConfig::default()
    };
    Orchestrator::new(config)
        .run(table, question)
        .expect("run succeeds")
}

#[test]
fn cyclists_fallback_chain_answers_ita() {
    let result = fallback_run(cyclists(), QUESTION, 10);
    assert_eq!(
        result.operations(),
        vec![
            &Operation::add_column(
                "Country",
                ["ESP", "ITA", "ITA", "ESP"].into_iter().map(Value::text).collect()
            ),
            &Operation::select_row(vec![1, 2, 3]),
            &Operation::group_by("Country"),
        ]
    );
    assert_eq!(result.answer, "ITA");
    assert_eq!(result.stop_reason, StopReason::AnswerAvailable);
    assert_eq!(result.steps, 3);
    assert_eq!(result.tables.len(), 4);
    assert_eq!(result.tables[0], cyclists());
    assert_eq!(result.final_table.columns(), ["Country", "Count"]);
    assert_eq!(result.chain.first(), Some(&ChainEntry::Begin));
    assert_eq!(result.chain.last(), Some(&ChainEntry::End));
    assert!(result.rejections.is_empty());
    assert!(result.lm_exchanges.is_empty());
}

#[test]
fn records_row_and_column_deltas() {
    let result = fallback_run(cyclists(), QUESTION, 10);
    let records: Vec<&OperationRecord> = result.records().collect();
    assert_eq!(records[0].columns_after, ["Rank", "Cyclist", "Country"]);
    assert_eq!((records[1].rows_before, records[1].rows_after), (4, 3));
    assert_eq!(records[2].step, 3);
}

#[test]
fn budget_exhaustion_keeps_partial_chain_without_end_marker() {
    let result = fallback_run(cyclists(), QUESTION, 1);
    assert_eq!(result.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(result.steps, 1);
    assert_ne!(result.chain.last(), Some(&ChainEntry::End));
    assert_eq!(
        result.require_answer(),
        Err(ChainError::BudgetExhausted { max_steps: 1 })
    );
    assert!(!result.answer.is_empty());
}

#[test]
fn budget_end_still_checks_answer_availability() {
    let result = fallback_run(cyclists(), QUESTION, 3);
    assert_eq!(result.stop_reason, StopReason::AnswerAvailable);
    assert_eq!(result.require_answer(), Ok("ITA"));
}

#[test]
fn zero_budget_is_a_caller_error() {
    let err = Orchestrator::new(RunConfig {
        max_steps: 0,
        ..RunConfig::default()
    })
    .run(cyclists(), QUESTION)
    .unwrap_err();
    assert_eq!(err, RunError::InvalidMaxSteps(0));
}

#[test]
fn malformed_rows_are_a_caller_error() {
    let mut row = Row::new();
    row.insert("Rank".to_string(), Value::int(1));
    let err = Orchestrator::new(RunConfig::default())
        .run_rows(
            vec!["Rank".to_string(), "Cyclist".to_string()],
            vec![row],
            QUESTION,
        )
        .unwrap_err();
    assert!(matches!(err, RunError::MalformedTable(_)), "{err:?}");
}

#[test]
fn nothing_to_do_ends_explicitly() {
    let result = fallback_run(cyclists(), "Describe the table", 10);
    assert_eq!(result.stop_reason, StopReason::ExplicitEnd);
    assert_eq!(result.steps, 0);
    assert_eq!(result.chain, vec![ChainEntry::Begin, ChainEntry::End]);
    assert_eq!(result.answer, "1");
}

#[test]
fn repeated_operation_is_rejected_and_kind_excluded_for_the_run() {
    let generator = ScriptedGenerator::new([
        ("CANDIDATE OPERATIONS", "OPERATION: f_sort_by"),
        ("ARGUMENTS:", r#"ARGUMENTS: ["Rank", true]"#),
    ]);
    let result = Orchestrator::new(RunConfig::default())
        .with_generator(&generator)
        .run(cyclists(), "Order the cyclists by rank")
        .expect("run succeeds");
    assert_eq!(result.operations(), vec![&Operation::sort_by("Rank", true)]);
    assert_eq!(result.rejections.len(), 1);
    let rejection = &result.rejections[0];
    assert_eq!(rejection.code, "loop_detected");
    assert_eq!(rejection.step, 2);
    assert!(rejection.permanent);
    assert_eq!(result.stop_reason, StopReason::ExplicitEnd);
    // The rejected attempt left the table untouched.
    assert_eq!(result.final_table, result.tables[1]);
}

#[test]
fn invalid_collaborator_arguments_are_retried_then_excluded() {
    let generator = ScriptedGenerator::new([
        ("CANDIDATE OPERATIONS", "OPERATION: f_group_by"),
        ("ARGUMENTS:", "ARGUMENTS: Team"),
    ]);
    let result = Orchestrator::new(RunConfig::default())
        .with_generator(&generator)
        .run(cyclists(), QUESTION)
        .expect("run succeeds");
    let codes: Vec<&str> = result.rejections.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, ["invalid_column", "invalid_column"]);
    assert!(!result.rejections[0].permanent);
    assert!(result.rejections[1].permanent);
    assert!(result.rejections[0].suggestion.contains("f_add_column"));
    let kinds: Vec<OperationKind> = result.operations().iter().map(|op| op.kind()).collect();
    assert_eq!(kinds, [OperationKind::AddColumn, OperationKind::SelectRow]);
    assert!(result
        .operations()
        .iter()
        .all(|op| op.kind() != OperationKind::GroupBy));
    assert!(!result.lm_exchanges.is_empty());
}

#[test]
fn collaborator_end_token_stops_the_run() {
    let generator = ScriptedGenerator::new([
        ("CANDIDATE OPERATIONS", "OPERATION: [E]"),
        ("FINAL TABLE", "ANSWER: nobody"),
    ]);
    let result = Orchestrator::new(RunConfig::default())
        .with_generator(&generator)
        .run(cyclists(), QUESTION)
        .expect("run succeeds");
    assert_eq!(result.stop_reason, StopReason::ExplicitEnd);
    assert_eq!(result.steps, 0);
    assert_eq!(result.answer, "nobody");
}

#[test]
fn independent_runs_do_not_share_state() {
    let answers: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| fallback_run(cyclists(), QUESTION, 10).answer))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect()
    });
    assert_eq!(answers, vec!["ITA"; 4]);
}

#[test]
fn run_result_serializes_stop_reason_and_markers() {
    let result = fallback_run(cyclists(), QUESTION, 10);
    let json = serde_json::to_value(&result).expect("serialize");
    assert_eq!(json["stop_reason"], "answer_available");
    assert_eq!(json["chain"][0]["marker"], "begin");
    assert_eq!(json["chain"][3]["marker"], "step");
    assert_eq!(json["chain"][3]["operation"]["operation"], "f_group_by");
    assert!(json.get("rejections").is_none());
}
