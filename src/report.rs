//! Human-readable chain summaries, step explanations, and persisted run output.
//!
//! Collaborator exchanges can be appended to a JSONL log, one line per call:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"question":"...","call_site":"plan","step":1,...}
//! ```
use crate::chain::{ChainEntry, RunResult};
use crate::lm::{CallSite, LmExchange};
use crate::ops::OperationKind;
use crate::util::write_json;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

pub const LM_LOG_SCHEMA_VERSION: u32 = 1;

/// Rows shown per table in explanations.
const EXPLAIN_MAX_ROWS: usize = 10;

/// `0. [B] - Start`, one numbered line per step, then `[E] - End` if the chain ended.
pub fn chain_summary(chain: &[ChainEntry]) -> String {
    let mut lines = Vec::with_capacity(chain.len());
    for entry in chain {
        match entry {
            ChainEntry::Begin => lines.push("0. [B] - Start".to_string()),
            ChainEntry::Step(record) => {
                lines.push(format!("{}. {}", record.step, record.operation));
            }
            ChainEntry::End => lines.push("[E] - End".to_string()),
        }
    }
    lines.join("\n")
}

/// Step-by-step walk through a run with the table after each step.
pub fn explain(result: &RunResult) -> String {
    let mut lines = vec![
        format!("Question: {}", result.question),
        String::new(),
        "Initial table:".to_string(),
    ];
    if let Some(initial) = result.tables.first() {
        lines.push(initial.render_pipe_limited(Some(EXPLAIN_MAX_ROWS)));
    }
    for record in result.records() {
        lines.push(String::new());
        lines.push(format!("Step {}: {}", record.step, record.operation));
        lines.push(format!(
            "  rows {} -> {}, columns [{}] -> [{}]",
            record.rows_before,
            record.rows_after,
            record.columns_before.join(", "),
            record.columns_after.join(", ")
        ));
        if let Some(table) = result.tables.get(record.step) {
            lines.push(table.render_pipe_limited(Some(EXPLAIN_MAX_ROWS)));
        }
    }
    if !result.rejections.is_empty() {
        lines.push(String::new());
        lines.push("Rejected proposals:".to_string());
        lines.extend(result.rejections.iter().map(|rejection| {
            format!(
                "  step {}: {} ({}) - {}",
                rejection.step, rejection.operation, rejection.error, rejection.suggestion
            )
        }));
    }
    lines.push(String::new());
    lines.push("Chain:".to_string());
    lines.push(chain_summary(&result.chain));
    lines.push(String::new());
    lines.push(format!(
        "Stopped: {} after {} of {} steps",
        result.stop_reason, result.steps, result.max_steps
    ));
    lines.push(format!("Answer: {}", result.answer));
    lines.join("\n")
}

/// One line per operation kind with its argument shape and an example.
pub fn operations_summary() -> String {
    OperationKind::ALL
        .iter()
        .map(|kind| {
            format!(
                "{kind}\n  {}\n  arguments: {}\n  example:   {}",
                kind.description(),
                kind.argument_shape(),
                kind.example()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn save_results(path: &Path, result: &RunResult) -> Result<()> {
    write_json(path, result).with_context(|| format!("save results {}", path.display()))
}

/// A single collaborator call in `lm_log.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmLogEntry {
    pub schema_version: u32,
    /// Unix timestamp in milliseconds when the entry was written.
    pub ts: u64,
    pub question: String,
    pub call_site: CallSite,
    pub step: usize,
    pub duration_ms: u64,
    pub prompt_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LmLogEntry {
    fn from_exchange(question: &str, ts: u64, exchange: &LmExchange) -> Self {
        Self {
            schema_version: LM_LOG_SCHEMA_VERSION,
            ts,
            question: question.to_string(),
            call_site: exchange.call_site,
            step: exchange.step,
            duration_ms: exchange.duration_ms,
            prompt_bytes: exchange.prompt_bytes,
            response_preview: exchange.response_preview.clone(),
            error: exchange.error.clone(),
        }
    }
}

/// Append every exchange of `result` to a JSONL log.
pub fn append_lm_log(path: &Path, result: &RunResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("create lm_log directory")?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open lm_log for append: {}", path.display()))?;
    let ts = now_epoch_ms();
    for exchange in &result.lm_exchanges {
        let entry = LmLogEntry::from_exchange(&result.question, ts, exchange);
        let line = serde_json::to_string(&entry).context("serialize lm_log entry")?;
        writeln!(file, "{line}").context("write lm_log entry")?;
    }
    Ok(())
}

fn now_epoch_ms() -> u64 {
    let elapsed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
