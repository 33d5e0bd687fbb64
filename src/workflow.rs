//! Command handlers: each loads its inputs, calls into the library, and prints.
use crate::chain::{Orchestrator, RunConfig, RunResult};
use crate::cli::{OpsArgs, RunArgs, ShowArgs};
use crate::config::{
    build_generator, load_config_optional, resolve_backend, DEFAULT_LM_TIMEOUT_SECS,
    LM_COMMAND_ENV,
};
use crate::ops::OperationKind;
use crate::report::{append_lm_log, chain_summary, explain, operations_summary, save_results};
use crate::table::io::{load_table, save_table, validate_table_format};
use anyhow::{anyhow, Context, Result};
use std::env;
use std::time::Duration;

pub fn run_run(args: RunArgs) -> Result<()> {
    let table = load_table(&args.table)?;
    for warning in validate_table_format(&table).warnings {
        tracing::warn!(table = %args.table.display(), "{warning}");
    }

    let cwd = env::current_dir().context("resolve current directory")?;
    let config = load_config_optional(args.config.as_deref(), &cwd)?;
    let run_config = match config.as_ref() {
        Some(config) => config.run_config(args.max_steps),
        None => {
            let defaults = RunConfig::default();
            RunConfig {
                max_steps: args.max_steps.unwrap_or(defaults.max_steps),
                ..defaults
            }
        }
    };
    let timeout = config
        .as_ref()
        .map(|config| config.lm_timeout())
        .unwrap_or(Duration::from_secs(DEFAULT_LM_TIMEOUT_SECS));

    let backend = resolve_backend(
        &args.backend.flags(),
        config.as_ref(),
        env::var(LM_COMMAND_ENV).ok(),
    );
    let generator = build_generator(&backend, timeout)?;

    let mut orchestrator = Orchestrator::new(run_config);
    if let Some(generator) = generator.as_deref() {
        orchestrator = orchestrator.with_generator(generator);
    }
    let result = orchestrator
        .run(table, &args.question)
        .map_err(|err| anyhow!("run failed: {err}"))?;

    if let Some(path) = args.output.as_deref() {
        save_results(path, &result)?;
        tracing::info!(path = %path.display(), "wrote run result");
    }
    if let Some(path) = args.final_table.as_deref() {
        save_table(&result.final_table, path)?;
        tracing::info!(path = %path.display(), "wrote final table");
    }
    if let Some(path) = args.lm_log.as_deref() {
        append_lm_log(path, &result)?;
    }

    if args.verbose {
        print_transcript(&result);
    }
    if args.json {
        let text = serde_json::to_string_pretty(&result).context("serialize run result")?;
        println!("{text}");
    } else if args.explain {
        println!("{}", explain(&result));
    } else {
        println!("{}", result.answer);
    }

    if args.strict {
        result
            .require_answer()
            .map_err(|err| anyhow!("{}: {err}", err.code()))?;
    }
    Ok(())
}

fn print_transcript(result: &RunResult) {
    eprintln!("{}", chain_summary(&result.chain));
    for rejection in &result.rejections {
        eprintln!(
            "rejected at step {}: {} ({})",
            rejection.step, rejection.operation, rejection.error
        );
    }
    eprintln!(
        "stopped: {} after {} of {} steps",
        result.stop_reason, result.steps, result.max_steps
    );
}

pub fn run_ops(args: OpsArgs) -> Result<()> {
    if args.json {
        let catalog: Vec<serde_json::Value> = OperationKind::ALL
            .iter()
            .map(|kind| {
                serde_json::json!({
                    "operation": kind.keyword(),
                    "description": kind.description(),
                    "arguments": kind.argument_shape(),
                    "example": kind.example(),
                })
            })
            .collect();
        let text = serde_json::to_string_pretty(&catalog).context("serialize catalog")?;
        println!("{text}");
        return Ok(());
    }
    println!("{}", operations_summary());
    Ok(())
}

pub fn run_show(args: ShowArgs) -> Result<()> {
    let table = load_table(&args.table)?;
    let report = validate_table_format(&table);
    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize table report")?;
        println!("{text}");
        return Ok(());
    }
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    println!("{}", table.render_pipe_limited(args.max_rows));
    println!(
        "{} rows, {} columns",
        report.stats.rows, report.stats.columns
    );
    Ok(())
}
