//! CLI argument parsing for `tchain`.
//!
//! The CLI is thin: it loads inputs, resolves the collaborator, and hands the
//! table and question to the library's reasoning loop.
use crate::config::BackendFlags;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tchain",
    version,
    about = "Answer questions about tables through a chain of table operations",
    after_help = "Commands:\n  run --table <file> --question <text>  Reason over a table and print the answer\n  ops                                   List the operation catalog\n  show --table <file>                   Validate and render a table\n\nExamples:\n  tchain run --table cyclists.json --question \"What country has the most cyclists in the top 3?\"\n  tchain run --table t.csv --question \"Who scored most?\" --lm \"ollama run llama3.2\" --explain\n  tchain show --table cyclists.json --max-rows 5",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Ops(OpsArgs),
    Show(ShowArgs),
}

/// Run command inputs for one table and question.
#[derive(Parser, Debug)]
#[command(about = "Reason over a table until the question can be answered")]
pub struct RunArgs {
    /// Table file (.json or .csv)
    #[arg(long, value_name = "FILE")]
    pub table: PathBuf,

    /// Question to answer about the table
    #[arg(long, value_name = "TEXT")]
    pub question: String,

    /// Maximum number of applied operations (default 10, or from config)
    #[arg(long, value_name = "N")]
    pub max_steps: Option<usize>,

    /// Write the full run result as JSON
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Save the final table (.json or .csv)
    #[arg(long, value_name = "FILE")]
    pub final_table: Option<PathBuf>,

    /// Config file (default: ./tchain.json when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub backend: BackendArgs,

    /// Append collaborator exchanges to a JSONL log
    #[arg(long, value_name = "FILE")]
    pub lm_log: Option<PathBuf>,

    /// Print a step-by-step explanation
    #[arg(long)]
    pub explain: bool,

    /// Exit non-zero when the step budget runs out before an answer
    #[arg(long)]
    pub strict: bool,

    /// Emit a verbose transcript of the run on stderr
    #[arg(long)]
    pub verbose: bool,

    /// Emit the run result as JSON on stdout
    #[arg(long, conflicts_with = "explain")]
    pub json: bool,
}

/// Collaborator selection flags.
#[derive(Args, Debug, Clone, Default)]
pub struct BackendArgs {
    /// LM command; the prompt is written to its stdin
    #[arg(long, value_name = "CMD", conflicts_with_all = ["ollama_model", "lm_replay", "no_lm"])]
    pub lm: Option<String>,

    /// Ollama model name
    #[arg(long, value_name = "MODEL", conflicts_with_all = ["lm_replay", "no_lm"])]
    pub ollama_model: Option<String>,

    /// Ollama server URL
    #[arg(long, value_name = "URL")]
    pub ollama_url: Option<String>,

    /// Answer collaborator calls from a JSON array of canned replies
    #[arg(long, value_name = "FILE", conflicts_with = "no_lm")]
    pub lm_replay: Option<PathBuf>,

    /// Ignore any configured collaborator and use deterministic fallbacks
    #[arg(long)]
    pub no_lm: bool,
}

impl BackendArgs {
    pub fn flags(&self) -> BackendFlags {
        BackendFlags {
            lm: self.lm.clone(),
            ollama_model: self.ollama_model.clone(),
            ollama_url: self.ollama_url.clone(),
            lm_replay: self.lm_replay.clone(),
            no_lm: self.no_lm,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "List the operation catalog")]
pub struct OpsArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Validate and render a table")]
pub struct ShowArgs {
    /// Table file (.json or .csv)
    #[arg(long, value_name = "FILE")]
    pub table: PathBuf,

    /// Rows to render
    #[arg(long, value_name = "N")]
    pub max_rows: Option<usize>,

    /// Emit stats and warnings as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let args = RootArgs::try_parse_from([
            "tchain",
            "run",
            "--table",
            "t.json",
            "--question",
            "Who?",
            "--max-steps",
            "4",
            "--lm",
            "llm -m local",
        ])
        .unwrap();
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.max_steps, Some(4));
        assert_eq!(run.backend.flags().lm.as_deref(), Some("llm -m local"));
    }

    #[test]
    fn conflicting_backends_are_refused() {
        let err = RootArgs::try_parse_from([
            "tchain",
            "run",
            "--table",
            "t.json",
            "--question",
            "Who?",
            "--lm",
            "x",
            "--no-lm",
        ]);
        assert!(err.is_err());
    }
}
