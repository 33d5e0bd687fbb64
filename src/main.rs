use anyhow::Result;
use clap::Parser;
use table_chain::cli::{Command, RootArgs};
use table_chain::workflow;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    let default_filter = match &args.command {
        Command::Run(run) if run.verbose => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match args.command {
        Command::Run(args) => workflow::run_run(args),
        Command::Ops(args) => workflow::run_ops(args),
        Command::Show(args) => workflow::run_show(args),
    }
}
