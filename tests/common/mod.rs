//! Shared test infrastructure for integration tests.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Expected outcome loaded from fixture.json.
#[derive(Debug, Deserialize)]
pub struct FixtureConfig {
    pub question: String,
    pub answer: String,
    pub stop_reason: String,
    /// Operation keywords in chain order.
    pub chain: Vec<String>,
}

/// A table, a question, and optionally canned collaborator replies.
pub struct TestFixture {
    pub fixture_dir: PathBuf,
    pub config: FixtureConfig,
}

/// What a `tchain run` invocation produced.
#[derive(Debug)]
pub struct TestResult {
    pub stdout: String,
    pub stderr: String,
    pub result: serde_json::Value,
    pub lm_log_lines: usize,
}

impl TestResult {
    pub fn answer(&self) -> &str {
        self.result["answer"].as_str().unwrap_or_default()
    }

    pub fn stop_reason(&self) -> &str {
        self.result["stop_reason"].as_str().unwrap_or_default()
    }

    /// Operation keywords of the applied steps.
    pub fn chain(&self) -> Vec<String> {
        self.result["chain"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry["marker"] == "step")
                    .filter_map(|entry| entry["operation"]["operation"].as_str())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Compare against the fixture's expectations, panicking with context.
    pub fn assert_matches(&self, config: &FixtureConfig) {
        assert_eq!(self.answer(), config.answer, "stderr:\n{}", self.stderr);
        assert_eq!(self.stop_reason(), config.stop_reason);
        assert_eq!(self.chain(), config.chain);
    }
}

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

pub fn tchain() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_tchain"));
    command.env_remove("TCHAIN_LM_COMMAND").env_remove("RUST_LOG");
    command
}

fn count_lines(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|content| content.lines().count())
        .unwrap_or(0)
}

impl TestFixture {
    /// Load a fixture by name from tests/fixtures/{name}/.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        let fixture_dir = manifest_dir().join("tests/fixtures").join(name);
        let config_path = fixture_dir.join("fixture.json");
        let config: FixtureConfig =
            serde_json::from_str(&std::fs::read_to_string(&config_path).map_err(|e| {
                anyhow::anyhow!("Failed to read {}: {}", config_path.display(), e)
            })?)?;
        Ok(Self {
            fixture_dir,
            config,
        })
    }

    /// The fixture's table file, JSON preferred over CSV.
    pub fn table_path(&self) -> PathBuf {
        let json = self.fixture_dir.join("table.json");
        if json.is_file() {
            json
        } else {
            self.fixture_dir.join("table.csv")
        }
    }

    pub fn replies_path(&self) -> Option<PathBuf> {
        let path = self.fixture_dir.join("replies.json");
        path.is_file().then_some(path)
    }

    /// Run `tchain run` on this fixture, replaying canned replies when present.
    pub fn run(&self, extra_args: &[&str]) -> anyhow::Result<TestResult> {
        let temp_dir = TempDir::new()?;
        let output_path = temp_dir.path().join("result.json");
        let lm_log = temp_dir.path().join("lm_log.jsonl");

        let mut command = tchain();
        command
            .current_dir(temp_dir.path())
            .arg("run")
            .arg("--table")
            .arg(self.table_path())
            .arg("--question")
            .arg(&self.config.question)
            .arg("--output")
            .arg(&output_path)
            .arg("--lm-log")
            .arg(&lm_log);
        match self.replies_path() {
            Some(replies) => {
                command.arg("--lm-replay").arg(replies);
            }
            None => {
                command.arg("--no-lm");
            }
        }
        command.args(extra_args);

        let output = command.output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(anyhow::anyhow!("tchain failed: {stderr}"));
        }

        let result = serde_json::from_str(&std::fs::read_to_string(&output_path)?)?;
        Ok(TestResult {
            stdout,
            stderr,
            result,
            lm_log_lines: count_lines(&lm_log),
        })
    }
}
