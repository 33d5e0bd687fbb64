//! Shell-command backend: prompt on stdin, reply on stdout.
//!
//! The command line is split with shell-words, so any tool that reads a
//! prompt and prints text works (`llm`, `ollama run <model>`, a wrapper script).
use super::TextGenerator;
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: String,
    argv: Vec<String>,
}

impl CommandGenerator {
    pub fn new(command: &str) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        Ok(Self {
            command: command.to_string(),
            argv,
        })
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl TextGenerator for CommandGenerator {
    fn complete(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn LM command: {}", self.argv[0]))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .context("write prompt to LM stdin")?;
        }

        let output = child.wait_with_output().context("wait for LM command")?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::info!(
            elapsed_ms,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm invoke complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "LM command failed with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
    }

    fn describe(&self) -> String {
        format!("command `{}`", self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_quoted_arguments() {
        let generator = CommandGenerator::new(r#"llm -m "local model" --no-stream"#).unwrap();
        assert_eq!(generator.argv(), ["llm", "-m", "local model", "--no-stream"]);
    }

    #[test]
    fn rejects_empty_command() {
        assert!(CommandGenerator::new("   ").is_err());
        assert!(CommandGenerator::new("\"unterminated").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn echoes_prompt_through_cat() {
        let generator = CommandGenerator::new("cat").unwrap();
        assert_eq!(generator.complete("ANSWER: ITA").unwrap(), "ANSWER: ITA");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_error() {
        let generator = CommandGenerator::new("sh -c 'echo boom >&2; exit 3'").unwrap();
        let err = generator.complete("prompt").unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
    }
}
