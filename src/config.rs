//! Run configuration: the optional `tchain.json` file plus flag and env resolution.
//!
//! The file is strict (`deny_unknown_fields`) and versioned so a typo fails
//! loudly instead of silently running with defaults.
use crate::chain::RunConfig;
use crate::lm::{
    CommandGenerator, OllamaGenerator, ReplayGenerator, TextGenerator, DEFAULT_OLLAMA_URL,
};
use crate::util::read_json;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_FILE: &str = "tchain.json";
pub const LM_COMMAND_ENV: &str = "TCHAIN_LM_COMMAND";
pub const DEFAULT_LM_TIMEOUT_SECS: u64 = 120;

fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rejections_per_kind: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Merge file values over the defaults; `max_steps` from a flag wins.
    pub fn run_config(&self, max_steps_flag: Option<usize>) -> RunConfig {
        let defaults = RunConfig::default();
        RunConfig {
            max_steps: max_steps_flag
                .or(self.max_steps)
                .unwrap_or(defaults.max_steps),
            count_column: self
                .count_column
                .clone()
                .unwrap_or(defaults.count_column),
            max_rejections_per_kind: self
                .max_rejections_per_kind
                .unwrap_or(defaults.max_rejections_per_kind),
        }
    }

    pub fn lm_timeout(&self) -> Duration {
        Duration::from_secs(self.lm_timeout_secs.unwrap_or(DEFAULT_LM_TIMEOUT_SECS))
    }
}

/// Validate schema version and user-provided values.
pub fn validate_config(config: &ConfigFile) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported tchain config schema_version {}",
            config.schema_version
        ));
    }
    if config.max_steps == Some(0) {
        return Err(anyhow!("max_steps must be positive"));
    }
    if config.max_rejections_per_kind == Some(0) {
        return Err(anyhow!("max_rejections_per_kind must be positive"));
    }
    if let Some(count_column) = config.count_column.as_deref() {
        if count_column.trim().is_empty() {
            return Err(anyhow!("count_column must be non-empty"));
        }
    }
    if let Some(command) = config.lm_command.as_deref() {
        if command.trim().is_empty() {
            return Err(anyhow!("lm_command must be non-empty"));
        }
    }
    if let Some(ollama) = config.ollama.as_ref() {
        if ollama.model.trim().is_empty() {
            return Err(anyhow!("ollama.model must be non-empty"));
        }
        if ollama.url.trim().is_empty() {
            return Err(anyhow!("ollama.url must be non-empty"));
        }
    }
    if config.lm_timeout_secs == Some(0) {
        return Err(anyhow!("lm_timeout_secs must be positive"));
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let config: ConfigFile =
        read_json(path).with_context(|| format!("load config {}", path.display()))?;
    validate_config(&config).with_context(|| format!("validate config {}", path.display()))?;
    Ok(config)
}

/// Load an explicit config, else `tchain.json` in `dir` when present.
pub fn load_config_optional(explicit: Option<&Path>, dir: &Path) -> Result<Option<ConfigFile>> {
    if let Some(path) = explicit {
        return load_config(path).map(Some);
    }
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    if !candidate.is_file() {
        return Ok(None);
    }
    tracing::debug!(path = %candidate.display(), "using config file");
    load_config(&candidate).map(Some)
}

/// Which collaborator backend a run uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Fallback,
    Command(String),
    Ollama { url: String, model: String },
    Replay(PathBuf),
}

/// Collaborator flags as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct BackendFlags {
    pub lm: Option<String>,
    pub ollama_model: Option<String>,
    pub ollama_url: Option<String>,
    pub lm_replay: Option<PathBuf>,
    pub no_lm: bool,
}

/// Resolve the backend: flags, then config file, then `TCHAIN_LM_COMMAND`.
pub fn resolve_backend(
    flags: &BackendFlags,
    config: Option<&ConfigFile>,
    env_command: Option<String>,
) -> Backend {
    if flags.no_lm {
        return Backend::Fallback;
    }
    if let Some(path) = flags.lm_replay.as_ref() {
        return Backend::Replay(path.clone());
    }
    if let Some(command) = flags.lm.as_ref() {
        return Backend::Command(command.clone());
    }
    let config_url = config
        .and_then(|config| config.ollama.as_ref())
        .map(|ollama| ollama.url.clone());
    if let Some(model) = flags.ollama_model.as_ref() {
        let url = flags
            .ollama_url
            .clone()
            .or(config_url)
            .unwrap_or_else(default_ollama_url);
        return Backend::Ollama {
            url,
            model: model.clone(),
        };
    }
    if let Some(config) = config {
        if let Some(command) = config.lm_command.as_ref() {
            return Backend::Command(command.clone());
        }
        if let Some(ollama) = config.ollama.as_ref() {
            return Backend::Ollama {
                url: flags.ollama_url.clone().unwrap_or_else(|| ollama.url.clone()),
                model: ollama.model.clone(),
            };
        }
    }
    match env_command {
        Some(command) if !command.trim().is_empty() => Backend::Command(command),
        _ => Backend::Fallback,
    }
}

/// Instantiate the generator for `backend`; `None` means fallback mode.
pub fn build_generator(
    backend: &Backend,
    timeout: Duration,
) -> Result<Option<Box<dyn TextGenerator>>> {
    let generator: Box<dyn TextGenerator> = match backend {
        Backend::Fallback => return Ok(None),
        Backend::Command(command) => Box::new(CommandGenerator::new(command)?),
        Backend::Ollama { url, model } => Box::new(OllamaGenerator::new(url, model, timeout)),
        Backend::Replay(path) => Box::new(
            ReplayGenerator::load(path)
                .with_context(|| format!("load LM replay {}", path.display()))?,
        ),
    };
    tracing::debug!(backend = %generator.describe(), "collaborator configured");
    Ok(Some(generator))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
