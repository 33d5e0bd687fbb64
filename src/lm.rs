//! The text-generation collaborator.
//!
//! Planning, argument generation, and answer extraction may each consult an
//! external text generator. The capability is a single method,
//! `complete(prompt) -> text`; backends live in submodules:
//!
//! - [`CommandGenerator`]: a user-configured command, prompt on stdin
//! - [`OllamaGenerator`]: a local Ollama server over HTTP
//! - [`ReplayGenerator`]: canned replies from a JSON file
//!
//! A run never sees backend errors. [`Collaborator`] wraps the optional
//! generator for one run, records every exchange, and turns failures into
//! `None` so the caller falls back to deterministic behavior.
use crate::util::truncate_string;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

mod command;
pub mod grammar;
mod ollama;
mod replay;

pub use command::CommandGenerator;
pub use ollama::{OllamaGenerator, OllamaOptions, DEFAULT_OLLAMA_URL};
pub use replay::ReplayGenerator;

/// Bytes of each response kept in the exchange record.
const RESPONSE_PREVIEW_BYTES: usize = 500;

/// Anything that turns a prompt into text.
pub trait TextGenerator {
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Short label for logs.
    fn describe(&self) -> String {
        "lm".to_string()
    }
}

/// Where in the run a collaborator call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSite {
    Plan,
    Args,
    Answer,
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::Args => write!(f, "args"),
            Self::Answer => write!(f, "answer"),
        }
    }
}

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmExchange {
    pub call_site: CallSite,
    /// Orchestrator step the call was made for (1-based; answer calls use the final count).
    pub step: usize,
    pub duration_ms: u64,
    pub prompt_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-run access to an optional generator.
pub struct Collaborator<'a> {
    generator: Option<&'a dyn TextGenerator>,
    exchanges: Vec<LmExchange>,
}

impl<'a> Collaborator<'a> {
    pub fn new(generator: Option<&'a dyn TextGenerator>) -> Self {
        Self {
            generator,
            exchanges: Vec::new(),
        }
    }

    /// A collaborator that never calls out.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    /// Send `prompt` to the generator; `None` when disabled or on failure.
    pub fn ask(&mut self, call_site: CallSite, step: usize, prompt: &str) -> Option<String> {
        let generator = self.generator?;
        let start = Instant::now();
        let outcome = generator.complete(prompt);
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (response, exchange_error) = match outcome {
            Ok(text) => {
                tracing::debug!(%call_site, step, bytes = text.len(), "collaborator replied");
                (Some(text), None)
            }
            Err(err) => {
                tracing::warn!(
                    %call_site,
                    step,
                    backend = %generator.describe(),
                    error = %format!("{err:#}"),
                    "collaborator call failed; using fallback"
                );
                (None, Some(format!("{err:#}")))
            }
        };
        self.exchanges.push(LmExchange {
            call_site,
            step,
            duration_ms,
            prompt_bytes: prompt.len(),
            response_preview: response
                .as_deref()
                .map(|text| truncate_string(text, RESPONSE_PREVIEW_BYTES)),
            error: exchange_error,
        });
        response
    }

    pub fn exchanges(&self) -> &[LmExchange] {
        &self.exchanges
    }

    pub fn into_exchanges(self) -> Vec<LmExchange> {
        self.exchanges
    }
}
