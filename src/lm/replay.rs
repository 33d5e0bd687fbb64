//! Canned replies, consumed in order.
use super::TextGenerator;
use crate::util::read_json;
use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

pub struct ReplayGenerator {
    replies: Mutex<VecDeque<String>>,
}

impl ReplayGenerator {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }

    /// Load a JSON array of reply strings.
    pub fn load(path: &Path) -> Result<Self> {
        let replies: Vec<String> = read_json(path)?;
        Ok(Self::new(replies))
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|queue| queue.len()).unwrap_or(0)
    }
}

impl TextGenerator for ReplayGenerator {
    fn complete(&self, _prompt: &str) -> Result<String> {
        let mut queue = self
            .replies
            .lock()
            .map_err(|_| anyhow!("replay queue poisoned"))?;
        queue
            .pop_front()
            .ok_or_else(|| anyhow!("replay replies exhausted"))
    }

    fn describe(&self) -> String {
        "replay".to_string()
    }
}
