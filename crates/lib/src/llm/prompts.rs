//! System prompts: the pool one instruction is drawn from for every generation.

use anyhow::{Context, Result};
use std::path::Path;

use crate::random::{choose, RandomSource};

/// Non-empty list of system instructions.
#[derive(Debug, Clone)]
pub struct SystemPrompts {
    prompts: Vec<String>,
}

impl SystemPrompts {
    /// Build from a list; blank entries are dropped and at least one prompt must remain.
    pub fn new(prompts: Vec<String>) -> Result<Self> {
        let prompts: Vec<String> = prompts
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect();
        if prompts.is_empty() {
            anyhow::bail!("at least one non-empty system prompt is required");
        }
        Ok(Self { prompts })
    }

    /// Load a JSON array of strings.
    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading system prompts from {}", path.display()))?;
        let prompts: Vec<String> = serde_json::from_str(&s)
            .with_context(|| format!("parsing system prompts from {}", path.display()))?;
        let prompts = Self::new(prompts)
            .with_context(|| format!("no usable system prompts in {}", path.display()))?;
        log::info!(
            "loaded {} system prompt(s) from {}",
            prompts.len(),
            path.display()
        );
        Ok(prompts)
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Pick one prompt uniformly.
    pub fn pick(&self, random: &dyn RandomSource) -> &str {
        choose(random, &self.prompts)
            .map(String::as_str)
            .unwrap_or_default()
    }
}
