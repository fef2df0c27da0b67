//! Prompter double with a fixed answer.

use crate::errors::ProvisionError;
use crate::pipeline::Prompter;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Answers every prompt the same way and records what was asked.
#[derive(Debug)]
pub struct ScriptedPrompter {
    answer: Result<bool, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// Always answers `answer`.
    #[must_use]
    pub fn answering(answer: bool) -> Self {
        Self {
            answer: Ok(answer),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always fails as if no terminal were attached.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            answer: Err(message.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    #[must_use]
    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&self, message: &str) -> Result<bool, ProvisionError> {
        self.prompts.lock().push(message.to_string());
        self.answer.clone().map_err(ProvisionError::Prompt)
    }
}
