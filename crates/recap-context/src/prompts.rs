use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tokio::sync::RwLock;

use crate::templates::{
    DEFAULT_ANSWER_PROMPT, DEFAULT_PARROT_PROMPT, DEFAULT_RESPECT_PROMPT, DEFAULT_SUMMARY_PROMPT,
};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Prompt templates an administrator can replace at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Summary,
    Respect,
    Answer,
    Parrot,
}

impl PromptKind {
    pub const ALL: [PromptKind; 4] = [Self::Summary, Self::Respect, Self::Answer, Self::Parrot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Respect => "respect",
            Self::Answer => "answer",
            Self::Parrot => "parrot",
        }
    }

    pub fn default_text(&self) -> &'static str {
        match self {
            Self::Summary => DEFAULT_SUMMARY_PROMPT,
            Self::Respect => DEFAULT_RESPECT_PROMPT,
            Self::Answer => DEFAULT_ANSWER_PROMPT,
            Self::Parrot => DEFAULT_PARROT_PROMPT,
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown prompt kind: {}", s))
    }
}

/// Process-wide prompt and model settings.
///
/// Overrides sit on top of the built-in defaults; resetting a kind drops its
/// override.
#[derive(Debug)]
pub struct PromptBook {
    overrides: RwLock<HashMap<PromptKind, String>>,
    default_model: String,
    model: RwLock<String>,
}

impl PromptBook {
    pub fn new(default_model: impl Into<String>) -> Self {
        let default_model = default_model.into();
        Self {
            overrides: RwLock::new(HashMap::new()),
            model: RwLock::new(default_model.clone()),
            default_model,
        }
    }

    pub async fn prompt(&self, kind: PromptKind) -> String {
        self.overrides
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| kind.default_text().to_string())
    }

    pub async fn set_prompt(&self, kind: PromptKind, text: impl Into<String>) {
        self.overrides.write().await.insert(kind, text.into());
        tracing::info!(kind = %kind, "Prompt updated");
    }

    pub async fn reset_prompt(&self, kind: PromptKind) {
        self.overrides.write().await.remove(&kind);
        tracing::info!(kind = %kind, "Prompt reset");
    }

    pub async fn model(&self) -> String {
        self.model.read().await.clone()
    }

    pub async fn set_model(&self, model: impl Into<String>) {
        let model = model.into();
        tracing::info!(%model, "Model updated");
        *self.model.write().await = model;
    }

    pub async fn reset_model(&self) {
        *self.model.write().await = self.default_model.clone();
    }
}

impl Default for PromptBook {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}
