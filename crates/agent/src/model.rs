//! LLM model profiles and lookup.

use rustedflow_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the dispatch needs to know about a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmModel {
    /// Model id as sent to the provider
    pub model: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub vision: bool,

    #[serde(default)]
    pub reasoning: bool,

    /// Prepended to every system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_system_chat_prompt: Option<String>,
}

impl LlmModel {
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            name: model.clone(),
            model,
            vision: false,
            reasoning: false,
            default_system_chat_prompt: None,
        }
    }
}

/// Model capability lookup.
pub trait ModelCatalog: Send + Sync {
    /// The profile for `model`, falling back to a default model when the
    /// catalog has one.
    fn resolve(&self, model: &str) -> Result<LlmModel>;
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticModelCatalog {
    models: HashMap<String, LlmModel>,
    default_model: Option<String>,
}

impl StaticModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: LlmModel) -> Self {
        self.models.insert(model.model.clone(), model);
        self
    }

    /// Model used for unknown or empty ids.
    pub fn with_default(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }
}

impl ModelCatalog for StaticModelCatalog {
    fn resolve(&self, model: &str) -> Result<LlmModel> {
        self.models
            .get(model)
            .or_else(|| {
                self.default_model
                    .as_deref()
                    .and_then(|default| self.models.get(default))
            })
            .cloned()
            .ok_or_else(|| Error::ModelNotFound(model.to_string()))
    }
}
