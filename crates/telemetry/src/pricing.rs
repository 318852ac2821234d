//! Points pricing table for LLM models.
//!
//! Prices are in platform points per 1K tokens. Each model has an input and
//! an output price. Entries come from the `[pricing]` table of the dispatch
//! config and can be added at runtime.

use rustedflow_config::PricingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Per-1K-token points for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    /// Points per 1K input tokens.
    pub input_per_k: f64,
    /// Points per 1K output tokens.
    pub output_per_k: f64,
}

impl ModelPrice {
    pub fn new(input_per_k: f64, output_per_k: f64) -> Self {
        Self {
            input_per_k,
            output_per_k,
        }
    }

    /// Points for the given token counts.
    pub fn points(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_k + output_tokens as f64 * self.output_per_k) / 1000.0
    }
}

impl From<PricingConfig> for ModelPrice {
    fn from(config: PricingConfig) -> Self {
        Self::new(config.input_per_k, config.output_per_k)
    }
}

/// Points charged for one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPoints {
    /// Name reported in usage records
    pub model_name: String,
    pub total_points: f64,
}

/// Converts model token usage into points.
pub trait CostModel: Send + Sync {
    fn model_points(&self, model: &str, input_tokens: u32, output_tokens: u32) -> ModelPoints;
}

/// Thread-safe points table.
pub struct PointsTable {
    prices: RwLock<HashMap<String, ModelPrice>>,
}

impl PointsTable {
    pub fn empty() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Build a table from the `[pricing]` config section.
    pub fn from_config(pricing: &HashMap<String, PricingConfig>) -> Self {
        let prices = pricing
            .iter()
            .map(|(model, price)| (model.clone(), ModelPrice::from(*price)))
            .collect();
        Self {
            prices: RwLock::new(prices),
        }
    }

    pub fn get(&self, model: &str) -> Option<ModelPrice> {
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);
        prices.get(model).copied()
    }

    /// Add or update the price of a model.
    pub fn set(&self, model: impl Into<String>, price: ModelPrice) {
        let mut prices = self.prices.write().unwrap_or_else(PoisonError::into_inner);
        prices.insert(model.into(), price);
    }

    /// Find the price for a model, or `None` when it is not listed.
    ///
    /// Tries an exact match first, then the longest key whose bare name
    /// (provider prefix stripped) prefixes the bare model name, so
    /// `gpt-4o-mini-2024-07-18` matches `openai/gpt-4o-mini`.
    pub fn lookup(&self, model: &str) -> Option<ModelPrice> {
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(p) = prices.get(model) {
            return Some(*p);
        }

        let model_lower = model.to_lowercase();
        let bare_model = model_lower.rsplit('/').next().unwrap_or(&model_lower);

        prices
            .iter()
            .map(|(key, price)| (key.rsplit('/').next().unwrap_or(key).to_lowercase(), price))
            .filter(|(bare_key, _)| !bare_key.is_empty() && bare_model.starts_with(bare_key.as_str()))
            .max_by_key(|(bare_key, _)| bare_key.len())
            .map(|(_, price)| *price)
    }

    /// List all priced model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = prices.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.prices.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PointsTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl CostModel for PointsTable {
    /// Unlisted models cost nothing.
    fn model_points(&self, model: &str, input_tokens: u32, output_tokens: u32) -> ModelPoints {
        let total_points = self
            .lookup(model)
            .map(|p| p.points(input_tokens, output_tokens))
            .unwrap_or(0.0);
        ModelPoints {
            model_name: model.to_string(),
            total_points,
        }
    }
}
