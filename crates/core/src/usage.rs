//! Usage accounting records.
//!
//! A [`UsageRecord`] is one billable unit: the agent's own model call, or one
//! node inside a tool sub-flow. Records are summed, never merged by identity.

use serde::{Deserialize, Serialize};

/// A single billable usage entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Display name of the node that incurred the cost
    pub module_name: String,

    /// Model used, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Cost in platform points
    pub total_points: f64,

    #[serde(default)]
    pub input_tokens: u32,

    #[serde(default)]
    pub output_tokens: u32,
}

impl UsageRecord {
    pub fn new(module_name: impl Into<String>, total_points: f64) -> Self {
        Self {
            module_name: module_name.into(),
            model: None,
            total_points,
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

/// Total points across a set of records.
pub fn total_points<'a>(records: impl IntoIterator<Item = &'a UsageRecord>) -> f64 {
    records.into_iter().map(|r| r.total_points).sum()
}
