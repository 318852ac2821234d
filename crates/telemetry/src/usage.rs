//! Usage aggregation for one agent dispatch.
//!
//! Total points = the agent's own model points + every nested tool flow's
//! points. The own record is zeroed when the caller brings an external
//! provider key; tool records are passed through as reported.

use crate::pricing::CostModel;
use rustedflow_core::usage::{UsageRecord, total_points};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Token counts of the agent's own model calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelUsage {
    /// Display name of the agent node
    pub module_name: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Aggregated usage of a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub model_name: String,

    /// Own model points after the external-key rule
    pub model_points: f64,

    /// Sum over every tool flow record
    pub tool_points: f64,

    pub total_points: f64,

    /// Own record first, then every tool record in order
    pub records: Vec<UsageRecord>,
}

/// Combine the agent's own usage with the usage of its tool flows.
pub fn aggregate_usage<'a>(
    cost_model: &dyn CostModel,
    own: &ModelUsage,
    external_provider_key: bool,
    tool_flow_usages: impl IntoIterator<Item = &'a [UsageRecord]>,
) -> UsageSummary {
    let priced = cost_model.model_points(&own.model, own.input_tokens, own.output_tokens);
    let model_points = if external_provider_key {
        0.0
    } else {
        priced.total_points
    };

    let tool_records: Vec<UsageRecord> = tool_flow_usages
        .into_iter()
        .flat_map(|flow| flow.iter().cloned())
        .collect();
    let tool_points = total_points(&tool_records);

    let mut records = Vec::with_capacity(tool_records.len() + 1);
    records.push(UsageRecord {
        module_name: own.module_name.clone(),
        model: Some(priced.model_name.clone()),
        total_points: model_points,
        input_tokens: own.input_tokens,
        output_tokens: own.output_tokens,
    });
    records.extend(tool_records);

    debug!(
        model = %priced.model_name,
        model_points,
        tool_points,
        external_provider_key,
        "Aggregated dispatch usage"
    );

    UsageSummary {
        model_name: priced.model_name,
        model_points,
        tool_points,
        total_points: model_points + tool_points,
        records,
    }
}
