//! The tool-call loop contract.
//!
//! The loop itself (model calls, tool execution, nested workflow runs) lives
//! outside this crate. The dispatcher hands it the assembled transcript and
//! the tool set, and gets back the transcript actually sent, the assistant
//! responses, token counts and what every tool flow reported.

use crate::model::LlmModel;
use async_trait::async_trait;
use rustedflow_core::chat::{ChatItem, ChatValue};
use rustedflow_core::error::Result;
use rustedflow_core::interactive::{InteractiveState, InteractiveToolParams};
use rustedflow_core::usage::UsageRecord;
use rustedflow_workflow::{RuntimeGraph, ToolNode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound on tool-call rounds per dispatch; config may only lower it.
pub const MAX_RUN_TOOL_TIMES: u32 = 100;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    ToolCalls,
    Length,
    /// Round cap reached; the partial result is kept
    MaxRounds,
    /// Stream closed by the client
    Close,
}

/// What one tool sub-flow reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolFlowResponse {
    /// Billable units of the flow, already priced
    #[serde(default)]
    pub usages: Vec<UsageRecord>,

    /// Per-node responses, shown as tool detail
    #[serde(default)]
    pub responses: Vec<Value>,

    /// Memories the flow wants carried to the next round
    #[serde(default)]
    pub memories: Map<String, Value>,
}

/// Input to one loop run.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub messages: Vec<ChatItem>,
    pub tools: Vec<ToolNode>,

    /// Graph copy the loop may activate tool entries on
    pub graph: RuntimeGraph,

    pub model: LlmModel,
    pub vision: bool,
    pub reasoning: bool,

    /// Set when resuming a suspended tool call
    pub interactive_tool_params: Option<InteractiveToolParams>,

    pub max_run_tool_times: u32,
}

/// Output of one loop run.
#[derive(Debug, Clone, Default)]
pub struct ToolCallOutcome {
    /// Transcript actually sent to the model
    pub complete_messages: Vec<ChatItem>,

    /// Assistant-visible items (text and tool records)
    pub assistant_responses: Vec<ChatValue>,

    pub input_tokens: u32,
    pub output_tokens: u32,

    /// Set when a tool paused for human input
    pub interactive: Option<InteractiveState>,

    pub run_times: u32,
    pub finish_reason: FinishReason,
    pub tool_flows: Vec<ToolFlowResponse>,
}

/// Runs tool-call rounds until the model stops or the cap is hit.
///
/// Hitting the cap is reported through [`FinishReason::MaxRounds`], not an
/// error.
#[async_trait]
pub trait ToolCallDelegate: Send + Sync {
    async fn run(&self, request: ToolCallRequest) -> Result<ToolCallOutcome>;
}
