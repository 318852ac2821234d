//! Interactive (human-in-the-loop) suspension state.
//!
//! When a tool sub-flow pauses for human input, the dispatch returns an
//! [`InteractiveState`]. The caller replays it on the next request; the agent
//! node is then re-entered and the tool-call loop resumes from the stored
//! tool parameters instead of the freshly assembled transcript.

use serde::{Deserialize, Serialize};

/// Tool-call parameters kept across a suspension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveToolParams {
    /// The model's id for the suspended call
    pub tool_call_id: String,

    /// Parameters supplied by the human when resuming
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,

    /// Transcript snapshot the tool-call loop rehydrates from
    #[serde(default)]
    pub memory_messages: Vec<serde_json::Value>,
}

/// A pending interactive suspension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveState {
    /// Nodes to re-enter when resuming
    #[serde(default)]
    pub entry_node_ids: Vec<String>,

    /// Present when the suspension happened inside a tool call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_params: Option<InteractiveToolParams>,

    /// Opaque payload rendered by the client (form, user select, ...)
    #[serde(default)]
    pub payload: serde_json::Value,
}
