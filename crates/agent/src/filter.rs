//! Tool response truncation and answer extraction.
//!
//! Tool outputs can be arbitrarily large. Two views are kept: a short
//! preview for display and a longer one stored as context for later turns.
//! Only the `response` of tool records is cut; every other item passes
//! through untouched.

use rustedflow_config::ToolResponseLimits;
use rustedflow_core::chat::ChatValue;
use rustedflow_core::text::slice_str_start_end;
use serde_json::Value;

/// Keep the first and last `limit` chars of every tool response.
pub fn filter_tool_responses(values: &[ChatValue], limit: usize) -> Vec<ChatValue> {
    values
        .iter()
        .map(|item| match item {
            ChatValue::Tool { tools } => ChatValue::Tool {
                tools: tools
                    .iter()
                    .map(|tool| {
                        let mut tool = tool.clone();
                        tool.response = slice_str_start_end(&tool.response, limit, limit);
                        tool
                    })
                    .collect(),
            },
            other => other.clone(),
        })
        .collect()
}

/// The display view of assistant responses.
pub fn filter_tool_response_to_preview(values: &[ChatValue], limits: &ToolResponseLimits) -> Vec<ChatValue> {
    filter_tool_responses(values, limits.preview_chars)
}

/// The view stored for future-turn context.
pub fn filter_tool_response_for_context(values: &[ChatValue], limits: &ToolResponseLimits) -> Vec<ChatValue> {
    filter_tool_responses(values, limits.context_chars)
}

/// Render a tool flow's raw output as text for the model.
///
/// Objects and arrays are pretty-printed JSON, strings are used as-is, and
/// empty values become `none`.
pub fn format_tool_response(response: &Value) -> String {
    match response {
        Value::Null => "none".to_string(),
        Value::String(s) if s.is_empty() => "none".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(false) => "none".to_string(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(response).unwrap_or_else(|_| response.to_string())
        }
        other => other.to_string(),
    }
}

/// The answer text: every non-empty text item joined without separator.
pub fn answer_text(values: &[ChatValue]) -> String {
    values.iter().filter_map(ChatValue::as_text).collect()
}
