//! Conversation turn domain types.
//!
//! A conversation is an ordered list of [`ChatItem`]s, oldest first. Each item
//! carries a role and an ordered list of typed value items (text, file
//! attachment, or a batch of tool-call records). Ordering is meaningful and
//! every transformation in the dispatch pipeline preserves it.

use crate::text::slice_str_start_end;
use serde::{Deserialize, Serialize};

/// The role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions
    System,
    /// The end user
    Human,
    /// The AI assistant
    Assistant,
    /// Tool execution result
    Tool,
}

/// What kind of attachment a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatFileType {
    /// A document whose text can be extracted.
    File,
    /// An image, only meaningful to vision models.
    Image,
}

/// A file attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFile {
    #[serde(rename = "type")]
    pub kind: ChatFileType,

    /// Display name (may be empty for legacy attachments)
    #[serde(default)]
    pub name: String,

    /// Source URL, usually carrying a signed `token=` query parameter
    pub url: String,
}

impl ChatFile {
    pub fn document(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: ChatFileType::File,
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn image(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: ChatFileType::Image,
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn is_document(&self) -> bool {
        self.kind == ChatFileType::File
    }
}

/// One tool invocation as recorded in an assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    /// Call id assigned by the model
    pub id: String,

    /// Display name of the tool node
    pub tool_name: String,

    /// Function name exposed to the model (the tool node id)
    #[serde(default)]
    pub function_name: String,

    /// Arguments as a JSON string
    #[serde(default)]
    pub params: String,

    /// Tool output as text
    #[serde(default)]
    pub response: String,
}

/// A typed value item inside a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatValue {
    Text { content: String },
    File { file: ChatFile },
    Tool { tools: Vec<ToolCallRecord> },
}

impl ChatValue {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn file(file: ChatFile) -> Self {
        Self::File { file }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { content } => Some(content),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&ChatFile> {
        match self {
            Self::File { file } => Some(file),
            _ => None,
        }
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatItem {
    /// Who produced this turn
    pub role: ChatRole,

    /// Ordered value items
    pub value: Vec<ChatValue>,
}

impl ChatItem {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            value: vec![ChatValue::text(content)],
        }
    }

    pub fn human(value: Vec<ChatValue>) -> Self {
        Self {
            role: ChatRole::Human,
            value,
        }
    }

    pub fn human_text(content: impl Into<String>) -> Self {
        Self::human(vec![ChatValue::text(content)])
    }

    pub fn assistant(value: Vec<ChatValue>) -> Self {
        Self {
            role: ChatRole::Assistant,
            value,
        }
    }

    /// All text items concatenated in order.
    pub fn text_content(&self) -> String {
        self.value.iter().filter_map(ChatValue::as_text).collect()
    }

    /// File attachments in order.
    pub fn files(&self) -> impl Iterator<Item = &ChatFile> {
        self.value.iter().filter_map(ChatValue::as_file)
    }
}

/// The flat text + files view of a human turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimePrompt {
    pub text: String,
    pub files: Vec<ChatFile>,
}

impl RuntimePrompt {
    /// Split value items into concatenated text and the file list.
    pub fn from_values(values: &[ChatValue]) -> Self {
        let mut prompt = Self::default();
        for item in values {
            match item {
                ChatValue::Text { content } => prompt.text.push_str(content),
                ChatValue::File { file } => prompt.files.push(file.clone()),
                ChatValue::Tool { .. } => {}
            }
        }
        prompt
    }

    /// Rebuild value items: files first, then the text (if any).
    pub fn into_values(self) -> Vec<ChatValue> {
        let mut values: Vec<ChatValue> = self.files.into_iter().map(ChatValue::file).collect();
        if !self.text.is_empty() {
            values.push(ChatValue::text(self.text));
        }
        values
    }
}

/// The system prompt as a turn list: empty prompt, no turn.
pub fn system_prompt_items(prompt: &str) -> Vec<ChatItem> {
    if prompt.is_empty() {
        return vec![];
    }
    vec![ChatItem::system(prompt)]
}

/// Select the history window for a dispatch.
///
/// System turns are always kept. Of the remaining turns, the last
/// `2 * rounds` are kept (one round = human + assistant). `rounds == 0`
/// disables history entirely.
pub fn history_window(rounds: usize, histories: &[ChatItem]) -> Vec<ChatItem> {
    if rounds == 0 {
        return vec![];
    }

    let system = histories.iter().filter(|h| h.role == ChatRole::System);
    let dialog: Vec<&ChatItem> = histories
        .iter()
        .filter(|h| h.role != ChatRole::System)
        .collect();
    let skip = dialog.len().saturating_sub(rounds * 2);

    system
        .chain(dialog.into_iter().skip(skip))
        .cloned()
        .collect()
}

/// Every file URL attached to a human turn, in history order.
pub fn history_file_links(histories: &[ChatItem]) -> Vec<String> {
    histories
        .iter()
        .filter(|h| h.role == ChatRole::Human)
        .flat_map(|h| h.files())
        .filter(|f| !f.url.is_empty())
        .map(|f| f.url.clone())
        .collect()
}

/// A compact, text-only rendering of one transcript turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPreviewItem {
    pub role: ChatRole,
    pub content: String,
}

/// Build a text preview of a transcript for the node response.
///
/// System turns and the last two turns keep up to `size` chars at each end;
/// older turns keep 50. Image attachments are only shown when `use_vision`.
pub fn history_preview(
    messages: &[ChatItem],
    size: usize,
    use_vision: bool,
) -> Vec<HistoryPreviewItem> {
    let len = messages.len();
    messages
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let n = if item.role == ChatRole::System || i + 2 >= len {
                size
            } else {
                50
            };

            let parts: Vec<String> = item
                .value
                .iter()
                .filter_map(|v| match v {
                    ChatValue::Text { content } if !content.is_empty() => Some(content.clone()),
                    ChatValue::File { file } if file.is_document() => {
                        Some(format!("[File: {}]", file.name))
                    }
                    ChatValue::File { file } if use_vision => {
                        let url: String = file.url.chars().take(100).collect();
                        Some(format!("![Input an image]({url}...)"))
                    }
                    ChatValue::Tool { tools } => Some(
                        tools
                            .iter()
                            .map(|t| format!("<tool>{}</tool>", t.tool_name))
                            .collect::<Vec<_>>()
                            .join("\n"),
                    ),
                    _ => None,
                })
                .collect();

            HistoryPreviewItem {
                role: item.role,
                content: slice_str_start_end(&parts.join("\n"), n, n),
            }
        })
        .collect()
}
