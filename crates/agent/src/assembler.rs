//! Conversation assembly for the tool-call loop.
//!
//! Produces the ordered turn list handed to the delegate: the concatenated
//! system prompt, the history window, then the current human turn. Human
//! turns carrying files get a file metadata note in one of two modes:
//!
//! - **Inline**: a compact block prepended to the first text item; file
//!   items are dropped since their metadata is now in the text.
//! - **Traditional**: a count prompt wraps the first text item and a
//!   `fileId: name` list is appended after it.
//!
//! No note is added when file content is injected into the system prompt.

use crate::prompt::{
    SYSTEM_PROMPT_SEPARATOR, document_quote_prompt, inline_file_metadata, multiple_prompt,
    traditional_file_list,
};
use rustedflow_config::FileSettings;
use rustedflow_core::chat::{
    ChatFile, ChatFileType, ChatItem, ChatRole, ChatValue, RuntimePrompt, system_prompt_items,
};

/// How file metadata is written into human turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMetadataMode {
    Inline,
    Traditional,
}

impl FileMetadataMode {
    /// The mode in effect, or `None` when file content is injected
    /// automatically and no metadata note is needed.
    pub fn for_settings(settings: &FileSettings) -> Option<Self> {
        if settings.auto_inject_file_content {
            return None;
        }
        Some(if settings.inline_file_metadata {
            Self::Inline
        } else {
            Self::Traditional
        })
    }
}

/// Add the file metadata note to one human turn's values.
///
/// Turns without files are returned unchanged.
pub fn adapt_user_input(values: &[ChatValue], mode: FileMetadataMode) -> Vec<ChatValue> {
    let files: Vec<&ChatFile> = values.iter().filter_map(ChatValue::as_file).collect();
    if files.is_empty() {
        return values.to_vec();
    }

    let documents: Vec<&ChatFile> = files
        .iter()
        .copied()
        .filter(|f| f.kind == ChatFileType::File)
        .collect();
    let images: Vec<&ChatFile> = files
        .iter()
        .copied()
        .filter(|f| f.kind == ChatFileType::Image)
        .collect();

    let first_text = values.iter().position(|v| v.as_text().is_some());

    match mode {
        FileMetadataMode::Inline => {
            let block = inline_file_metadata(&documents, &images);
            let Some(first) = first_text.filter(|&i| values[i].as_text().is_some_and(|t| !t.is_empty()))
            else {
                return vec![ChatValue::text(block)];
            };

            values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.as_file().is_none())
                .map(|(i, v)| match v.as_text() {
                    Some(text) if i == first => ChatValue::text(format!("{block}\n{text}")),
                    _ => v.clone(),
                })
                .collect()
        }
        FileMetadataMode::Traditional => {
            let file_list = traditional_file_list(&documents);
            let Some(first) = first_text else {
                return vec![ChatValue::text(
                    multiple_prompt(documents.len(), images.len(), "") + &file_list,
                )];
            };

            values
                .iter()
                .enumerate()
                .map(|(i, v)| match v.as_text() {
                    Some(text) if i == first => ChatValue::text(
                        multiple_prompt(documents.len(), images.len(), text) + &file_list,
                    ),
                    _ => v.clone(),
                })
                .collect()
        }
    }
}

/// Join the model's default prompt, the caller's system prompt and the
/// document quote, skipping empty parts.
pub fn concat_system_prompt(
    model_default: Option<&str>,
    system_prompt: &str,
    document_quote_text: &str,
) -> String {
    let quote = if document_quote_text.is_empty() {
        String::new()
    } else {
        document_quote_prompt(document_quote_text)
    };

    [model_default.unwrap_or_default(), system_prompt, quote.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(SYSTEM_PROMPT_SEPARATOR)
}

/// Everything needed to build the turn list.
#[derive(Debug, Clone, Copy)]
pub struct MessageAssembly<'a> {
    /// Already concatenated system prompt
    pub system_prompt: &'a str,

    /// History window, oldest first
    pub histories: &'a [ChatItem],

    pub user_chat_input: &'a str,
    pub user_files: &'a [ChatFile],

    /// `None` skips the file metadata note
    pub file_metadata: Option<FileMetadataMode>,

    /// Re-entering an interactive suspension on the entry node
    pub resume_interactive_entry: bool,
}

/// Build the ordered turn list.
///
/// When resuming an interactive suspension the last two entries are
/// dropped; the delegate rehydrates the suspended call from its own state.
pub fn assemble_messages(input: &MessageAssembly<'_>) -> Vec<ChatItem> {
    let adapt = |values: Vec<ChatValue>| match input.file_metadata {
        Some(mode) => adapt_user_input(&values, mode),
        None => values,
    };

    let mut messages = system_prompt_items(input.system_prompt);

    messages.extend(input.histories.iter().map(|item| {
        if item.role == ChatRole::Human {
            ChatItem::human(adapt(item.value.clone()))
        } else {
            item.clone()
        }
    }));

    let current = RuntimePrompt {
        text: input.user_chat_input.to_string(),
        files: input.user_files.to_vec(),
    };
    messages.push(ChatItem::human(adapt(current.into_values())));

    if input.resume_interactive_entry {
        messages.truncate(messages.len().saturating_sub(2));
    }

    messages
}
