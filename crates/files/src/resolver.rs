//! Resolve file tokens (file ids or raw URLs) against the files visible in a
//! conversation.

use crate::file_id::{FileReference, is_valid_file_id};
use crate::file_type::parse_url_to_file;
use chrono::{DateTime, Utc};
use rustedflow_core::chat::{ChatFile, ChatItem, ChatRole};
use rustedflow_core::error::FileError;
use std::collections::HashMap;
use tracing::debug;

/// Lookup table from file id to the attachment it was extracted from.
#[derive(Debug, Clone, Default)]
pub struct FileIdIndex {
    by_id: HashMap<String, FileReference>,
}

/// Outcome of resolving a token list: usable URLs plus per-file errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub urls: Vec<String>,

    /// Attachments for the resolved URLs; indexed ids keep their display
    /// name, literal URLs are typed by extension
    pub files: Vec<ChatFile>,

    pub errors: Vec<FileError>,
}

impl Resolution {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl FileIdIndex {
    /// Index document attachments of prior human turns, then the current
    /// turn's files. Later entries win, so the current turn overrides
    /// history when both carry the same id.
    pub fn build(current_files: &[ChatFile], histories: &[ChatItem]) -> Self {
        let mut index = Self::default();

        let history_docs = histories
            .iter()
            .filter(|h| h.role == ChatRole::Human)
            .flat_map(|h| h.files())
            .filter(|f| f.is_document());

        for file in history_docs.chain(current_files.iter()) {
            if file.url.is_empty() {
                continue;
            }
            let reference = FileReference::from_chat_file(file);
            if let Some(id) = reference.file_id.clone() {
                index.by_id.insert(id.to_ascii_lowercase(), reference);
            }
        }

        debug!(files = index.by_id.len(), "Built file id index");
        index
    }

    pub fn get(&self, file_id: &str) -> Option<&FileReference> {
        self.by_id.get(&file_id.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Resolve each token to a URL.
    ///
    /// Tokens in file id format are looked up in the index; anything else is
    /// passed through as a literal URL. Unknown and expired ids become
    /// errors; resolution itself never fails.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S], now: DateTime<Utc>) -> Resolution {
        let mut resolution = Resolution::default();

        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }

            if !is_valid_file_id(token) {
                debug!(token, "Not a file id, treating as URL");
                resolution.urls.push(token.to_string());
                resolution.files.extend(parse_url_to_file(token));
                continue;
            }

            match self.get(token) {
                Some(reference) if reference.is_expired_at(now) => {
                    debug!(file_id = token, name = %reference.name, "File token expired");
                    resolution.errors.push(FileError::Expired {
                        name: reference.name.clone(),
                        file_id: token.to_string(),
                    });
                }
                Some(reference) => {
                    resolution.urls.push(reference.url.clone());
                    resolution.files.push(ChatFile {
                        kind: reference.kind,
                        name: reference.name.clone(),
                        url: reference.url.clone(),
                    });
                }
                None => {
                    debug!(file_id = token, "File id not found in conversation");
                    resolution.errors.push(FileError::NotFound {
                        file_id: token.to_string(),
                    });
                }
            }
        }

        resolution
    }
}

/// Render per-file errors as the block appended to tool output.
///
/// Returns an empty string when there are no errors.
pub fn render_file_errors(errors: &[FileError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!(
        "\n\n--- File Access Errors ---\n{}\n--- End of Errors ---",
        lines.join("\n")
    )
}
