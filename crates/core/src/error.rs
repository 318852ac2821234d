//! Error types for the RustedFlow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all RustedFlow operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- File resolution errors ---
    #[error("File error: {0}")]
    File(#[from] FileError),

    // --- Tool-call loop errors ---
    #[error("Tool call error: {0}")]
    ToolCall(#[from] ToolCallError),

    // --- Model lookup ---
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A per-file problem. These are collected and rendered as text,
/// never used to abort a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("File expired: \"{name}\" (fileId: {file_id}). Please re-upload the file.")]
    Expired { name: String, file_id: String },

    #[error("File not found: fileId \"{file_id}\". It may not be in this conversation.")]
    NotFound { file_id: String },

    #[error("Load file error: {reason}")]
    LoadFailed { url: String, reason: String },

    #[error("Url is invalid: {0}")]
    InvalidUrl(String),
}

impl FileError {
    /// The URL or file id this error refers to.
    pub fn subject(&self) -> &str {
        match self {
            Self::Expired { file_id, .. } | Self::NotFound { file_id } => file_id,
            Self::LoadFailed { url, .. } | Self::InvalidUrl(url) => url,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolCallError {
    #[error("Model request failed: {0}")]
    Model(String),

    #[error("Tool {tool_name} failed: {reason}")]
    ToolFailed { tool_name: String, reason: String },

    #[error("Tool call loop aborted: {0}")]
    Aborted(String),
}
