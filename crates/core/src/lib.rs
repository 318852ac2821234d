//! # RustedFlow Core
//!
//! Domain types and error definitions for the RustedFlow agent dispatch
//! runtime. This crate has **no framework dependencies**; every other crate
//! in the workspace depends inward on it.

pub mod chat;
pub mod error;
pub mod interactive;
pub mod text;
pub mod usage;

// Re-export key types at crate root for ergonomics
pub use chat::{ChatFile, ChatFileType, ChatItem, ChatRole, ChatValue, RuntimePrompt, ToolCallRecord};
pub use error::{Error, FileError, Result, ToolCallError};
pub use interactive::{InteractiveState, InteractiveToolParams};
pub use usage::UsageRecord;
