//! Agent node dispatch for RustedFlow.
//!
//! An agent node hands a conversation and a set of tool nodes to a
//! tool-calling model. This crate prepares everything around that loop:
//!
//! 1. **Scan** the workflow graph for the agent's tools
//! 2. **Resolve** file ids and URLs into document text
//! 3. **Assemble** system prompt, history window and current turn
//! 4. **Delegate** the tool-call rounds to a [`ToolCallDelegate`]
//! 5. **Account** usage and trim tool responses for display and context
//!
//! The loop itself is not implemented here; callers plug it in through
//! [`ToolCallDelegate`].

pub mod assembler;
pub mod delegate;
pub mod dispatch;
pub mod filter;
pub mod model;
pub mod prompt;
pub mod read_files;

pub use assembler::{FileMetadataMode, MessageAssembly, adapt_user_input, assemble_messages, concat_system_prompt};
pub use delegate::{
    FinishReason, MAX_RUN_TOOL_TIMES, ToolCallDelegate, ToolCallOutcome, ToolCallRequest, ToolFlowResponse,
};
pub use dispatch::{
    ASSISTANT_VALUE_MEMORY_KEY, AgentDispatcher, DispatchOutput, DispatchRequest, MultiInput,
    MultiInputRequest, NodeError, NodeErrorKind, NodeResponse, RunningUser, get_multi_input,
};
pub use filter::{
    answer_text, filter_tool_response_for_context, filter_tool_response_to_preview, filter_tool_responses,
    format_tool_response,
};
pub use model::{LlmModel, ModelCatalog, StaticModelCatalog};
pub use read_files::{
    HISTORY_FILES_VERSION, ReadFileItem, ReadFilesNodeRequest, ReadFilesOutput, dispatch_read_files,
    dispatch_read_files_at,
};
