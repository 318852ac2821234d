//! Agent node dispatch.
//!
//! One call to [`AgentDispatcher::dispatch`] runs a tool-calling agent node
//! end to end:
//!
//! 1. **Scan** the graph for the agent's tools
//! 2. **Resolve** referenced files and read their content
//! 3. **Assemble** system prompt, history and the current turn
//! 4. **Delegate** the tool-call rounds
//! 5. **Aggregate** usage and filter tool responses into the node result
//!
//! Per-file problems never fail the dispatch. Any other error is converted
//! once, here, into a [`NodeError`].

use crate::assembler::{FileMetadataMode, MessageAssembly, assemble_messages, concat_system_prompt};
use crate::delegate::{FinishReason, MAX_RUN_TOOL_TIMES, ToolCallDelegate, ToolCallRequest};
use crate::filter::{answer_text, filter_tool_response_for_context, filter_tool_response_to_preview};
use crate::model::ModelCatalog;
use chrono::{DateTime, Utc};
use rustedflow_config::{DispatchConfig, FileSelectConfig, FileSettings};
use rustedflow_core::chat::{
    ChatFile, ChatItem, ChatValue, HistoryPreviewItem, RuntimePrompt, history_file_links,
    history_preview, history_window,
};
use rustedflow_core::error::{Error, FileError};
use rustedflow_core::interactive::InteractiveState;
use rustedflow_core::usage::UsageRecord;
use rustedflow_files::{
    FileContents, FileIdIndex, FileReader, ReadFilesRequest, render_file_errors,
};
use rustedflow_telemetry::{CostModel, ModelUsage, aggregate_usage};
use rustedflow_workflow::{FILE_URL_LIST_KEY, RuntimeGraph, RuntimeNode, scan_tools};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Memory key holding the context view of the assistant responses.
pub const ASSISTANT_VALUE_MEMORY_KEY: &str = "__assistant_value_for_save";

/// Default number of history rounds.
pub const DEFAULT_HISTORY_ROUNDS: usize = 6;

/// The user the workflow runs on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningUser {
    pub team_id: String,
    pub tmb_id: String,
}

/// Input of one agent node dispatch.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// The agent node being run
    pub node: RuntimeNode,

    /// Full node/edge snapshot of the workflow
    pub graph: RuntimeGraph,

    /// Conversation so far, oldest first
    pub histories: Vec<ChatItem>,

    /// Value items of the current turn
    pub query: Vec<ChatValue>,

    pub user_chat_input: String,
    pub system_prompt: String,
    pub model: String,

    /// File URLs or file ids to read; `None` falls back to the node input
    pub file_url_list: Option<Vec<String>>,

    /// History rounds to keep
    pub history: usize,

    pub ai_chat_vision: bool,
    pub ai_chat_reasoning: bool,

    pub chat_config: Option<FileSelectConfig>,
    pub last_interactive: Option<InteractiveState>,
    pub request_origin: Option<String>,

    /// The caller pays the model provider directly
    pub external_provider_key: bool,

    pub running_user: RunningUser,
    pub usage_id: Option<String>,
}

impl DispatchRequest {
    pub fn new(
        node: RuntimeNode,
        graph: RuntimeGraph,
        model: impl Into<String>,
        user_chat_input: impl Into<String>,
    ) -> Self {
        Self {
            node,
            graph,
            histories: vec![],
            query: vec![],
            user_chat_input: user_chat_input.into(),
            system_prompt: String::new(),
            model: model.into(),
            file_url_list: None,
            history: DEFAULT_HISTORY_ROUNDS,
            ai_chat_vision: true,
            ai_chat_reasoning: true,
            chat_config: None,
            last_interactive: None,
            request_origin: None,
            external_provider_key: false,
            running_user: RunningUser::default(),
            usage_id: None,
        }
    }

    /// Non-empty file list from the request or the node's `fileUrlList`
    /// input.
    pub fn file_links(&self) -> Option<Vec<String>> {
        let links = match &self.file_url_list {
            Some(links) => links.clone(),
            None => self
                .node
                .input(FILE_URL_LIST_KEY)
                .and_then(|input| input.value.as_array())
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };
        Some(links).filter(|l: &Vec<String>| !l.is_empty())
    }
}

/// Summary shown in the node's run detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResponse {
    /// Own points plus every tool flow's points
    pub total_points: f64,
    pub tool_call_input_tokens: u32,
    pub tool_call_output_tokens: u32,
    pub child_total_points: f64,
    pub model: String,
    pub query: String,
    pub history_preview: Vec<HistoryPreviewItem>,
    pub tool_detail: Vec<Value>,
    pub merge_sign_id: String,
    pub finish_reason: FinishReason,

    /// Human-readable per-file problems
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_errors: Vec<String>,
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutput {
    pub answer_text: String,

    /// Assistant items with tool responses cut to the preview limit
    pub assistant_responses: Vec<ChatValue>,

    /// Tool flow memories plus the context copy of the responses
    pub memories: Map<String, Value>,

    pub node_response: NodeResponse,

    /// Own record first, then every tool record
    pub usages: Vec<UsageRecord>,

    pub run_times: u32,

    /// Replay on the next request to resume
    pub interactive: Option<InteractiveState>,
}

/// Category of a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeErrorKind {
    ModelNotFound,
    ToolCall,
    File,
    Config,
    Internal,
}

/// The uniform failure result of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct NodeError {
    pub kind: NodeErrorKind,
    pub message: String,
}

impl From<Error> for NodeError {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::ModelNotFound(_) => NodeErrorKind::ModelNotFound,
            Error::ToolCall(_) => NodeErrorKind::ToolCall,
            Error::File(_) => NodeErrorKind::File,
            Error::Config { .. } => NodeErrorKind::Config,
            Error::Serialization(_) | Error::Internal(_) => NodeErrorKind::Internal,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Input of [`get_multi_input`].
#[derive(Debug, Clone, Copy)]
pub struct MultiInputRequest<'a> {
    /// Requested URLs or file ids; `None` means no file quote
    pub file_links: Option<&'a [String]>,

    /// Files attached to the current turn
    pub input_files: &'a [ChatFile],

    /// History window
    pub histories: &'a [ChatItem],

    pub settings: &'a FileSettings,
    pub request_origin: Option<&'a str>,
    pub running_user: &'a RunningUser,
    pub usage_id: Option<&'a str>,
    pub now: DateTime<Utc>,
}

/// Files prepared for message assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiInput {
    /// Read content (plus the file error block), quoted into the system prompt
    pub document_quote_text: String,

    /// Files attached to the current human turn
    pub user_files: Vec<ChatFile>,

    pub file_errors: Vec<FileError>,
}

/// Resolve and read the files an agent node references.
///
/// Without file links, or with content injection off, nothing is read and
/// the current turn's files pass through unchanged.
pub async fn get_multi_input(reader: &FileReader, request: MultiInputRequest<'_>) -> MultiInput {
    let links = match request.file_links {
        Some(links) if request.settings.auto_inject_file_content => links,
        _ => {
            return MultiInput {
                user_files: request.input_files.to_vec(),
                ..Default::default()
            };
        }
    };

    let index = FileIdIndex::build(request.input_files, request.histories);
    let resolution = index.resolve(links, request.now);

    let mut urls = resolution.urls.clone();
    urls.extend(history_file_links(request.histories));

    let contents = if urls.is_empty() {
        FileContents::default()
    } else {
        reader
            .read(&ReadFilesRequest {
                urls,
                request_origin: request.request_origin.map(str::to_string),
                max_files: request.settings.max_files,
                custom_pdf_parse: request.settings.custom_pdf_parse,
                team_id: request.running_user.team_id.clone(),
                tmb_id: request.running_user.tmb_id.clone(),
                usage_id: request.usage_id.map(str::to_string),
            })
            .await
    };

    let error_block = render_file_errors(&resolution.errors);
    let document_quote_text = if contents.text.is_empty() {
        error_block.trim_start().to_string()
    } else {
        format!("{}{error_block}", contents.text)
    };

    let mut file_errors = resolution.errors.clone();
    file_errors.extend(contents.errors().cloned());
    if !file_errors.is_empty() {
        warn!(errors = file_errors.len(), "Some referenced files could not be read");
    }

    MultiInput {
        document_quote_text,
        user_files: resolution.files,
        file_errors,
    }
}

/// Runs agent nodes against a tool-call delegate.
pub struct AgentDispatcher {
    delegate: Arc<dyn ToolCallDelegate>,
    models: Arc<dyn ModelCatalog>,
    cost_model: Arc<dyn CostModel>,
    reader: FileReader,
    config: DispatchConfig,
}

impl AgentDispatcher {
    pub fn new(
        delegate: Arc<dyn ToolCallDelegate>,
        models: Arc<dyn ModelCatalog>,
        cost_model: Arc<dyn CostModel>,
        reader: FileReader,
    ) -> Self {
        Self {
            delegate,
            models,
            cost_model,
            reader,
            config: DispatchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run one agent node. Never panics; every failure becomes a
    /// [`NodeError`].
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchOutput, NodeError> {
        let node_id = request.node.node_id.clone();
        self.run(request).await.map_err(|e| {
            warn!(node_id = %node_id, error = %e, "Agent dispatch failed");
            NodeError::from(e)
        })
    }

    async fn run(&self, request: DispatchRequest) -> rustedflow_core::Result<DispatchOutput> {
        let model = self.models.resolve(&request.model)?;
        let use_vision = request.ai_chat_vision && model.vision;
        let use_reasoning = request.ai_chat_reasoning && model.reasoning;

        info!(
            node_id = %request.node.node_id,
            model = %model.model,
            resuming = request.last_interactive.is_some(),
            "Dispatching agent node"
        );

        let chat_histories = history_window(request.history, &request.histories);
        let view = scan_tools(&request.node, &request.graph.nodes, &request.graph.edges);
        debug!(tools = ?view.tool_ids(), "Agent tools");

        let settings = self.config.file_settings(request.chat_config.as_ref());
        let file_links = request.file_links();
        let input_files = RuntimePrompt::from_values(&request.query).files;

        let multi = get_multi_input(&self.reader, MultiInputRequest {
            file_links: file_links.as_deref(),
            input_files: &input_files,
            histories: &chat_histories,
            settings: &settings,
            request_origin: request.request_origin.as_deref(),
            running_user: &request.running_user,
            usage_id: request.usage_id.as_deref(),
            now: Utc::now(),
        })
        .await;

        let system_prompt = concat_system_prompt(
            model.default_system_chat_prompt.as_deref(),
            &request.system_prompt,
            &multi.document_quote_text,
        );

        let messages = assemble_messages(&MessageAssembly {
            system_prompt: &system_prompt,
            histories: &chat_histories,
            user_chat_input: &request.user_chat_input,
            user_files: &multi.user_files,
            file_metadata: FileMetadataMode::for_settings(&settings),
            resume_interactive_entry: request.last_interactive.is_some() && view.was_entry,
        });

        let max_run_tool_times = self.config.max_run_tool_times.clamp(1, MAX_RUN_TOOL_TIMES);
        let graph = view.consumed_graph(&request.graph);
        let outcome = self
            .delegate
            .run(ToolCallRequest {
                messages,
                tools: view.tools,
                graph,
                model: model.clone(),
                vision: use_vision,
                reasoning: use_reasoning,
                interactive_tool_params: request
                    .last_interactive
                    .as_ref()
                    .and_then(|state| state.tool_params.clone()),
                max_run_tool_times,
            })
            .await?;

        let usage = aggregate_usage(
            self.cost_model.as_ref(),
            &ModelUsage {
                module_name: request.node.name.clone(),
                model: model.model.clone(),
                input_tokens: outcome.input_tokens,
                output_tokens: outcome.output_tokens,
            },
            request.external_provider_key,
            outcome.tool_flows.iter().map(|flow| flow.usages.as_slice()),
        );

        let limits = &self.config.tool_response;
        let preview_responses = filter_tool_response_to_preview(&outcome.assistant_responses, limits);
        let context_responses = filter_tool_response_for_context(&outcome.assistant_responses, limits);

        let mut memories = Map::new();
        for flow in &outcome.tool_flows {
            memories.extend(flow.memories.clone());
        }
        memories.insert(
            ASSISTANT_VALUE_MEMORY_KEY.to_string(),
            serde_json::to_value(&context_responses)?,
        );

        let node_response = NodeResponse {
            total_points: usage.total_points,
            tool_call_input_tokens: outcome.input_tokens,
            tool_call_output_tokens: outcome.output_tokens,
            child_total_points: usage.tool_points,
            model: usage.model_name.clone(),
            query: request.user_chat_input.clone(),
            history_preview: history_preview(
                &outcome.complete_messages,
                self.config.history_preview_chars,
                use_vision,
            ),
            tool_detail: outcome
                .tool_flows
                .iter()
                .flat_map(|flow| flow.responses.iter().cloned())
                .collect(),
            merge_sign_id: request.node.node_id.clone(),
            finish_reason: outcome.finish_reason,
            file_errors: multi.file_errors.iter().map(ToString::to_string).collect(),
        };

        info!(
            node_id = %request.node.node_id,
            run_times = outcome.run_times,
            total_points = usage.total_points,
            finish_reason = ?outcome.finish_reason,
            interactive = outcome.interactive.is_some(),
            "Agent node finished"
        );

        Ok(DispatchOutput {
            answer_text: answer_text(&preview_responses),
            assistant_responses: preview_responses,
            memories,
            node_response,
            usages: usage.records,
            run_times: outcome.run_times,
            interactive: outcome.interactive,
        })
    }
}
