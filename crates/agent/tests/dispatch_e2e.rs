//! End-to-end tests for agent node dispatch.
//!
//! These run the full pipeline (tool scan, file resolution, message
//! assembly, delegation, usage accounting) against a scripted delegate and
//! an in-memory file loader.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rustedflow_agent::{
    ASSISTANT_VALUE_MEMORY_KEY, AgentDispatcher, DispatchRequest, FinishReason, LlmModel,
    NodeErrorKind, StaticModelCatalog, ToolCallDelegate, ToolCallOutcome, ToolCallRequest,
    ToolFlowResponse,
};
use rustedflow_config::DispatchConfig;
use rustedflow_core::chat::{ChatFile, ChatItem, ChatRole, ChatValue, ToolCallRecord};
use rustedflow_core::error::{FileError, Result, ToolCallError};
use rustedflow_core::interactive::InteractiveState;
use rustedflow_core::usage::UsageRecord;
use rustedflow_files::{ContentCache, FileContentLoader, FileReader, LoadRequest, LoadedFile};
use rustedflow_telemetry::{ModelPrice, PointsTable};
use rustedflow_workflow::{FlowNodeType, NodeInput, RuntimeEdge, RuntimeGraph, RuntimeNode};
use serde_json::json;

const REPORT_ID: &str = "65a1b2c3d4e5f6a7b8c9d0e1";
const MISSING_ID: &str = "ffffffffffffffffffffffff";

// ── Mock delegate ────────────────────────────────────────────────────────

/// Records every request and replays a fixed outcome.
struct ScriptedDelegate {
    outcome: Option<ToolCallOutcome>,
    requests: Mutex<Vec<ToolCallRequest>>,
}

impl ScriptedDelegate {
    fn new(outcome: ToolCallOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            requests: Mutex::new(vec![]),
        }
    }

    fn failing() -> Self {
        Self {
            outcome: None,
            requests: Mutex::new(vec![]),
        }
    }

    fn last_request(&self) -> ToolCallRequest {
        self.requests.lock().unwrap().last().cloned().expect("delegate was called")
    }
}

#[async_trait]
impl ToolCallDelegate for ScriptedDelegate {
    async fn run(&self, request: ToolCallRequest) -> Result<ToolCallOutcome> {
        self.requests.lock().unwrap().push(request);
        match &self.outcome {
            Some(outcome) => Ok(outcome.clone()),
            None => Err(ToolCallError::Model("upstream returned 502".into()).into()),
        }
    }
}

// ── Mock loader ──────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingLoader {
    loads: AtomicUsize,
}

#[async_trait]
impl FileContentLoader for CountingLoader {
    async fn load(&self, request: &LoadRequest) -> std::result::Result<LoadedFile, FileError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(LoadedFile {
            filename: Some("report.pdf".into()),
            text: "Revenue grew 12% year over year.".into(),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn file_url(file_id: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "fileId": file_id, "exp": exp }).to_string());
    format!("/api/file/read/report.pdf?token={header}.{payload}.sig")
}

fn far_future() -> i64 {
    chrono::Utc::now().timestamp() + 86_400
}

fn graph() -> (RuntimeNode, RuntimeGraph) {
    let agent = RuntimeNode::new("agent", "AI Agent", FlowNodeType::Agent);
    let search = RuntimeNode::new("search", "Web Search", FlowNodeType::Tool)
        .with_input(NodeInput {
            tool_description: Some("Search query".into()),
            ..NodeInput::new("query", json!(""))
        });
    let graph = RuntimeGraph::new(
        vec![agent.clone(), search],
        vec![RuntimeEdge::tool("agent", "search")],
    );
    (agent, graph)
}

fn outcome() -> ToolCallOutcome {
    ToolCallOutcome {
        complete_messages: vec![
            ChatItem::system("sys"),
            ChatItem::human_text("Summarize"),
            ChatItem::assistant(vec![ChatValue::text("Here is the summary.")]),
        ],
        assistant_responses: vec![
            ChatValue::Tool {
                tools: vec![ToolCallRecord {
                    id: "call_1".into(),
                    tool_name: "Web Search".into(),
                    function_name: "search".into(),
                    params: r#"{"query":"revenue"}"#.into(),
                    response: "r".repeat(1200),
                }],
            },
            ChatValue::text("Here is the summary."),
        ],
        input_tokens: 1000,
        output_tokens: 1000,
        run_times: 2,
        finish_reason: FinishReason::Stop,
        tool_flows: vec![
            ToolFlowResponse {
                usages: vec![UsageRecord::new("Web Search", 10.0)],
                responses: vec![json!({ "nodeId": "search" })],
                memories: serde_json::from_value(json!({ "search": "cached" })).unwrap(),
            },
            ToolFlowResponse {
                usages: vec![UsageRecord::new("Web Search", 5.0)],
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

fn dispatcher(delegate: Arc<ScriptedDelegate>, loader: Arc<CountingLoader>, config: DispatchConfig) -> AgentDispatcher {
    let models = StaticModelCatalog::new().with_model(LlmModel {
        vision: true,
        ..LlmModel::new("gpt-4o")
    });
    let pricing = PointsTable::empty();
    pricing.set("gpt-4o", ModelPrice::new(60.0, 40.0));

    AgentDispatcher::new(
        delegate,
        Arc::new(models),
        Arc::new(pricing),
        FileReader::with_cache(loader, Arc::new(ContentCache::new())),
    )
    .with_config(config)
}

fn traditional_config() -> DispatchConfig {
    let mut config = DispatchConfig::default();
    config.files.auto_inject_file_content = false;
    config
}

fn request_with_file(agent: RuntimeNode, graph: RuntimeGraph) -> DispatchRequest {
    let mut request = DispatchRequest::new(agent, graph, "gpt-4o", "Summarize");
    request.query = vec![
        ChatValue::file(ChatFile::document("report.pdf", file_url(REPORT_ID, far_future()))),
        ChatValue::text("Summarize"),
    ];
    request
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn traditional_mode_lists_files_after_the_question() {
    let delegate = Arc::new(ScriptedDelegate::new(outcome()));
    let (agent, graph) = graph();
    let dispatcher = dispatcher(delegate.clone(), Arc::default(), traditional_config());

    dispatcher.dispatch(request_with_file(agent, graph)).await.unwrap();

    let request = delegate.last_request();
    let current = request.messages.last().unwrap();
    assert_eq!(current.role, ChatRole::Human);
    assert!(current.value[0].as_file().is_some());

    let text = current.text_content();
    let count = text.find("Document：1\nImage：0").unwrap();
    let question = text.find("Summarize").unwrap();
    let listing = text.find("Available files").unwrap();
    assert!(count < question && question < listing);
    assert!(text.contains(&format!("- fileId: \"{REPORT_ID}\", name: \"report.pdf\"")));

    assert_eq!(request.tools.len(), 1);
    assert_eq!(request.tools[0].function_name(), "search");
    assert_eq!(request.max_run_tool_times, 100);
}

#[tokio::test]
async fn resuming_on_the_entry_node_drops_two_messages() {
    let (agent, graph) = graph();
    let histories = vec![
        ChatItem::human_text("q1"),
        ChatItem::assistant(vec![ChatValue::text("a1")]),
    ];

    let fresh = Arc::new(ScriptedDelegate::new(outcome()));
    let mut request = request_with_file(agent.clone(), graph.clone());
    request.histories = histories.clone();
    dispatcher(fresh.clone(), Arc::default(), traditional_config())
        .dispatch(request)
        .await
        .unwrap();

    let resumed = Arc::new(ScriptedDelegate::new(outcome()));
    let entry = RuntimeNode { is_entry: true, ..agent };
    let mut request = request_with_file(entry, graph);
    request.histories = histories;
    request.last_interactive = Some(InteractiveState::default());
    dispatcher(resumed.clone(), Arc::default(), traditional_config())
        .dispatch(request)
        .await
        .unwrap();

    let n = fresh.last_request().messages.len();
    assert_eq!(resumed.last_request().messages.len(), n - 2);
}

#[tokio::test]
async fn delegate_sees_the_agent_entry_consumed() {
    let (agent, graph) = graph();
    let entry = RuntimeNode { is_entry: true, ..agent };
    let graph = RuntimeGraph::new(
        graph
            .nodes
            .into_iter()
            .map(|n| if n.node_id == "agent" { entry.clone() } else { n })
            .collect(),
        graph.edges,
    );
    let delegate = Arc::new(ScriptedDelegate::new(outcome()));

    dispatcher(delegate.clone(), Arc::default(), DispatchConfig::default())
        .dispatch(DispatchRequest::new(entry, graph, "gpt-4o", "hi"))
        .await
        .unwrap();

    let request = delegate.last_request();
    assert!(!request.graph.node("agent").unwrap().is_entry);
    assert_eq!(request.graph.nodes.len(), 2);
}

#[tokio::test]
async fn usage_sums_model_and_tool_points() {
    let (agent, graph) = graph();
    let delegate = Arc::new(ScriptedDelegate::new(outcome()));
    let out = dispatcher(delegate, Arc::default(), DispatchConfig::default())
        .dispatch(DispatchRequest::new(agent, graph, "gpt-4o", "Summarize"))
        .await
        .unwrap();

    assert_eq!(out.node_response.total_points, 115.0);
    assert_eq!(out.node_response.child_total_points, 15.0);
    assert_eq!(out.usages.len(), 3);
    assert_eq!(out.usages[0].total_points, 100.0);
    assert_eq!(out.node_response.merge_sign_id, "agent");
    assert_eq!(out.node_response.tool_detail.len(), 1);
    assert_eq!(out.run_times, 2);
}

#[tokio::test]
async fn external_provider_key_zeroes_model_points() {
    let (agent, graph) = graph();
    let delegate = Arc::new(ScriptedDelegate::new(outcome()));
    let mut request = DispatchRequest::new(agent, graph, "gpt-4o", "Summarize");
    request.external_provider_key = true;

    let out = dispatcher(delegate, Arc::default(), DispatchConfig::default())
        .dispatch(request)
        .await
        .unwrap();

    assert_eq!(out.usages[0].total_points, 0.0);
    assert_eq!(out.node_response.total_points, 15.0);
}

#[tokio::test]
async fn tool_responses_are_trimmed_and_memories_merged() {
    let (agent, graph) = graph();
    let delegate = Arc::new(ScriptedDelegate::new(outcome()));
    let out = dispatcher(delegate, Arc::default(), DispatchConfig::default())
        .dispatch(DispatchRequest::new(agent, graph, "gpt-4o", "Summarize"))
        .await
        .unwrap();

    assert_eq!(out.answer_text, "Here is the summary.");
    let ChatValue::Tool { tools } = &out.assistant_responses[0] else {
        panic!("expected a tool item");
    };
    assert!(tools[0].response.contains("[hide 200 chars]"));

    assert_eq!(out.memories["search"], json!("cached"));
    let saved = &out.memories[ASSISTANT_VALUE_MEMORY_KEY];
    let saved_response = saved[0]["tools"][0]["response"].as_str().unwrap();
    assert_eq!(saved_response.len(), 1200);
}

#[tokio::test]
async fn unresolved_file_ids_do_not_abort_the_dispatch() {
    let (agent, graph) = graph();
    let delegate = Arc::new(ScriptedDelegate::new(outcome()));
    let loader = Arc::new(CountingLoader::default());

    let mut request = request_with_file(agent, graph);
    request.file_url_list = Some(vec![REPORT_ID.into(), MISSING_ID.into()]);

    let out = dispatcher(delegate.clone(), loader.clone(), DispatchConfig::default())
        .dispatch(request)
        .await
        .unwrap();

    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(out.node_response.file_errors.len(), 1);
    assert!(out.node_response.file_errors[0].contains(MISSING_ID));

    let system = delegate.last_request().messages[0].text_content();
    assert!(system.contains("Revenue grew 12% year over year."));
    assert!(system.contains("--- File Access Errors ---"));
}

#[tokio::test]
async fn delegate_failure_becomes_a_node_error() {
    let (agent, graph) = graph();
    let err = dispatcher(Arc::new(ScriptedDelegate::failing()), Arc::default(), DispatchConfig::default())
        .dispatch(DispatchRequest::new(agent, graph, "gpt-4o", "hi"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, NodeErrorKind::ToolCall);
    assert!(err.message.contains("upstream returned 502"));
}

#[tokio::test]
async fn unknown_model_becomes_a_node_error() {
    let (agent, graph) = graph();
    let delegate = Arc::new(ScriptedDelegate::new(outcome()));
    let err = dispatcher(delegate.clone(), Arc::default(), DispatchConfig::default())
        .dispatch(DispatchRequest::new(agent, graph, "no-such-model", "hi"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, NodeErrorKind::ModelNotFound);
    assert!(delegate.requests.lock().unwrap().is_empty());
}
