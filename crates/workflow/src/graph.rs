//! Runtime graph types: nodes, their declared inputs, and edges.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Target handle of the edges linking an agent to its tools.
pub const SELECTED_TOOLS_HANDLE: &str = "selectedTools";

/// Input key carrying an externally described tool (`{ inputSchema, ... }`).
pub const TOOL_DATA_KEY: &str = "toolData";

/// Input key holding a node's file URL / file id list.
pub const FILE_URL_LIST_KEY: &str = "fileUrlList";

/// The kind of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowNodeType {
    /// Tool-calling agent
    #[serde(alias = "tools")]
    Agent,
    /// A single callable tool
    Tool,
    /// A group of tools exposed through one node
    ToolSet,
    /// Document reader
    ReadFiles,
    /// Any other node; callable as a tool through its described inputs
    #[default]
    #[serde(other)]
    Other,
}

/// A declared input of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInput {
    pub key: String,

    #[serde(default)]
    pub label: String,

    /// Current value (static config or filled in at runtime)
    #[serde(default)]
    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    /// Parameter description shown to the model; set means tool-exposed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_description: Option<String>,

    #[serde(default)]
    pub required: bool,
}

impl NodeInput {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            label: String::new(),
            value,
            value_type: None,
            tool_description: None,
            required: false,
        }
    }

    /// Whether the model can fill this input when calling the node.
    pub fn is_tool_param(&self) -> bool {
        self.tool_description.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// A node of the runtime graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeNode {
    pub node_id: String,
    pub name: String,

    #[serde(default)]
    pub intro: String,

    #[serde(default)]
    pub flow_node_type: FlowNodeType,

    /// Set when the scheduler enters the graph at this node
    #[serde(default)]
    pub is_entry: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub inputs: Vec<NodeInput>,
}

impl RuntimeNode {
    pub fn new(node_id: impl Into<String>, name: impl Into<String>, kind: FlowNodeType) -> Self {
        Self {
            node_id: node_id.into(),
            name: name.into(),
            intro: String::new(),
            flow_node_type: kind,
            is_entry: false,
            version: None,
            inputs: vec![],
        }
    }

    pub fn with_input(mut self, input: NodeInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn input(&self, key: &str) -> Option<&NodeInput> {
        self.inputs.iter().find(|i| i.key == key)
    }
}

/// Edge status as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStatus {
    #[default]
    Waiting,
    Active,
    Skipped,
}

/// A directed edge between two node handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEdge {
    pub source: String,
    pub target: String,

    #[serde(default)]
    pub source_handle: String,

    #[serde(default)]
    pub target_handle: String,

    #[serde(default)]
    pub status: EdgeStatus,
}

impl RuntimeEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: String::new(),
            target_handle: String::new(),
            status: EdgeStatus::Waiting,
        }
    }

    /// An agent → tool edge.
    pub fn tool(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            target_handle: SELECTED_TOOLS_HANDLE.to_string(),
            ..Self::new(source, target)
        }
    }

    pub fn is_tool_edge(&self) -> bool {
        self.target_handle == SELECTED_TOOLS_HANDLE
    }
}

/// An owned node/edge snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeGraph {
    pub nodes: Vec<RuntimeNode>,
    pub edges: Vec<RuntimeEdge>,
}

impl RuntimeGraph {
    pub fn new(nodes: Vec<RuntimeNode>, edges: Vec<RuntimeEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, node_id: &str) -> Option<&RuntimeNode> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }
}

/// How a tool describes its parameters. A tool is described by exactly one
/// of the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "schema", rename_all = "snake_case")]
pub enum ToolSchema {
    /// Tool-exposed inputs of a graph node
    Native(Vec<NodeInput>),
    /// Raw JSON schema of an externally defined (MCP) tool
    Foreign(Value),
}

impl ToolSchema {
    /// Derive the schema from a node's inputs. A `toolData` input carrying an
    /// `inputSchema` wins over the native parameter list.
    pub fn from_inputs(inputs: &[NodeInput]) -> Self {
        let foreign = inputs
            .iter()
            .filter(|i| i.key == TOOL_DATA_KEY)
            .find_map(|i| i.value.get("inputSchema"))
            .filter(|schema| !schema.is_null());

        match foreign {
            Some(schema) => Self::Foreign(schema.clone()),
            None => Self::Native(inputs.iter().filter(|i| i.is_tool_param()).cloned().collect()),
        }
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self, Self::Foreign(_))
    }
}

/// A node callable by the agent, with its parameter description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolNode {
    pub node: RuntimeNode,
    pub schema: ToolSchema,
}

impl ToolNode {
    pub fn from_node(node: &RuntimeNode) -> Self {
        Self {
            schema: ToolSchema::from_inputs(&node.inputs),
            node: node.clone(),
        }
    }

    /// Function name exposed to the model.
    pub fn function_name(&self) -> &str {
        &self.node.node_id
    }

    pub fn description(&self) -> &str {
        if self.node.intro.is_empty() {
            &self.node.name
        } else {
            &self.node.intro
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn described(key: &str) -> NodeInput {
        NodeInput {
            tool_description: Some(format!("the {key}")),
            ..NodeInput::new(key, Value::Null)
        }
    }

    #[test]
    fn native_schema_keeps_only_described_inputs() {
        let inputs = vec![described("query"), NodeInput::new("limit", json!(5))];
        let ToolSchema::Native(params) = ToolSchema::from_inputs(&inputs) else {
            panic!("expected native schema");
        };
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].key, "query");
    }

    #[test]
    fn foreign_schema_wins() {
        let schema = json!({ "type": "object", "properties": { "q": { "type": "string" } } });
        let inputs = vec![
            described("query"),
            NodeInput::new(TOOL_DATA_KEY, json!({ "name": "search", "inputSchema": schema })),
        ];
        assert_eq!(ToolSchema::from_inputs(&inputs), ToolSchema::Foreign(schema));
    }

    #[test]
    fn tool_data_without_schema_is_native() {
        let inputs = vec![NodeInput::new(TOOL_DATA_KEY, json!({ "name": "x" }))];
        assert_eq!(ToolSchema::from_inputs(&inputs), ToolSchema::Native(vec![]));
    }

    #[test]
    fn empty_description_is_not_a_tool_param() {
        let input = NodeInput {
            tool_description: Some(String::new()),
            ..NodeInput::new("x", Value::Null)
        };
        assert!(!input.is_tool_param());
    }

    #[test]
    fn node_type_deserializes_unknown_as_other() {
        let node: RuntimeNode = serde_json::from_value(json!({
            "nodeId": "n1",
            "name": "HTTP",
            "flowNodeType": "httpRequest468"
        }))
        .unwrap();
        assert_eq!(node.flow_node_type, FlowNodeType::Other);
        assert!(!node.is_entry);
        assert!(node.inputs.is_empty());
    }

    #[test]
    fn edge_status_serializes_lowercase() {
        let mut edge = RuntimeEdge::tool("agent", "t1");
        edge.status = EdgeStatus::Active;
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["targetHandle"], SELECTED_TOOLS_HANDLE);
    }
}
