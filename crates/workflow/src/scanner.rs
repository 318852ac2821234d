//! Tool discovery and tool entry activation.
//!
//! Nothing here mutates the caller's graph: the scan and the activation both
//! return new values, so one graph snapshot can back concurrent dispatches.

use crate::graph::{
    EdgeStatus, FlowNodeType, NodeInput, RuntimeEdge, RuntimeGraph, RuntimeNode, ToolNode,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

/// Result of scanning the tools of one agent node.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolGraphView {
    /// The agent node, consumed for this dispatch (`is_entry = false`)
    pub agent: RuntimeNode,

    /// Entry flag the agent carried before the scan
    pub was_entry: bool,

    /// Callable tools, in edge order
    pub tools: Vec<ToolNode>,
}

impl ToolGraphView {
    pub fn tool_ids(&self) -> Vec<&str> {
        self.tools.iter().map(ToolNode::function_name).collect()
    }

    pub fn find_tool(&self, function_name: &str) -> Option<&ToolNode> {
        self.tools.iter().find(|t| t.function_name() == function_name)
    }

    /// A copy of `graph` with the agent node replaced by the consumed one.
    pub fn consumed_graph(&self, graph: &RuntimeGraph) -> RuntimeGraph {
        let nodes = graph
            .nodes
            .iter()
            .map(|node| {
                if node.node_id == self.agent.node_id {
                    self.agent.clone()
                } else {
                    node.clone()
                }
            })
            .collect();
        RuntimeGraph::new(nodes, graph.edges.clone())
    }
}

/// Distinct targets of `node_id`'s tool edges, in edge order.
pub fn tool_node_ids(node_id: &str, edges: &[RuntimeEdge]) -> Vec<String> {
    let mut seen = HashSet::new();
    edges
        .iter()
        .filter(|e| e.source == node_id && e.is_tool_edge())
        .filter(|e| seen.insert(e.target.as_str()))
        .map(|e| e.target.clone())
        .collect()
}

/// Collect the tools reachable from `agent`.
///
/// Tool set nodes with tool edges of their own are expanded in place into
/// those tools; a tool set without tool edges carries its tool list in its
/// inputs and is returned as a single tool. Each node is
/// visited at most once, so cycles (including edges back to the agent) end
/// the walk. Ids with no matching node are skipped.
pub fn scan_tools(agent: &RuntimeNode, nodes: &[RuntimeNode], edges: &[RuntimeEdge]) -> ToolGraphView {
    let mut visited = HashSet::from([agent.node_id.clone()]);
    let mut tools = Vec::new();
    collect_tools(&agent.node_id, nodes, edges, &mut visited, &mut tools);

    debug!(
        agent = %agent.node_id,
        tools = tools.len(),
        "Scanned agent tools"
    );

    let mut consumed = agent.clone();
    consumed.is_entry = false;

    ToolGraphView {
        agent: consumed,
        was_entry: agent.is_entry,
        tools,
    }
}

fn collect_tools(
    node_id: &str,
    nodes: &[RuntimeNode],
    edges: &[RuntimeEdge],
    visited: &mut HashSet<String>,
    tools: &mut Vec<ToolNode>,
) {
    for target in tool_node_ids(node_id, edges) {
        if !visited.insert(target.clone()) {
            debug!(node_id = %target, "Tool already visited, skipping");
            continue;
        }

        let Some(node) = nodes.iter().find(|n| n.node_id == target) else {
            debug!(node_id = %target, "Tool node not found in graph, skipping");
            continue;
        };

        let nested = node.flow_node_type == FlowNodeType::ToolSet
            && edges.iter().any(|e| e.source == node.node_id && e.is_tool_edge());
        if nested {
            collect_tools(&node.node_id, nodes, edges, visited, tools);
        } else {
            tools.push(ToolNode::from_node(node));
        }
    }
}

/// Override input values with `params[key]`; a missing or null param keeps
/// the input's own value.
pub fn update_tool_input_values(params: &Map<String, Value>, inputs: &[NodeInput]) -> Vec<NodeInput> {
    inputs
        .iter()
        .map(|input| {
            let value = params
                .get(&input.key)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| input.value.clone());
            NodeInput {
                value,
                ..input.clone()
            }
        })
        .collect()
}

/// Prepare a graph for running tool `entry_ids`.
///
/// Returns a copy where every edge into an entry node is `active` and every
/// entry node has `is_entry = true`, with its inputs filled from
/// `start_params` when given.
pub fn activate_tool_entry(
    nodes: &[RuntimeNode],
    edges: &[RuntimeEdge],
    entry_ids: &[String],
    start_params: Option<&Map<String, Value>>,
) -> RuntimeGraph {
    let is_entry = |id: &str| entry_ids.iter().any(|e| e == id);

    let edges = edges
        .iter()
        .map(|edge| {
            let mut edge = edge.clone();
            if is_entry(&edge.target) {
                edge.status = EdgeStatus::Active;
            }
            edge
        })
        .collect();

    let nodes = nodes
        .iter()
        .map(|node| {
            let mut node = node.clone();
            if is_entry(&node.node_id) {
                node.is_entry = true;
                if let Some(params) = start_params {
                    node.inputs = update_tool_input_values(params, &node.inputs);
                }
            }
            node
        })
        .collect();

    RuntimeGraph::new(nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{TOOL_DATA_KEY, ToolSchema};
    use serde_json::json;

    fn agent() -> RuntimeNode {
        let mut node = RuntimeNode::new("agent", "Agent", FlowNodeType::Agent);
        node.is_entry = true;
        node
    }

    fn tool(id: &str) -> RuntimeNode {
        RuntimeNode::new(id, id.to_uppercase(), FlowNodeType::Tool).with_input(NodeInput {
            tool_description: Some("search query".into()),
            ..NodeInput::new("query", Value::Null)
        })
    }

    #[test]
    fn tool_ids_are_ordered_and_distinct() {
        let edges = vec![
            RuntimeEdge::tool("agent", "b"),
            RuntimeEdge::tool("agent", "a"),
            RuntimeEdge::tool("agent", "b"),
            RuntimeEdge::new("agent", "next"),
            RuntimeEdge::tool("other", "c"),
        ];
        assert_eq!(tool_node_ids("agent", &edges), vec!["b", "a"]);
    }

    #[test]
    fn scan_collects_tools_and_consumes_entry() {
        let agent = agent();
        let nodes = vec![agent.clone(), tool("search"), tool("calc")];
        let edges = vec![RuntimeEdge::tool("agent", "search"), RuntimeEdge::tool("agent", "calc")];

        let view = scan_tools(&agent, &nodes, &edges);

        assert_eq!(view.tool_ids(), vec!["search", "calc"]);
        assert!(view.was_entry);
        assert!(!view.agent.is_entry);
        // caller's node untouched
        assert!(agent.is_entry);
        assert!(matches!(&view.tools[0].schema, ToolSchema::Native(p) if p.len() == 1));
    }

    #[test]
    fn missing_nodes_are_skipped() {
        let agent = agent();
        let nodes = vec![agent.clone(), tool("search")];
        let edges = vec![RuntimeEdge::tool("agent", "ghost"), RuntimeEdge::tool("agent", "search")];
        assert_eq!(scan_tools(&agent, &nodes, &edges).tool_ids(), vec!["search"]);
    }

    #[test]
    fn tool_sets_expand_and_cycles_stop() {
        let agent = agent();
        let nodes = vec![
            agent.clone(),
            RuntimeNode::new("set", "Set", FlowNodeType::ToolSet),
            tool("a"),
            tool("b"),
        ];
        let edges = vec![
            RuntimeEdge::tool("agent", "set"),
            RuntimeEdge::tool("set", "a"),
            RuntimeEdge::tool("set", "b"),
            RuntimeEdge::tool("set", "agent"),
            RuntimeEdge::tool("a", "set"),
            RuntimeEdge::tool("agent", "a"),
        ];
        assert_eq!(scan_tools(&agent, &nodes, &edges).tool_ids(), vec!["a", "b"]);
    }

    #[test]
    fn tool_set_without_edges_is_a_tool() {
        let agent = agent();
        let set: RuntimeNode = serde_json::from_value(json!({
            "nodeId": "mcpset",
            "name": "MCP tools",
            "flowNodeType": "toolSet",
            "inputs": [{ "key": "toolSetData", "value": { "toolList": [{ "name": "fetch" }] } }]
        }))
        .unwrap();
        let view = scan_tools(&agent, &[agent.clone(), set], &[RuntimeEdge::tool("agent", "mcpset")]);
        assert_eq!(view.tool_ids(), vec!["mcpset"]);
    }

    #[test]
    fn consumed_graph_clears_agent_entry() {
        let agent = agent();
        let graph = RuntimeGraph::new(
            vec![agent.clone(), tool("search")],
            vec![RuntimeEdge::tool("agent", "search")],
        );
        let view = scan_tools(&agent, &graph.nodes, &graph.edges);

        let consumed = view.consumed_graph(&graph);
        assert!(!consumed.node("agent").unwrap().is_entry);
        assert_eq!(consumed.edges, graph.edges);
        assert!(graph.node("agent").unwrap().is_entry);
    }

    #[test]
    fn foreign_tool_is_detected() {
        let agent = agent();
        let mcp = RuntimeNode::new("mcp", "MCP", FlowNodeType::Tool).with_input(NodeInput::new(
            TOOL_DATA_KEY,
            json!({ "inputSchema": { "type": "object" } }),
        ));
        let view = scan_tools(&agent, &[agent.clone(), mcp], &[RuntimeEdge::tool("agent", "mcp")]);
        assert!(view.find_tool("mcp").unwrap().schema.is_foreign());
    }

    #[test]
    fn update_inputs_prefers_params() {
        let inputs = vec![
            NodeInput::new("q", json!("default")),
            NodeInput::new("n", json!(1)),
            NodeInput::new("m", json!(2)),
        ];
        let params = json!({ "q": "rust", "m": null }).as_object().cloned().unwrap();
        let updated = update_tool_input_values(&params, &inputs);
        assert_eq!(updated[0].value, json!("rust"));
        assert_eq!(updated[1].value, json!(1));
        assert_eq!(updated[2].value, json!(2));
    }

    #[test]
    fn activation_returns_new_graph() {
        let nodes = vec![agent(), tool("search"), tool("calc")];
        let edges = vec![RuntimeEdge::tool("agent", "search"), RuntimeEdge::tool("agent", "calc")];
        let params = json!({ "query": "weather" }).as_object().cloned().unwrap();

        let graph = activate_tool_entry(&nodes, &edges, &["search".to_string()], Some(&params));

        assert_eq!(graph.edges[0].status, EdgeStatus::Active);
        assert_eq!(graph.edges[1].status, EdgeStatus::Waiting);
        let search = graph.node("search").unwrap();
        assert!(search.is_entry);
        assert_eq!(search.inputs[0].value, json!("weather"));
        assert!(!graph.node("calc").unwrap().is_entry);
        // input slices untouched
        assert_eq!(edges[0].status, EdgeStatus::Waiting);
        assert!(!nodes[1].is_entry);
    }
}
