//! Workflow runtime graph: nodes, edges and agent tool discovery.
//!
//! The graph is owned by the request. Scanning for tools and activating tool
//! entry points produce new values instead of flipping flags in place.

pub mod graph;
pub mod scanner;

pub use graph::{
    EdgeStatus, FILE_URL_LIST_KEY, FlowNodeType, NodeInput, RuntimeEdge, RuntimeGraph, RuntimeNode,
    SELECTED_TOOLS_HANDLE, TOOL_DATA_KEY, ToolNode, ToolSchema,
};
pub use scanner::{
    ToolGraphView, activate_tool_entry, scan_tools, tool_node_ids, update_tool_input_values,
};
