//! In-memory model of a ComfyUI workflow in "API format".
//!
//! The expected JSON is an object where each key is a node id and each
//! value carries the node's `class_type`, its `inputs` and an optional
//! `_meta.title`:
//!
//! ```json
//! {
//!   "10": {
//!     "class_type": "LoadImage",
//!     "inputs": { "image": "source.png" },
//!     "_meta": { "title": "Source face" }
//!   }
//! }
//! ```
//!
//! Node order is the order of the source document and is significant:
//! slot discovery walks nodes in this order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GraphError;

/// A workflow graph: node id -> [`Node`], in document order.
///
/// Cloning produces a fully independent deep copy, which is what the
/// patcher relies on to keep cached templates reusable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphDocument {
    nodes: IndexMap<String, Node>,
}

/// A single node of a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Semantic node type (ComfyUI `class_type`, e.g. `"LoadImage"`).
    #[serde(rename = "class_type")]
    pub kind: String,

    /// Parameter name -> value (ComfyUI `inputs`). Literal values are
    /// scalars; links to other nodes are `[node_id, output_index]` arrays.
    #[serde(rename = "inputs", default)]
    pub parameters: IndexMap<String, Value>,

    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMeta>,

    /// Any other per-node keys, preserved untouched.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Editor metadata attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Node {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            parameters: IndexMap::new(),
            meta: None,
            extra: IndexMap::new(),
        }
    }

    /// Builder-style parameter setter, mostly for constructing fixtures.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.meta.get_or_insert_with(NodeMeta::default).title = Some(label.into());
        self
    }

    /// Human hint for the node (`_meta.title`), when the editor set one.
    pub fn display_label(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.title.as_deref())
    }

    /// Value of a parameter if it is a literal string.
    pub fn string_parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }
}

impl GraphDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a workflow from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, GraphError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Parse a workflow from an already-decoded JSON value.
    ///
    /// Structural problems are reported per node (missing `class_type`,
    /// non-object `inputs`) instead of as a generic serde message.
    pub fn from_value(value: &Value) -> Result<Self, GraphError> {
        let obj = value.as_object().ok_or(GraphError::NotAnObject)?;
        if obj.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut nodes = IndexMap::with_capacity(obj.len());
        for (node_id, node_value) in obj {
            if !node_value.is_object() {
                return Err(invalid(node_id, "node must be an object"));
            }
            match node_value.get("class_type") {
                Some(Value::String(_)) => {}
                Some(_) => return Err(invalid(node_id, "'class_type' must be a string")),
                None => return Err(invalid(node_id, "missing required 'class_type' field")),
            }
            if let Some(inputs) = node_value.get("inputs") {
                if !inputs.is_object() {
                    return Err(invalid(node_id, "'inputs' must be an object"));
                }
            }

            let node: Node = serde_json::from_value(node_value.clone())
                .map_err(|e| invalid(node_id, &e.to_string()))?;
            nodes.insert(node_id.clone(), node);
        }

        Ok(Self { nodes })
    }

    /// Serialize back to the API-format JSON value sent to the backend.
    pub fn to_value(&self) -> Value {
        // A map of derive-serializable nodes cannot fail to serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn insert_node(&mut self, id: impl Into<String>, node: Node) -> Option<Node> {
        self.nodes.insert(id.into(), node)
    }

    pub fn with_node(mut self, id: impl Into<String>, node: Node) -> Self {
        self.insert_node(id, node);
        self
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn invalid(node_id: &str, reason: &str) -> GraphError {
    GraphError::InvalidNode {
        node_id: node_id.to_string(),
        reason: reason.to_string(),
    }
}
