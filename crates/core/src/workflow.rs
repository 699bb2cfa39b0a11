//! Typed model of a ComfyUI API-format workflow.
//!
//! The raw template file is an object keyed by node ID:
//!
//! ```json
//! {
//!   "13": {
//!     "class_type": "LoadAudio",
//!     "inputs": { "audio": "clip.wav" },
//!     "_meta": { "title": "Load Audio" }
//!   }
//! }
//! ```
//!
//! JSON is only handled at the boundary ([`Workflow::from_json`] and
//! [`Workflow::to_json`]). Inside the crate a node's inputs are a map of
//! [`InputValue`] and nodes are indexed by `class_type` once, at load time.
//! Node order from the file is kept end to end.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Input values
// ---------------------------------------------------------------------------

/// Reference to another node's output slot: `["<node id>", <slot>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLink(pub String, pub u32);

/// A single input value on a workflow node.
///
/// Variants are tried in declaration order when deserializing, so a
/// two-element `[string, int]` array becomes a [`Link`](Self::Link) and
/// anything unrecognised is kept verbatim in [`Other`](Self::Other).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Link(NodeLink),
    Bool(bool),
    Integer(i64),
    /// Seeds above `i64::MAX` are legal in ComfyUI.
    Unsigned(u64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl InputValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            InputValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            InputValue::Integer(n) => Some(*n),
            InputValue::Unsigned(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Text(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::Text(value)
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        InputValue::Integer(value)
    }
}

impl From<u32> for InputValue {
    fn from(value: u32) -> Self {
        InputValue::Integer(i64::from(value))
    }
}

impl From<u64> for InputValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(n) => InputValue::Integer(n),
            Err(_) => InputValue::Unsigned(value),
        }
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        InputValue::Float(value)
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Bool(value)
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A single node of a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// ComfyUI class type (e.g. "LoadAudio", "WanVideoSampler").
    pub class_type: String,
    #[serde(default)]
    pub inputs: IndexMap<String, InputValue>,
    /// Fields other than `class_type` and `inputs` (`_meta`, etc.),
    /// passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A loaded workflow template, or an injected copy of one.
///
/// Nodes keep the order they have in the template file. "The first node
/// of a type" means the first one in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    nodes: IndexMap<String, WorkflowNode>,
    /// Node IDs per `class_type`, in file order.
    by_type: HashMap<String, Vec<String>>,
}

impl Workflow {
    /// Build a workflow from already-typed nodes, keeping their order.
    pub fn from_nodes(nodes: IndexMap<String, WorkflowNode>) -> Self {
        let mut by_type: HashMap<String, Vec<String>> = HashMap::new();
        for (id, node) in &nodes {
            by_type
                .entry(node.class_type.clone())
                .or_default()
                .push(id.clone());
        }
        Self { nodes, by_type }
    }

    /// Parse an API-format workflow JSON object.
    ///
    /// Fails when the value is not an object, has no nodes, or a node
    /// lacks a string `class_type`.
    pub fn from_json(json: serde_json::Value) -> Result<Self, CoreError> {
        let obj = match json {
            serde_json::Value::Object(obj) => obj,
            _ => {
                return Err(CoreError::InvalidTemplate(
                    "Workflow JSON must be an object".to_string(),
                ))
            }
        };

        if obj.is_empty() {
            return Err(CoreError::InvalidTemplate(
                "Workflow JSON must contain at least one node".to_string(),
            ));
        }

        let mut nodes = IndexMap::with_capacity(obj.len());
        for (node_id, node_value) in obj {
            let node: WorkflowNode = serde_json::from_value(node_value).map_err(|e| {
                CoreError::InvalidTemplate(format!("Node '{node_id}' is malformed: {e}"))
            })?;
            nodes.insert(node_id, node);
        }

        Ok(Self::from_nodes(nodes))
    }

    /// Render back to the JSON shape the engine's `/prompt` endpoint expects.
    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        serde_json::to_value(self)
            .map_err(|e| CoreError::InvalidTemplate(format!("Failed to serialize workflow: {e}")))
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// ID of the first node, in file order, with the given `class_type`.
    pub fn first_of_type(&self, class_type: &str) -> Option<&str> {
        self.by_type
            .get(class_type)
            .and_then(|ids| ids.first())
            .map(String::as_str)
    }

    /// Look up a single input value.
    pub fn input(&self, node_id: &str, field: &str) -> Option<&InputValue> {
        self.nodes.get(node_id).and_then(|n| n.inputs.get(field))
    }

    /// Overwrite `inputs[field]` on a node. Returns `false` if the node
    /// does not exist.
    pub(crate) fn set_input(&mut self, node_id: &str, field: &str, value: InputValue) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                node.inputs.insert(field.to_string(), value);
                true
            }
            None => false,
        }
    }
}

impl Serialize for Workflow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}
