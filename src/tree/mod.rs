//! Serialized node trees: typed nodes with parameters and unlinked socket values, and links
//! from output sockets to input sockets.

use crate::foundation::core::Float4;
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::result::ResultType;
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

/// A compositor node tree.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeTree {
    /// Nodes in document order.
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    /// Links between sockets.
    #[serde(default)]
    pub links: Vec<LinkDef>,
}

/// One node.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDef {
    /// Unique identifier within the tree.
    pub id: String,
    /// Node type, the key operations are registered under.
    #[serde(rename = "type")]
    pub ty: String,
    /// Type-specific parameters.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
    /// Values of unlinked input sockets.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, InputValue>,
}

/// Value of an unlinked input socket.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    /// A float.
    Float(f32),
    /// A three component vector.
    Vector([f32; 3]),
    /// An RGBA color.
    Color([f32; 4]),
}

impl InputValue {
    /// Result type the value is naturally read as.
    pub fn ty(self) -> ResultType {
        match self {
            Self::Float(_) => ResultType::Float,
            Self::Vector(_) => ResultType::Vector,
            Self::Color(_) => ResultType::Color,
        }
    }

    /// The value as four floats in the layout of its own type.
    pub fn to_float4(self) -> Float4 {
        match self {
            Self::Float(v) => Float4::new(v, 0.0, 0.0, 1.0),
            Self::Vector([x, y, z]) => Float4::new(x, y, z, 0.0),
            Self::Color(c) => Float4::from(c),
        }
    }
}

/// A link from an output socket to an input socket.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkDef {
    /// Source node id.
    pub from: String,
    /// Output socket on the source node.
    pub from_socket: String,
    /// Target node id.
    pub to: String,
    /// Input socket on the target node.
    pub to_socket: String,
}

impl NodeDef {
    /// Node without parameters or input values.
    pub fn new(id: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ty: ty.into(),
            params: serde_json::Value::Null,
            inputs: BTreeMap::new(),
        }
    }

    /// Replace the parameters.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Set the value of an unlinked input socket.
    pub fn with_input(mut self, socket: impl Into<String>, value: InputValue) -> Self {
        self.inputs.insert(socket.into(), value);
        self
    }
}

impl NodeTree {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a tree from JSON text.
    pub fn from_json_str(json: &str) -> CompositorResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CompositorError::serde(format!("parse node tree JSON: {e}")))
    }

    /// Parse a tree from a JSON reader.
    pub fn from_reader(reader: impl Read) -> CompositorResult<Self> {
        serde_json::from_reader(reader)
            .map_err(|e| CompositorError::serde(format!("parse node tree JSON: {e}")))
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> CompositorResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            anyhow::Error::new(e).context(format!("open node tree '{}'", path.display()))
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Pretty JSON text of the tree.
    pub fn to_json_string(&self) -> CompositorResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CompositorError::serde(format!("serialize node tree: {e}")))
    }

    /// Append a node.
    pub fn add_node(&mut self, node: NodeDef) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Link `from.from_socket` to `to.to_socket`.
    pub fn link(
        &mut self,
        from: impl Into<String>,
        from_socket: impl Into<String>,
        to: impl Into<String>,
        to_socket: impl Into<String>,
    ) -> &mut Self {
        self.links.push(LinkDef {
            from: from.into(),
            from_socket: from_socket.into(),
            to: to.into(),
            to_socket: to_socket.into(),
        });
        self
    }

    /// Node by id.
    pub fn node(&self, id: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Index of the node with `id` in [`NodeTree::nodes`].
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    /// The link feeding input `socket` of node `id`, if any.
    pub fn link_into(&self, id: &str, socket: &str) -> Option<&LinkDef> {
        self.links
            .iter()
            .find(|l| l.to == id && l.to_socket == socket)
    }

    /// Check structural consistency: non-empty unique ids and types, links between existing
    /// nodes, and at most one link per input socket. Socket names are checked at compile time
    /// against the operations.
    pub fn validate(&self) -> CompositorResult<()> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(CompositorError::validation("node id must be non-empty"));
            }
            if node.ty.trim().is_empty() {
                return Err(CompositorError::validation(format!(
                    "node '{}' has an empty type",
                    node.id
                )));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(CompositorError::validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let mut targets = HashSet::new();
        for link in &self.links {
            for end in [&link.from, &link.to] {
                if !ids.contains(end.as_str()) {
                    return Err(CompositorError::validation(format!(
                        "link references missing node '{end}'"
                    )));
                }
            }
            if link.from == link.to {
                return Err(CompositorError::validation(format!(
                    "node '{}' links to itself",
                    link.from
                )));
            }
            if !targets.insert((link.to.as_str(), link.to_socket.as_str())) {
                return Err(CompositorError::validation(format!(
                    "input '{}' of node '{}' has more than one link",
                    link.to_socket, link.to
                )));
            }
        }
        Ok(())
    }

    /// 128-bit xxh3 hash of the canonical JSON form; changes whenever anything that affects
    /// compilation changes.
    pub fn fingerprint(&self) -> u128 {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        xxhash_rust::xxh3::xxh3_128(&bytes)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/tree.rs"]
mod tests;
