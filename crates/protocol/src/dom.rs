//! DOM and Runtime domain payloads consumed by the node proxy.

use serde::{Deserialize, Serialize};

/// Identifier stable for the remote lifetime of a node. Used for reads.
pub type BackendNodeId = i64;

/// Transient identifier required by mutating DOM commands.
pub type FrontendNodeId = i64;

/// Node type reported for the document itself.
pub const DOCUMENT_NODE: i64 = 9;

/// `node` field of `DOM.describeNode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescription {
	/// Zero when the node was described by backend id only.
	#[serde(default)]
	pub node_id: FrontendNodeId,
	pub backend_node_id: BackendNodeId,
	#[serde(default)]
	pub node_type: i64,
	#[serde(default)]
	pub node_name: String,
	#[serde(default)]
	pub local_name: String,
	#[serde(default)]
	pub child_node_count: u32,
	/// Flattened `[name, value, name, value, ...]`.
	#[serde(default)]
	pub attributes: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pseudo_type: Option<String>,
	#[serde(default)]
	pub pseudo_elements: Vec<NodeDescription>,
}

impl NodeDescription {
	/// Pairs up the flattened attribute list.
	pub fn attribute_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
		self.attributes
			.chunks_exact(2)
			.map(|pair| (pair[0].as_str(), pair[1].as_str()))
	}

	pub fn is_document(&self) -> bool {
		self.node_type == DOCUMENT_NODE
	}
}

/// Pseudo-element kinds the proxy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoType {
	Before,
	After,
}

impl PseudoType {
	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"before" => Some(Self::Before),
			"after" => Some(Self::After),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Before => "before",
			Self::After => "after",
		}
	}
}

/// `object` field of `DOM.resolveNode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
	#[serde(rename = "type", default)]
	pub kind: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subtype: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub object_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<serde_json::Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// Result of `Runtime.callFunctionOn` / `Runtime.evaluate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
	pub result: RemoteObject,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exception_details: Option<serde_json::Value>,
}

/// Eight numbers describing the four corners of a content box, clockwise.
pub type Quad = [f64; 8];

/// Center point of a quad, averaged over its four corners.
pub fn quad_center(quad: &Quad) -> (f64, f64) {
	let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
	let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
	(x, y)
}
