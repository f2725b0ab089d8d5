//! JSON shapes printed on stdout.

use std::collections::BTreeMap;

use serde::Serialize;
use tabwire::{DomNode, Target};

use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct TargetSummary {
	pub id: String,
	pub url: String,
	pub title: String,
	pub connected: bool,
}

impl From<&Target> for TargetSummary {
	fn from(target: &Target) -> Self {
		let info = target.info();
		Self {
			id: target.id().to_string(),
			url: info.url,
			title: info.title,
			connected: target.is_connected(),
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
	pub path: String,
	pub backend_id: i64,
	pub tag: String,
	pub attributes: BTreeMap<String, String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub html: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
}

impl From<&DomNode> for NodeSummary {
	fn from(node: &DomNode) -> Self {
		Self {
			path: node.path().to_string(),
			backend_id: node.backend_id(),
			tag: node.tag_name(),
			attributes: node.attributes(),
			html: None,
			text: None,
		}
	}
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}
