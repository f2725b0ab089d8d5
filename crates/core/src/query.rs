//! Zero-wait XPath query against a target's document.
//!
//! One query is a short command sequence: refresh the document, run the
//! search, fetch the matching node ids, describe each, then always discard
//! the server-side search. A single hit keeps the query as its path; several
//! hits are addressed as `(query)[n]` so each can be re-queried on its own.

use serde_json::{Value, json};
use tabwire_protocol::{NodeDescription, Params};
use tracing::debug;

use crate::error::{Error, Result};
use crate::node::DomNode;
use crate::target::{Target, params};

/// One matched node before it is wrapped in a proxy.
#[derive(Debug, Clone)]
pub(crate) struct Hit {
	pub(crate) path: String,
	pub(crate) description: NodeDescription,
}

impl Hit {
	pub(crate) fn into_node(self, target: &Target) -> DomNode {
		DomNode::from_description(target.clone(), self.path, self.description)
	}
}

pub(crate) async fn find(target: &Target, xpath: &str) -> Result<Vec<Hit>> {
	target.ensure_dom().await?;
	target.invoke("DOM.getDocument", params(json!({ "depth": 0 }))).await?;

	let search = target
		.invoke(
			"DOM.performSearch",
			params(json!({ "query": xpath, "includeUserAgentShadowDOM": true })),
		)
		.await?;
	let search_id = search
		.get("searchId")
		.and_then(Value::as_str)
		.ok_or(Error::MissingField {
			method: "DOM.performSearch".into(),
			field: "searchId",
		})?
		.to_string();
	let count = search.get("resultCount").and_then(Value::as_u64).unwrap_or(0);

	let outcome = collect(target, xpath, &search_id, count).await;

	if let Err(err) = target
		.invoke("DOM.discardSearchResults", params(json!({ "searchId": search_id })))
		.await
	{
		debug!(%xpath, error = %err, "failed to discard search results");
	}
	outcome
}

async fn collect(target: &Target, xpath: &str, search_id: &str, count: u64) -> Result<Vec<Hit>> {
	if count == 0 {
		return Ok(Vec::new());
	}

	let results = target
		.invoke(
			"DOM.getSearchResults",
			params(json!({ "searchId": search_id, "fromIndex": 0, "toIndex": count })),
		)
		.await?;
	let node_ids: Vec<i64> = results
		.get("nodeIds")
		.and_then(Value::as_array)
		.map(|ids| ids.iter().filter_map(Value::as_i64).collect())
		.unwrap_or_default();

	let mut descriptions = Vec::with_capacity(node_ids.len());
	for node_id in node_ids {
		let mut describe = Params::new();
		describe.insert("nodeId".into(), json!(node_id));
		let described = target.invoke("DOM.describeNode", describe).await?;
		descriptions.push(node_field(described, "DOM.describeNode")?);
	}

	let single = descriptions.len() == 1;
	Ok(descriptions
		.into_iter()
		.enumerate()
		.map(|(i, description)| Hit {
			path: if single { xpath.to_string() } else { format!("({xpath})[{}]", i + 1) },
			description,
		})
		.collect())
}

/// Extracts and parses the `node` field of a describe response.
pub(crate) fn node_field(mut value: Value, method: &str) -> Result<NodeDescription> {
	let node = value.get_mut("node").map(Value::take).ok_or_else(|| Error::MissingField {
		method: method.to_string(),
		field: "node",
	})?;
	Ok(serde_json::from_value(node)?)
}

/// Appends `locator` to a node path, inserting a step separator when the
/// locator is an axis or a bare node test.
pub(crate) fn scoped_path(base: &str, locator: &str) -> String {
	if locator.starts_with('/') {
		format!("{base}{locator}")
	} else {
		format!("{base}/{locator}")
	}
}

/// Path of the siblings after `base`, optionally restricted to a node test.
pub(crate) fn following_sibling_path(base: &str, node_test: Option<&str>) -> String {
	format!("{base}/following-sibling::{}", node_test.unwrap_or("*"))
}
