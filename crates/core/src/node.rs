//! Lazy proxy for one remote DOM element.
//!
//! A [`DomNode`] is identified by its backend id, which stays valid for the
//! remote lifetime of the element. Descriptive fields are cached from the
//! last describe and only refreshed by [`DomNode::describe`]. Mutations go
//! through a front-end node id that is pushed fresh on every call.
//!
//! Staleness is never predicted. When the element is gone, the next command
//! fails with a remote error (see [`crate::Error::is_stale`]) and the caller
//! has to locate the element again; retrying the same proxy is pointless.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tabwire_protocol::{BackendNodeId, NodeDescription, Params, PseudoType, Quad, RemoteObject, quad_center};
use tabwire_runtime::CommandError;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{Error, Result};
use crate::locator::Search;
use crate::markup;
use crate::query;
use crate::target::{Target, evaluation_result, params};

const CLEAR_VALUE_FN: &str = "function() { this.focus(); if ('value' in this) { this.value = ''; } else { this.textContent = ''; } }";
const READ_VALUE_FN: &str = "function() { return 'value' in this ? this.value : this.textContent; }";
const CLICK_FN: &str = "function() { this.click(); }";

/// How [`DomNode::click_with`] reaches the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClickStrategy {
	/// Geometric, falling back to scripted when the element has no box.
	#[default]
	Auto,
	/// Scroll into view and press/release the mouse at the box center.
	Geometric,
	/// Call the element's own `click()`.
	Scripted,
}

#[derive(Debug, Default)]
struct NodeState {
	tag_name: String,
	child_count: u32,
	attributes: BTreeMap<String, String>,
	pseudo_type: Option<PseudoType>,
	pseudo_nodes: Vec<DomNode>,
	outer_html: Option<String>,
	object_id: Option<String>,
}

/// Plain-data link to a resolved parent. Never a live proxy.
#[derive(Debug, Clone)]
struct ParentLink {
	path: String,
	description: NodeDescription,
}

struct NodeInner {
	target: Target,
	backend_id: BackendNodeId,
	path: String,
	state: Mutex<NodeState>,
	parent: OnceCell<Option<ParentLink>>,
}

/// Proxy for one remote element. Cloning shares the cache.
#[derive(Clone)]
pub struct DomNode {
	inner: Arc<NodeInner>,
}

impl fmt::Debug for DomNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DomNode")
			.field("backend_id", &self.inner.backend_id)
			.field("path", &self.inner.path)
			.field("tag_name", &self.inner.state.lock().tag_name)
			.finish()
	}
}

impl DomNode {
	pub(crate) fn from_description(target: Target, path: String, description: NodeDescription) -> Self {
		let node = Self {
			inner: Arc::new(NodeInner {
				backend_id: description.backend_node_id,
				state: Mutex::new(NodeState::default()),
				parent: OnceCell::new(),
				target,
				path,
			}),
		};
		node.apply(&description);
		node
	}

	fn apply(&self, description: &NodeDescription) {
		let pseudo_nodes = description
			.pseudo_elements
			.iter()
			.map(|pseudo| DomNode::from_description(self.inner.target.clone(), self.inner.path.clone(), pseudo.clone()))
			.collect();

		let mut state = self.inner.state.lock();
		state.tag_name.clone_from(&description.local_name);
		state.child_count = description.child_node_count;
		state.attributes = description
			.attribute_pairs()
			.map(|(name, value)| (name.to_string(), value.to_string()))
			.collect();
		state.pseudo_type = description.pseudo_type.as_deref().and_then(PseudoType::parse);
		state.pseudo_nodes = pseudo_nodes;
		state.outer_html = None;
		state.object_id = None;
	}

	pub fn backend_id(&self) -> BackendNodeId {
		self.inner.backend_id
	}

	/// Locator path this node was reached by. Diagnostic, and the base for
	/// relative queries.
	pub fn path(&self) -> &str {
		&self.inner.path
	}

	pub fn target(&self) -> &Target {
		&self.inner.target
	}

	pub fn tag_name(&self) -> String {
		self.inner.state.lock().tag_name.clone()
	}

	pub fn child_count(&self) -> u32 {
		self.inner.state.lock().child_count
	}

	pub fn attribute(&self, name: &str) -> Option<String> {
		self.inner.state.lock().attributes.get(name).cloned()
	}

	pub fn has_attribute(&self, name: &str) -> bool {
		self.inner.state.lock().attributes.contains_key(name)
	}

	pub fn attributes(&self) -> BTreeMap<String, String> {
		self.inner.state.lock().attributes.clone()
	}

	pub fn pseudo_type(&self) -> Option<PseudoType> {
		self.inner.state.lock().pseudo_type
	}

	/// `::before` / `::after` sub-nodes as of the last describe.
	pub fn pseudo_nodes(&self) -> Vec<DomNode> {
		self.inner.state.lock().pseudo_nodes.clone()
	}

	/// Sends a command on behalf of this node, tagging failures with its path.
	async fn invoke(&self, method: &str, params: Params) -> Result<Value> {
		match self.inner.target.invoke(method, params).await {
			Ok(value) => Ok(value),
			Err(Error::Command(source)) => {
				if source.is_remote() {
					self.inner.state.lock().object_id = None;
				}
				Err(Error::Node {
					origin: self.inner.path.clone(),
					source,
				})
			}
			Err(other) => Err(other),
		}
	}

	fn by_backend_id(&self) -> Params {
		params(json!({ "backendNodeId": self.inner.backend_id }))
	}

	/// Refreshes every cached descriptive field.
	pub async fn describe(&self) -> Result<()> {
		let value = self.invoke("DOM.describeNode", self.by_backend_id()).await?;
		let description = query::node_field(value, "DOM.describeNode")?;
		self.apply(&description);
		Ok(())
	}

	/// Outer HTML, fetched once and cached until the next describe.
	pub async fn outer_html(&self) -> Result<String> {
		if let Some(html) = self.inner.state.lock().outer_html.clone() {
			return Ok(html);
		}
		let value = self.invoke("DOM.getOuterHTML", self.by_backend_id()).await?;
		let html = value
			.get("outerHTML")
			.and_then(Value::as_str)
			.ok_or(Error::MissingField {
				method: "DOM.getOuterHTML".into(),
				field: "outerHTML",
			})?
			.to_string();
		self.inner.state.lock().outer_html = Some(html.clone());
		Ok(html)
	}

	/// Text derived from [`outer_html`](Self::outer_html) with markup removed.
	pub async fn text_content(&self) -> Result<String> {
		Ok(markup::text_content(&self.outer_html().await?))
	}

	/// Scripting handle to the live element, resolved once and cached.
	pub async fn resolve_object(&self) -> Result<String> {
		if let Some(object_id) = self.inner.state.lock().object_id.clone() {
			return Ok(object_id);
		}
		let mut value = self.invoke("DOM.resolveNode", self.by_backend_id()).await?;
		let object: RemoteObject = serde_json::from_value(value.get_mut("object").map(Value::take).unwrap_or_default())
			.map_err(|_| Error::MissingField {
				method: "DOM.resolveNode".into(),
				field: "object",
			})?;
		let object_id = object.object_id.ok_or(Error::MissingField {
			method: "DOM.resolveNode".into(),
			field: "objectId",
		})?;
		self.inner.state.lock().object_id = Some(object_id.clone());
		Ok(object_id)
	}

	/// Calls `declaration` with the element as `this` and returns the result
	/// by value.
	pub async fn call_function(&self, declaration: &str) -> Result<Value> {
		let object_id = self.resolve_object().await?;
		let value = self
			.invoke(
				"Runtime.callFunctionOn",
				params(json!({
					"functionDeclaration": declaration,
					"objectId": object_id,
					"returnByValue": true,
				})),
			)
			.await?;
		let evaluation = evaluation_result("Runtime.callFunctionOn", value)?;
		if let Some(details) = evaluation.exception_details {
			return Err(Error::Script {
				origin: self.inner.path.clone(),
				details: details.to_string(),
			});
		}
		Ok(evaluation.result.value.unwrap_or(Value::Null))
	}

	pub async fn scroll_into_view(&self) -> Result<()> {
		self.invoke("DOM.scrollIntoViewIfNeeded", self.by_backend_id()).await?;
		Ok(())
	}

	/// Center of the first content quad after scrolling the element into view.
	async fn box_center(&self) -> Result<Option<(f64, f64)>> {
		self.scroll_into_view().await?;
		let value = self.invoke("DOM.getContentQuads", self.by_backend_id()).await?;
		let quads: Vec<Vec<f64>> = value
			.get("quads")
			.cloned()
			.map(serde_json::from_value)
			.transpose()?
			.unwrap_or_default();
		Ok(quads
			.into_iter()
			.find_map(|quad| Quad::try_from(quad.as_slice()).ok())
			.map(|quad| quad_center(&quad)))
	}

	pub async fn click(&self) -> Result<()> {
		self.click_with(ClickStrategy::Auto).await
	}

	pub async fn click_with(&self, strategy: ClickStrategy) -> Result<()> {
		match strategy {
			ClickStrategy::Scripted => self.js_click().await,
			ClickStrategy::Geometric => self.left_click().await,
			ClickStrategy::Auto => match self.box_center().await {
				Ok(Some((x, y))) => self.press_at(x, y).await,
				Ok(None) => {
					debug!(path = %self.inner.path, "no content quads, clicking by script");
					self.js_click().await
				}
				Err(err) if err.is_stale() => {
					debug!(path = %self.inner.path, error = %err, "geometry unavailable, clicking by script");
					self.js_click().await
				}
				Err(err) => Err(err),
			},
		}
	}

	/// Synthetic left press and release at the element's box center.
	pub async fn left_click(&self) -> Result<()> {
		let (x, y) = self.box_center().await?.ok_or_else(|| Error::NoLayout {
			origin: self.inner.path.clone(),
		})?;
		self.press_at(x, y).await
	}

	async fn press_at(&self, x: f64, y: f64) -> Result<()> {
		for kind in ["mousePressed", "mouseReleased"] {
			self.invoke(
				"Input.dispatchMouseEvent",
				params(json!({ "type": kind, "x": x, "y": y, "button": "left", "clickCount": 1 })),
			)
			.await?;
		}
		Ok(())
	}

	/// Calls the element's native `click()`.
	pub async fn js_click(&self) -> Result<()> {
		self.call_function(CLICK_FN).await?;
		Ok(())
	}

	/// Replaces the element's value with `text` and presses Enter until the
	/// page consumes the input.
	///
	/// The text is inserted in one operation so per-keystroke handlers do not
	/// fire. A single remote Enter is not guaranteed to reach the submit
	/// handler, so Enter is repeated while the field still holds a value.
	/// There is no internal cap: bound the call with an outer timeout.
	pub async fn submit_input(&self, text: &str) -> Result<()> {
		self.invoke("DOM.focus", self.by_backend_id()).await?;
		self.call_function(CLEAR_VALUE_FN).await?;
		self.invoke("Input.insertText", params(json!({ "text": text }))).await?;

		let interval = self.inner.target.config().poll_interval();
		loop {
			self.invoke(
				"Input.dispatchKeyEvent",
				params(json!({
					"type": "keyDown",
					"key": "Enter",
					"code": "Enter",
					"windowsVirtualKeyCode": 13,
					"nativeVirtualKeyCode": 13,
				})),
			)
			.await?;

			let value = self.call_function(READ_VALUE_FN).await?;
			if value.as_str().is_none_or(str::is_empty) {
				return Ok(());
			}
			debug!(path = %self.inner.path, "input not consumed, pressing enter again");
			self.inner.target.waiter().wait(interval).await;
		}
	}

	/// Sets attributes, then re-describes the node.
	pub async fn set_attributes<I, K, V>(&self, attributes: I) -> Result<()>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let node_id = self.frontend_id().await?;
		for (name, value) in attributes {
			let (name, value): (String, String) = (name.into(), value.into());
			self.invoke(
				"DOM.setAttributeValue",
				params(json!({ "nodeId": node_id, "name": name, "value": value })),
			)
			.await?;
		}
		self.describe().await
	}

	/// Pushes the node to the front end for a transient node id.
	async fn frontend_id(&self) -> Result<i64> {
		self.inner.target.ensure_dom().await?;
		self.invoke("DOM.getDocument", params(json!({ "depth": 0 }))).await?;
		let value = self
			.invoke(
				"DOM.pushNodesByBackendIdsToFrontend",
				params(json!({ "backendNodeIds": [self.inner.backend_id] })),
			)
			.await?;
		value
			.get("nodeIds")
			.and_then(Value::as_array)
			.and_then(|ids| ids.first())
			.and_then(Value::as_i64)
			.filter(|id| *id != 0)
			.ok_or_else(|| Error::Node {
				origin: self.inner.path.clone(),
				source: CommandError::Remote {
					code: 0,
					message: format!("backend node {} has no front-end id", self.inner.backend_id),
					data: None,
				},
			})
	}

	/// Parent element, or `None` at the document root. Resolved by a relative
	/// query from this node's path and cached.
	pub async fn parent(&self) -> Result<Option<DomNode>> {
		let link = self.inner.parent.get_or_try_init(|| self.resolve_parent()).await?;
		Ok(link
			.as_ref()
			.map(|link| DomNode::from_description(self.inner.target.clone(), link.path.clone(), link.description.clone())))
	}

	async fn resolve_parent(&self) -> Result<Option<ParentLink>> {
		// A pseudo-element's path is its host's path.
		let path = if self.pseudo_type().is_some() {
			self.inner.path.clone()
		} else {
			query::scoped_path(&self.inner.path, "..")
		};
		let hits = query::find(&self.inner.target, &path).await?;
		Ok(hits
			.into_iter()
			.next()
			.filter(|hit| !hit.description.is_document())
			.map(|hit| ParentLink {
				path: hit.path,
				description: hit.description,
			}))
	}

	/// Polling search scoped below this node.
	pub fn search(&self, locator: &str) -> Search {
		Search::from_nodes(self.inner.target.clone(), vec![self.clone()], locator, vec![self.inner.path.clone()])
	}

	/// Polling search over the siblings after this node.
	pub fn following_siblings(&self, node_test: Option<&str>) -> Search {
		Search::following_siblings(
			self.inner.target.clone(),
			vec![self.clone()],
			node_test,
			vec![self.inner.path.clone()],
		)
	}
}
