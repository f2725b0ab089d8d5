//! A scripted page on the far side of a fake transport.
//!
//! [`serve`] answers every frame the client sends: a test handler gets the
//! first say, then [`FakeDom`] answers the XPath search commands, and
//! anything left over gets an empty result.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tabwire::{ClientConfig, Target};
use tabwire_protocol::TargetDescriptor;
use tabwire_runtime::fake_transport::FakeConnector;

pub enum Reply {
	Result(Value),
	Error(i64, &'static str),
}

/// Every `(method, params)` the client sent, in order.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<(String, Value)>>>);

impl Log {
	pub fn methods(&self) -> Vec<String> {
		self.0.lock().iter().map(|(method, _)| method.clone()).collect()
	}

	pub fn count(&self, method: &str) -> usize {
		self.0.lock().iter().filter(|(m, _)| m == method).count()
	}

	pub fn params_of(&self, method: &str) -> Vec<Value> {
		self.0
			.lock()
			.iter()
			.filter(|(m, _)| m == method)
			.map(|(_, params)| params.clone())
			.collect()
	}
}

pub fn element(backend_id: i64, name: &str, attributes: &[(&str, &str)]) -> Value {
	let flat: Vec<&str> = attributes.iter().flat_map(|(k, v)| [*k, *v]).collect();
	json!({
		"nodeId": 0,
		"backendNodeId": backend_id,
		"nodeType": 1,
		"nodeName": name.to_uppercase(),
		"localName": name,
		"childNodeCount": 0,
		"attributes": flat,
	})
}

pub fn document() -> Value {
	json!({
		"nodeId": 1,
		"backendNodeId": 1,
		"nodeType": 9,
		"nodeName": "#document",
		"localName": "",
		"childNodeCount": 1,
	})
}

/// XPath results keyed by the exact query string.
#[derive(Default)]
pub struct FakeDom {
	queries: HashMap<String, Vec<Value>>,
	by_backend: HashMap<i64, Value>,
	frontend: Vec<Value>,
}

impl FakeDom {
	pub fn with(mut self, xpath: &str, nodes: Vec<Value>) -> Self {
		self.insert(xpath, nodes);
		self
	}

	pub fn insert(&mut self, xpath: &str, nodes: Vec<Value>) {
		for node in &nodes {
			if let Some(id) = node["backendNodeId"].as_i64() {
				self.by_backend.insert(id, node.clone());
			}
		}
		self.queries.insert(xpath.to_string(), nodes);
	}

	fn handle(&mut self, method: &str, params: &Value) -> Option<Value> {
		match method {
			"DOM.getDocument" => Some(json!({ "root": document() })),
			"DOM.performSearch" => {
				let query = params["query"].as_str().unwrap_or_default();
				let count = self.queries.get(query).map_or(0, Vec::len);
				Some(json!({ "searchId": query, "resultCount": count }))
			}
			"DOM.getSearchResults" => {
				let query = params["searchId"].as_str().unwrap_or_default();
				let nodes = self.queries.get(query).cloned().unwrap_or_default();
				let ids: Vec<usize> = nodes
					.into_iter()
					.map(|node| {
						self.frontend.push(node);
						self.frontend.len()
					})
					.collect();
				Some(json!({ "nodeIds": ids }))
			}
			"DOM.describeNode" => {
				let node = match params["nodeId"].as_u64() {
					Some(id) => (id as usize).checked_sub(1).and_then(|i| self.frontend.get(i)).cloned(),
					None => params["backendNodeId"]
						.as_i64()
						.and_then(|id| self.by_backend.get(&id).cloned()),
				};
				node.map(|node| json!({ "node": node }))
			}
			_ => None,
		}
	}
}

/// Answers frames on the next connection `connector` opens.
pub fn serve<H>(connector: Arc<FakeConnector>, mut dom: FakeDom, mut handler: H) -> Log
where
	H: FnMut(&mut FakeDom, &str, &Value) -> Option<Reply> + Send + 'static,
{
	let log = Log::default();
	let record = log.clone();
	tokio::spawn(async move {
		let Some(controller) = connector.next_controller().await else {
			return;
		};
		while let Some(frame) = controller.recv_sent().await {
			let id = frame["id"].as_u64().unwrap_or_default();
			let method = frame["method"].as_str().unwrap_or_default().to_string();
			let params = frame["params"].clone();
			record.0.lock().push((method.clone(), params.clone()));

			let reply = handler(&mut dom, &method, &params)
				.or_else(|| dom.handle(&method, &params).map(Reply::Result))
				.unwrap_or_else(|| Reply::Result(json!({})));
			match reply {
				Reply::Result(value) => controller.inject_response(id, value),
				Reply::Error(code, message) => controller.inject_error(id, code, message),
			}
		}
	});
	log
}

pub fn fast_config() -> ClientConfig {
	ClientConfig {
		command_timeout_ms: 1000,
		poll_interval_ms: 10,
		find_timeout_ms: 300,
		..ClientConfig::default()
	}
}

pub fn page(connector: &Arc<FakeConnector>) -> Target {
	let descriptor = TargetDescriptor {
		id: "PAGE".into(),
		url: "https://chat.example.com/c/1".into(),
		title: "Chat".into(),
		kind: "page".into(),
		web_socket_debugger_url: Some("ws://fake/devtools/page/PAGE".into()),
		devtools_frontend_url: None,
	};
	Target::new(&descriptor, connector.clone(), Arc::new(fast_config()))
}
