//! Handles to remote pages.
//!
//! A [`Target`] is a cheap, cloneable handle. The directory keeps one per
//! page id and mutates it in place as the page navigates, so handles held by
//! callers keep observing the current url/title. The page connection is
//! opened lazily on first command and replaced only when the debugger
//! endpoint rotates.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tabwire_protocol::{EvaluationResult, Event, Params, TargetDescriptor};
use tabwire_runtime::{CommandError, Connection, Connector};
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::locator::Search;
use crate::node::DomNode;
use crate::query;
use crate::wait::{TokioWaiter, Waiter};

/// Mutable descriptive fields of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
	pub url: String,
	pub title: String,
	pub debugger_url: Option<String>,
}

/// One open connection plus per-connection protocol state.
pub(crate) struct Session {
	pub(crate) connection: Arc<Connection>,
	dom_enabled: AtomicBool,
}

struct TargetInner {
	id: String,
	info: RwLock<TargetInfo>,
	session: Mutex<Option<Arc<Session>>>,
	connect_lock: AsyncMutex<()>,
	connector: Arc<dyn Connector>,
	config: Arc<ClientConfig>,
	waiter: Arc<dyn Waiter>,
}

/// A remote browsing context addressable by a stable id.
#[derive(Clone)]
pub struct Target {
	inner: Arc<TargetInner>,
}

impl fmt::Debug for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Target")
			.field("id", &self.inner.id)
			.field("info", &*self.inner.info.read())
			.finish()
	}
}

impl Target {
	pub fn new(descriptor: &TargetDescriptor, connector: Arc<dyn Connector>, config: Arc<ClientConfig>) -> Self {
		Self::with_waiter(descriptor, connector, config, Arc::new(TokioWaiter))
	}

	pub fn with_waiter(
		descriptor: &TargetDescriptor,
		connector: Arc<dyn Connector>,
		config: Arc<ClientConfig>,
		waiter: Arc<dyn Waiter>,
	) -> Self {
		Self {
			inner: Arc::new(TargetInner {
				id: descriptor.id.clone(),
				info: RwLock::new(TargetInfo {
					url: descriptor.url.clone(),
					title: descriptor.title.clone(),
					debugger_url: descriptor.web_socket_debugger_url.clone(),
				}),
				session: Mutex::new(None),
				connect_lock: AsyncMutex::new(()),
				connector,
				config,
				waiter,
			}),
		}
	}

	pub fn id(&self) -> &str {
		&self.inner.id
	}

	pub fn url(&self) -> String {
		self.inner.info.read().url.clone()
	}

	pub fn title(&self) -> String {
		self.inner.info.read().title.clone()
	}

	pub fn debugger_url(&self) -> Option<String> {
		self.inner.info.read().debugger_url.clone()
	}

	pub fn info(&self) -> TargetInfo {
		self.inner.info.read().clone()
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	pub(crate) fn waiter(&self) -> &dyn Waiter {
		self.inner.waiter.as_ref()
	}

	/// Whether two handles refer to the same tracked object.
	pub fn same_handle(&self, other: &Target) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// Applies a fresh listing entry. Returns `true` when the debugger
	/// endpoint rotated and the old connection was discarded.
	pub(crate) fn update(&self, descriptor: &TargetDescriptor) -> bool {
		let rotated = {
			let mut info = self.inner.info.write();
			info.url.clone_from(&descriptor.url);
			info.title.clone_from(&descriptor.title);
			let rotated = info.debugger_url != descriptor.web_socket_debugger_url;
			if rotated {
				info.debugger_url.clone_from(&descriptor.web_socket_debugger_url);
			}
			rotated
		};

		if rotated {
			warn!(target_id = %self.inner.id, "debugger endpoint rotated, dropping connection");
			self.close_connection();
		}
		rotated
	}

	pub fn is_connected(&self) -> bool {
		self.inner
			.session
			.lock()
			.as_ref()
			.is_some_and(|session| !session.connection.is_closed())
	}

	/// Closes the page connection, failing every outstanding command. The
	/// next command reconnects.
	pub fn close_connection(&self) {
		if let Some(session) = self.inner.session.lock().take() {
			session.connection.close();
		}
	}

	fn live_session(&self) -> Option<Arc<Session>> {
		self.inner
			.session
			.lock()
			.as_ref()
			.filter(|session| !session.connection.is_closed())
			.cloned()
	}

	pub(crate) async fn session(&self) -> Result<Arc<Session>> {
		if let Some(session) = self.live_session() {
			return Ok(session);
		}

		let _guard = self.inner.connect_lock.lock().await;
		loop {
			if let Some(session) = self.live_session() {
				return Ok(session);
			}

			let url = self
				.debugger_url()
				.ok_or_else(|| CommandError::Transport(format!("target {} exposes no debugger url", self.inner.id)))?;
			debug!(target_id = %self.inner.id, %url, "opening page connection");
			let parts = self.inner.connector.connect(&url).await?;
			let session = Arc::new(Session {
				connection: Connection::open(parts),
				dom_enabled: AtomicBool::new(false),
			});

			// The endpoint may have rotated while we were connecting.
			if self.debugger_url().as_deref() != Some(url.as_str()) {
				session.connection.close();
				continue;
			}

			*self.inner.session.lock() = Some(Arc::clone(&session));
			return Ok(session);
		}
	}

	/// Sends any command with the configured command timeout.
	pub async fn invoke(&self, method: &str, params: Params) -> Result<Value> {
		self.invoke_with_timeout(method, params, self.inner.config.command_timeout())
			.await
	}

	pub async fn invoke_with_timeout(&self, method: &str, params: Params, timeout: Duration) -> Result<Value> {
		let session = self.session().await?;
		Ok(session.connection.invoke(method, params, timeout).await?)
	}

	/// Events pushed by the page on its current connection.
	pub async fn subscribe(&self) -> Result<broadcast::Receiver<Event>> {
		Ok(self.session().await?.connection.subscribe())
	}

	/// Enables the DOM domain once per connection.
	pub(crate) async fn ensure_dom(&self) -> Result<()> {
		let session = self.session().await?;
		if session.dom_enabled.load(Ordering::Acquire) {
			return Ok(());
		}
		session
			.connection
			.invoke("DOM.enable", Params::new(), self.inner.config.command_timeout())
			.await?;
		session.dom_enabled.store(true, Ordering::Release);
		Ok(())
	}

	/// Loads `url` in the page, then optionally brings it to the foreground.
	pub async fn navigate(&self, url: &str, activate: bool) -> Result<()> {
		self.invoke("Page.navigate", params(json!({ "url": url }))).await?;
		if activate {
			self.bring_to_front().await?;
		}
		Ok(())
	}

	pub async fn bring_to_front(&self) -> Result<()> {
		self.invoke("Page.bringToFront", Params::new()).await?;
		Ok(())
	}

	/// Evaluates `expression` in the page and returns its value.
	pub async fn evaluate(&self, expression: &str) -> Result<Value> {
		let value = self
			.invoke(
				"Runtime.evaluate",
				params(json!({
					"expression": expression,
					"returnByValue": true,
					"awaitPromise": true,
				})),
			)
			.await?;
		let evaluation = evaluation_result("Runtime.evaluate", value)?;
		if let Some(details) = evaluation.exception_details {
			return Err(Error::Script {
				origin: format!("target {}", self.inner.id),
				details: details.to_string(),
			});
		}
		Ok(evaluation.result.value.unwrap_or(Value::Null))
	}

	/// Runs one XPath query with no waiting.
	pub async fn query_now(&self, xpath: &str) -> Result<Vec<DomNode>> {
		let hits = query::find(self, xpath).await?;
		Ok(hits.into_iter().map(|hit| hit.into_node(self)).collect())
	}

	/// Starts a polling search from the document root.
	pub fn search(&self, locator: &str) -> Search {
		Search::from_document(self.clone(), locator)
	}
}

/// Turns a `json!` object into command params. Non-objects become empty.
/// Parses a script reply, reporting a reply with no `result` as a missing
/// field rather than a decoding failure.
pub(crate) fn evaluation_result(method: &str, value: Value) -> Result<EvaluationResult> {
	if value.get("result").is_none() {
		return Err(Error::MissingField {
			method: method.into(),
			field: "result",
		});
	}
	Ok(serde_json::from_value(value)?)
}

pub(crate) fn params(value: Value) -> Params {
	match value {
		Value::Object(map) => map,
		_ => Params::new(),
	}
}

#[cfg(test)]
mod tests {
	use tabwire_runtime::fake_transport::FakeConnector;

	use super::*;

	fn descriptor(id: &str, url: &str, ws: &str) -> TargetDescriptor {
		TargetDescriptor {
			id: id.into(),
			url: url.into(),
			title: String::new(),
			kind: "page".into(),
			web_socket_debugger_url: Some(ws.into()),
			devtools_frontend_url: None,
		}
	}

	#[tokio::test]
	async fn connection_is_lazy_and_reused() {
		let connector = Arc::new(FakeConnector::new());
		let target = Target::new(
			&descriptor("T1", "https://a.com", "ws://fake/1"),
			connector.clone(),
			Arc::new(ClientConfig::default()),
		);
		assert!(!target.is_connected());
		assert!(connector.connected_urls().is_empty());

		let first = target.session().await.unwrap();
		let second = target.session().await.unwrap();
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(connector.connected_urls(), vec!["ws://fake/1".to_string()]);
		assert!(target.is_connected());
	}

	#[tokio::test]
	async fn endpoint_rotation_closes_old_connection() {
		let connector = Arc::new(FakeConnector::new());
		let target = Target::new(
			&descriptor("T1", "https://a.com", "ws://fake/1"),
			connector.clone(),
			Arc::new(ClientConfig::default()),
		);
		let old = target.session().await.unwrap();

		assert!(!target.update(&descriptor("T1", "https://a.com/next", "ws://fake/1")));
		assert!(!old.connection.is_closed());
		assert_eq!(target.url(), "https://a.com/next");

		assert!(target.update(&descriptor("T1", "https://a.com/next", "ws://fake/2")));
		assert!(old.connection.is_closed());
		assert!(!target.is_connected());

		target.session().await.unwrap();
		assert_eq!(connector.connected_urls(), vec!["ws://fake/1".to_string(), "ws://fake/2".to_string()]);
	}

	#[tokio::test]
	async fn missing_debugger_url_is_transport_error() {
		let mut desc = descriptor("T1", "https://a.com", "ws://unused");
		desc.web_socket_debugger_url = None;
		let target = Target::new(&desc, Arc::new(FakeConnector::new()), Arc::new(ClientConfig::default()));

		let err = target.invoke("DOM.enable", Params::new()).await.unwrap_err();
		assert!(matches!(err, Error::Command(CommandError::Transport(_))));
	}
}
