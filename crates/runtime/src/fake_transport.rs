//! Fake transport for testing correlation and dispatch without a browser.
//!
//! # Example
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! let connection = Connection::open(parts);
//!
//! let call = tokio::spawn(async move {
//!     connection.invoke("DOM.enable", Params::new(), Duration::from_secs(1)).await
//! });
//! let sent = controller.recv_sent().await.unwrap();
//! controller.inject_response(sent["id"].as_u64().unwrap(), json!({}));
//! call.await??;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value as JsonValue, json};
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use crate::error::{CommandError, Result};
use crate::transport::{Connector, Transport, TransportParts, TransportReceiver};

/// Builder for creating fake transport instances.
#[derive(Debug, Default)]
pub struct FakeTransportBuilder {
	fail_sends: bool,
}

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every send fail as if the socket were gone.
	pub fn failing_sends(mut self) -> Self {
		self.fail_sends = true;
		self
	}

	/// Builds the transport, returning the parts for a connection and a
	/// controller for the test side.
	pub fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let (sent_tx, sent_rx) = mpsc::unbounded_channel();
		let sent = Arc::new(Mutex::new(Vec::new()));

		let sender = FakeTransportSender {
			sent: Arc::clone(&sent),
			sent_tx,
			fail: self.fail_sends,
		};
		let receiver = FakeTransportReceiver { inbound_rx, message_tx };
		let controller = FakeTransportController {
			inbound_tx: Mutex::new(Some(inbound_tx)),
			sent,
			sent_rx: AsyncMutex::new(sent_rx),
		};

		let parts = TransportParts {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
		};
		(parts, controller)
	}
}

/// Test-side handle: injects inbound frames and observes outbound ones.
pub struct FakeTransportController {
	inbound_tx: Mutex<Option<mpsc::UnboundedSender<JsonValue>>>,
	sent: Arc<Mutex<Vec<JsonValue>>>,
	sent_rx: AsyncMutex<mpsc::UnboundedReceiver<JsonValue>>,
}

impl FakeTransportController {
	/// Injects a raw frame as if the remote side had sent it.
	pub fn inject(&self, message: JsonValue) {
		if let Some(tx) = self.inbound_tx.lock().as_ref() {
			let _ = tx.send(message);
		}
	}

	pub fn inject_response(&self, id: u64, result: JsonValue) {
		self.inject(json!({ "id": id, "result": result }));
	}

	pub fn inject_error(&self, id: u64, code: i64, message: &str) {
		self.inject(json!({ "id": id, "error": { "code": code, "message": message } }));
	}

	pub fn inject_event(&self, method: &str, params: JsonValue) {
		self.inject(json!({ "method": method, "params": params }));
	}

	/// Ends the inbound stream, as a dropped socket would.
	pub fn disconnect(&self) {
		self.inbound_tx.lock().take();
	}

	/// Waits for the next outbound frame. Returns `None` once the sender is gone.
	pub async fn recv_sent(&self) -> Option<JsonValue> {
		self.sent_rx.lock().await.recv().await
	}

	/// Takes every frame sent so far, clearing the buffer.
	pub fn take_sent(&self) -> Vec<JsonValue> {
		std::mem::take(&mut *self.sent.lock())
	}
}

struct FakeTransportSender {
	sent: Arc<Mutex<Vec<JsonValue>>>,
	sent_tx: mpsc::UnboundedSender<JsonValue>,
	fail: bool,
}

impl Transport for FakeTransportSender {
	fn send(&mut self, message: JsonValue) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			if self.fail {
				return Err(CommandError::ConnectionClosed);
			}
			self.sent.lock().push(message.clone());
			let _ = self.sent_tx.send(message);
			Ok(())
		})
	}
}

struct FakeTransportReceiver {
	inbound_rx: mpsc::UnboundedReceiver<JsonValue>,
	message_tx: mpsc::UnboundedSender<JsonValue>,
}

impl TransportReceiver for FakeTransportReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(message) = self.inbound_rx.recv().await {
				if self.message_tx.send(message).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}

/// [`Connector`] that hands out fake transports and keeps their controllers.
///
/// Each successful `connect` records the URL and pushes a fresh controller
/// onto a queue that tests drain with [`FakeConnector::next_controller`].
pub struct FakeConnector {
	urls: Mutex<Vec<String>>,
	controllers_tx: Mutex<Option<mpsc::UnboundedSender<Arc<FakeTransportController>>>>,
	controllers_rx: AsyncMutex<Option<mpsc::UnboundedReceiver<Arc<FakeTransportController>>>>,
}

impl FakeConnector {
	pub fn new() -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		Self {
			urls: Mutex::new(Vec::new()),
			controllers_tx: Mutex::new(Some(tx)),
			controllers_rx: AsyncMutex::new(Some(rx)),
		}
	}

	/// URLs connected to so far, in order.
	pub fn connected_urls(&self) -> Vec<String> {
		self.urls.lock().clone()
	}

	/// Waits for the controller of the next opened transport.
	pub async fn next_controller(&self) -> Option<Arc<FakeTransportController>> {
		let mut guard = self.controllers_rx.lock().await;
		guard.as_mut()?.recv().await
	}
}

impl Default for FakeConnector {
	fn default() -> Self {
		Self::new()
	}
}

impl Connector for FakeConnector {
	fn connect<'a>(&'a self, url: &'a str) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>> {
		Box::pin(async move {
			let (parts, controller) = FakeTransportBuilder::new().build();
			self.urls.lock().push(url.to_string());
			if let Some(tx) = self.controllers_tx.lock().as_ref() {
				let _ = tx.send(Arc::new(controller));
			}
			Ok(parts)
		})
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tabwire_protocol::Params;

	use super::*;
	use crate::connection::Connection;

	#[tokio::test]
	async fn sent_frames_are_captured_in_order() {
		let (parts, controller) = FakeTransportBuilder::new().build();
		let connection = Connection::open(parts);

		let conn = Arc::clone(&connection);
		let call = tokio::spawn(async move {
			let mut params = Params::new();
			params.insert("backendNodeId".into(), json!(12));
			conn.invoke("DOM.describeNode", params, Duration::from_secs(1)).await
		});

		let sent = controller.recv_sent().await.unwrap();
		assert_eq!(sent["method"], "DOM.describeNode");
		assert_eq!(sent["params"]["backendNodeId"], 12);
		controller.inject_response(sent["id"].as_u64().unwrap(), json!({"node": {"backendNodeId": 12}}));

		let result = call.await.unwrap().unwrap();
		assert_eq!(result["node"]["backendNodeId"], 12);
		assert_eq!(controller.take_sent().len(), 1);
		assert!(controller.take_sent().is_empty());
	}

	#[tokio::test]
	async fn connector_records_urls_and_yields_controllers() {
		let connector = FakeConnector::new();
		let parts = connector.connect("ws://fake/devtools/page/1").await.unwrap();
		let connection = Connection::open(parts);
		let controller = connector.next_controller().await.unwrap();

		let conn = Arc::clone(&connection);
		let call = tokio::spawn(async move { conn.invoke("Page.enable", Params::new(), Duration::from_secs(1)).await });
		let sent = controller.recv_sent().await.unwrap();
		controller.inject_response(sent["id"].as_u64().unwrap(), json!({}));
		call.await.unwrap().unwrap();

		assert_eq!(connector.connected_urls(), vec!["ws://fake/devtools/page/1".to_string()]);
	}
}
