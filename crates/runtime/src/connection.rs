//! Connection and command dispatcher for one page.
//!
//! This module implements the request/response correlation layer on top of a
//! transport. It handles:
//! - Allocating process-wide unique request ids
//! - Tracking pending requests and their deadlines
//! - Routing responses to the waiting caller by id, whatever the arrival order
//! - Publishing events (frames without an id)
//! - Failing every pending request at once when the channel goes away
//!
//! # Message Flow
//!
//! 1. A caller invokes `invoke()` with a method, params and timeout
//! 2. The connection allocates an id and registers a pending slot
//! 3. The request is serialized and written under the sender lock, within
//!    the same deadline as the wait for the response
//! 4. The caller waits on its own slot, never on the channel
//! 5. The single reader task parses each inbound frame
//! 6. Responses are matched by id and complete the slot exactly once
//! 7. Frames whose id has no pending entry are logged and dropped

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tabwire_protocol::{Event, Message, Params, Request};
use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use crate::error::{CommandError, Result};
use crate::request_id::RequestIdRegistry;
use crate::transport::{Transport, TransportParts};

const EVENT_CAPACITY: usize = 256;

/// A request waiting for its response.
struct PendingRequest {
	method: String,
	issued_at: Instant,
	deadline: Instant,
	slot: oneshot::Sender<Result<Value>>,
}

/// State shared between callers and the reader task.
struct Shared {
	pending: Mutex<HashMap<u64, PendingRequest>>,
	closed: AtomicBool,
	events: broadcast::Sender<Event>,
}

impl Shared {
	fn dispatch(&self, value: Value) {
		let message = match serde_json::from_value::<Message>(value) {
			Ok(message) => message,
			Err(err) => {
				error!(error = %err, "failed to parse inbound frame");
				return;
			}
		};

		match message {
			Message::Response(response) => {
				let id = response.id;
				let Some(pending) = self.pending.lock().remove(&id) else {
					warn!(id, "dropping response with no pending request");
					return;
				};

				let now = Instant::now();
				if now > pending.deadline {
					debug!(id, method = %pending.method, "response arrived past its deadline");
				}
				debug!(
					id,
					method = %pending.method,
					elapsed_ms = now.duration_since(pending.issued_at).as_millis() as u64,
					"response received"
				);

				let result = response.into_result().map_err(CommandError::from);
				// The caller may already have given up; that is fine.
				let _ = pending.slot.send(result);
			}
			Message::Event(event) => {
				trace!(method = %event.method, "event received");
				let _ = self.events.send(event);
			}
		}
	}

	/// Marks the connection closed and fails every outstanding request.
	fn fail_all(&self) {
		self.closed.store(true, Ordering::SeqCst);
		let drained: Vec<_> = self.pending.lock().drain().collect();
		if !drained.is_empty() {
			debug!(count = drained.len(), "failing pending requests");
		}
		for (_, pending) in drained {
			let _ = pending.slot.send(Err(CommandError::ConnectionClosed));
		}
	}
}

/// Removes a pending entry when the waiting caller goes away, whether it
/// finished, timed out, or was cancelled.
struct PendingGuard<'a> {
	shared: &'a Shared,
	id: u64,
}

impl Drop for PendingGuard<'_> {
	fn drop(&mut self) {
		self.shared.pending.lock().remove(&self.id);
	}
}

/// Persistent command channel to one page.
///
/// Exactly one background task reads the channel; callers only ever wait on
/// their own slot, so any number of `invoke` calls may be in flight at once.
/// Writes are serialized so two callers' frames never interleave.
pub struct Connection {
	shared: Arc<Shared>,
	sender: AsyncMutex<Box<dyn Transport>>,
	tasks: Mutex<Vec<JoinHandle<()>>>,
	ids: &'static RequestIdRegistry,
}

impl Connection {
	/// Takes ownership of an opened transport and starts its reader.
	///
	/// Must be called from within a tokio runtime.
	pub fn open(parts: TransportParts) -> Arc<Self> {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = parts;

		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		let shared = Arc::new(Shared {
			pending: Mutex::new(HashMap::new()),
			closed: AtomicBool::new(false),
			events,
		});

		let receive_task = tokio::spawn(async move {
			if let Err(err) = receiver.run().await {
				error!(error = %err, "transport reader failed");
			}
		});
		let dispatch_task = tokio::spawn(Self::read_loop(Arc::clone(&shared), message_rx));

		Arc::new(Self {
			shared,
			sender: AsyncMutex::new(sender),
			tasks: Mutex::new(vec![receive_task, dispatch_task]),
			ids: RequestIdRegistry::global(),
		})
	}

	async fn read_loop(shared: Arc<Shared>, mut message_rx: mpsc::UnboundedReceiver<Value>) {
		while let Some(value) = message_rx.recv().await {
			shared.dispatch(value);
		}
		debug!("message loop ended (transport closed)");
		shared.fail_all();
	}

	/// Sends `method` with `params` and waits at most `timeout` for the
	/// correlated response.
	pub async fn invoke(&self, method: &str, params: Params, timeout: Duration) -> Result<Value> {
		if self.is_closed() {
			return Err(CommandError::ConnectionClosed);
		}

		let id = self.ids.next_id();
		let (tx, rx) = oneshot::channel();
		let issued_at = Instant::now();
		let deadline = issued_at + timeout;
		self.shared.pending.lock().insert(
			id,
			PendingRequest {
				method: method.to_string(),
				issued_at,
				deadline,
				slot: tx,
			},
		);
		let _guard = PendingGuard { shared: &self.shared, id };

		// `fail_all` may have drained the map just before our insert.
		if self.is_closed() {
			return Err(CommandError::ConnectionClosed);
		}

		let request = serde_json::to_value(Request::new(id, method, params))?;
		debug!(id, method, "sending command");
		// The write lock and the send itself count against the same deadline.
		let sent = tokio::time::timeout_at(deadline, async { self.sender.lock().await.send(request).await }).await;
		match sent {
			Ok(result) => result?,
			Err(_) => {
				debug!(id, method, "command send timed out");
				return Err(CommandError::Timeout {
					method: method.to_string(),
					timeout,
				});
			}
		}

		match tokio::time::timeout_at(deadline, rx).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(CommandError::ConnectionClosed),
			Err(_) => {
				debug!(id, method, "command timed out");
				Err(CommandError::Timeout {
					method: method.to_string(),
					timeout,
				})
			}
		}
	}

	/// Subscribes to events pushed by the page.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.shared.events.subscribe()
	}

	pub fn is_closed(&self) -> bool {
		self.shared.closed.load(Ordering::SeqCst)
	}

	/// Number of requests still waiting for a response.
	pub fn pending_count(&self) -> usize {
		self.shared.pending.lock().len()
	}

	/// Stops the reader and fails every outstanding request immediately.
	///
	/// Idempotent. The write half is released when the last handle drops.
	pub fn close(&self) {
		for task in self.tasks.lock().drain(..) {
			task.abort();
		}
		self.shared.fail_all();
	}
}

impl Drop for Connection {
	fn drop(&mut self) {
		for task in self.tasks.get_mut().drain(..) {
			task.abort();
		}
	}
}
