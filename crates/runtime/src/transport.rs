//! Physical channel abstraction.
//!
//! A transport is split into a write half ([`Transport`]) shared by every
//! caller of a connection, and a read half ([`TransportReceiver`]) owned by a
//! single background task that forwards decoded frames into an unbounded
//! channel. The connection only ever sees JSON values.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value as JsonValue;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::{CommandError, Result};

/// Write half of a physical channel.
pub trait Transport: Send {
	/// Sends one complete message.
	fn send(&mut self, message: JsonValue) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Read half of a physical channel.
pub trait TransportReceiver: Send {
	/// Reads frames until the channel ends, forwarding each decoded frame.
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both halves of an opened channel plus the stream of decoded frames.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<JsonValue>,
}

/// Opens a physical channel to a debugger URL.
///
/// This is the seam that lets targets connect lazily in production while
/// tests substitute an in-memory transport.
pub trait Connector: Send + Sync {
	fn connect<'a>(&'a self, url: &'a str) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport for page debugger endpoints.
pub struct WebSocketTransport {
	sink: SplitSink<WsStream, Message>,
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<JsonValue>,
}

impl WebSocketTransport {
	/// Connects to `url`, returning the transport and the receiver that will
	/// yield decoded frames once the read half runs.
	pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<JsonValue>)> {
		let (ws, _response) = tokio_tungstenite::connect_async(url).await?;
		debug!(%url, "websocket connected");
		let (sink, stream) = ws.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		Ok((
			Self {
				sink,
				stream,
				message_tx,
			},
			message_rx,
		))
	}

	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<JsonValue>) -> TransportParts {
		TransportParts {
			sender: Box::new(WebSocketSender { sink: self.sink }),
			receiver: Box::new(WebSocketReceiver {
				stream: self.stream,
				message_tx: self.message_tx,
			}),
			message_rx,
		}
	}
}

struct WebSocketSender {
	sink: SplitSink<WsStream, Message>,
}

impl Transport for WebSocketSender {
	fn send(&mut self, message: JsonValue) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink.send(Message::Text(text)).await?;
			Ok(())
		})
	}
}

struct WebSocketReceiver {
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<JsonValue>,
}

impl TransportReceiver for WebSocketReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(frame) = self.stream.next().await {
				let parsed = match frame? {
					Message::Text(text) => serde_json::from_str::<JsonValue>(&text),
					Message::Binary(bytes) => serde_json::from_slice::<JsonValue>(&bytes),
					Message::Close(frame) => {
						debug!(?frame, "websocket closed by peer");
						break;
					}
					other => {
						trace!(?other, "ignoring control frame");
						continue;
					}
				};

				match parsed {
					Ok(value) => {
						if self.message_tx.send(value).is_err() {
							break;
						}
					}
					Err(err) => warn!(error = %err, "dropping undecodable frame"),
				}
			}
			Ok(())
		})
	}
}

/// Production [`Connector`] backed by [`WebSocketTransport`].
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
	timeout: Duration,
}

impl WebSocketConnector {
	pub fn new(timeout: Duration) -> Self {
		Self { timeout }
	}
}

impl Connector for WebSocketConnector {
	fn connect<'a>(&'a self, url: &'a str) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>> {
		Box::pin(async move {
			let (transport, message_rx) = tokio::time::timeout(self.timeout, WebSocketTransport::connect(url))
				.await
				.map_err(|_| CommandError::Transport(format!("connecting to {url} timed out after {}ms", self.timeout.as_millis())))??;
			Ok(transport.into_transport_parts(message_rx))
		})
	}
}
