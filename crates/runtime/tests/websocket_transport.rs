//! A connection running over a real WebSocket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tabwire_protocol::Params;
use tabwire_runtime::{Connection, Connector, WebSocketConnector};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn connection_over_websocket_correlates_and_fails_on_hangup() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	// Pushes a garbage frame and an event before answering the first command,
	// then hangs up without answering the second.
	let server = tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

		let Some(Ok(Message::Text(text))) = ws.next().await else {
			panic!("expected a text frame");
		};
		let request: Value = serde_json::from_str(&text).unwrap();
		assert_eq!(request["method"], "Runtime.evaluate");
		assert_eq!(request["params"]["expression"], "1 + 1");

		ws.send(Message::Text("not json".into())).await.unwrap();
		let event = json!({"method": "Page.loadEventFired", "params": {"timestamp": 1.5}});
		ws.send(Message::Text(event.to_string())).await.unwrap();
		let reply = json!({"id": request["id"], "result": {"result": {"type": "number", "value": 2}}});
		ws.send(Message::Text(reply.to_string())).await.unwrap();

		let _second = ws.next().await;
		ws.close(None).await.ok();
	});

	let connector = WebSocketConnector::new(Duration::from_secs(2));
	let parts = connector.connect(&format!("ws://{}", addr)).await.unwrap();
	let connection = Connection::open(parts);
	let mut events = connection.subscribe();

	let mut params = Params::new();
	params.insert("expression".into(), json!("1 + 1"));
	let value = connection.invoke("Runtime.evaluate", params, Duration::from_secs(2)).await.unwrap();
	assert_eq!(value["result"]["value"], 2);

	let event = events.recv().await.unwrap();
	assert_eq!(event.method, "Page.loadEventFired");
	assert_eq!(event.params["timestamp"], 1.5);

	let err = connection.invoke("Page.reload", Params::new(), Duration::from_secs(5)).await.unwrap_err();
	assert!(err.is_connection_closed(), "unexpected error: {err}");

	server.await.unwrap();
}

#[tokio::test]
async fn connecting_to_a_closed_port_is_a_transport_error() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let connector = WebSocketConnector::new(Duration::from_secs(2));
	let err = match connector.connect(&format!("ws://{}", addr)).await {
		Ok(_) => panic!("nothing is listening"),
		Err(err) => err,
	};
	assert!(!err.is_timeout(), "unexpected error: {err}");
}
