//! Command, response and event envelopes.
//!
//! ```json
//! {"id": 42, "method": "DOM.describeNode", "params": {"backendNodeId": 7}}
//! {"id": 42, "result": {"node": {...}}}
//! {"id": 42, "error": {"code": -32000, "message": "No node with given id found"}}
//! {"method": "DOM.documentUpdated", "params": {}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arbitrary command parameters keyed by name.
pub type Params = Map<String, Value>;

/// Command sent to a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Process-wide unique request id used for correlation.
	pub id: u64,
	/// `Domain.command` method name.
	pub method: String,
	/// Method parameters. Always serialized, even when empty.
	#[serde(default)]
	pub params: Params,
}

impl Request {
	pub fn new(id: u64, method: impl Into<String>, params: Params) -> Self {
		Self {
			id,
			method: method.into(),
			params,
		}
	}
}

/// Reply to a [`Request`], correlated by `id`.
///
/// `result` and `error` are mutually exclusive on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	pub id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

/// Server-reported command failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
	#[serde(default)]
	pub code: i64,
	#[serde(default)]
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Unsolicited notification pushed by the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Any inbound frame.
///
/// Uses serde's `untagged` to tell the two apart: frames with an `id` are
/// responses, everything else with a `method` is an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	Response(Response),
	Event(Event),
}

impl Response {
	/// Splits the envelope into the success value or the error payload.
	///
	/// A response carrying neither field is treated as an empty success.
	pub fn into_result(self) -> Result<Value, ErrorPayload> {
		match self.error {
			Some(error) => Err(error),
			None => Ok(self.result.unwrap_or(Value::Null)),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn request_serializes_empty_params_as_object() {
		let request = Request::new(7, "DOM.enable", Params::new());
		let value = serde_json::to_value(&request).unwrap();
		assert_eq!(value, json!({"id": 7, "method": "DOM.enable", "params": {}}));
	}

	#[test]
	fn success_frame_parses_as_response() {
		let message: Message = serde_json::from_str(r#"{"id": 42, "result": {"outerHTML": "<b>x</b>"}}"#).unwrap();
		let Message::Response(response) = message else {
			panic!("expected response");
		};
		assert_eq!(response.id, 42);
		assert_eq!(response.into_result().unwrap()["outerHTML"], "<b>x</b>");
	}

	#[test]
	fn error_frame_parses_as_error_payload() {
		let message: Message =
			serde_json::from_str(r#"{"id": 3, "error": {"code": -32000, "message": "No node with given id found"}}"#).unwrap();
		let Message::Response(response) = message else {
			panic!("expected response");
		};
		let error = response.into_result().unwrap_err();
		assert_eq!(error.code, -32000);
		assert_eq!(error.message, "No node with given id found");
		assert!(error.data.is_none());
	}

	#[test]
	fn frame_without_id_parses_as_event() {
		let message: Message = serde_json::from_str(r#"{"method": "DOM.documentUpdated", "params": {}}"#).unwrap();
		match message {
			Message::Event(event) => {
				assert_eq!(event.method, "DOM.documentUpdated");
				assert!(event.session_id.is_none());
			}
			_ => panic!("expected event"),
		}
	}

	#[test]
	fn empty_response_is_null_success() {
		let message: Message = serde_json::from_str(r#"{"id": 9}"#).unwrap();
		let Message::Response(response) = message else {
			panic!("expected response");
		};
		assert_eq!(response.into_result().unwrap(), Value::Null);
	}
}
