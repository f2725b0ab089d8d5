//! Command dispatch error taxonomy.

use std::time::Duration;

use tabwire_protocol::ErrorPayload;
use thiserror::Error;

/// Result alias for dispatcher and transport operations.
pub type Result<T> = std::result::Result<T, CommandError>;

/// Failure of a single `invoke` call.
///
/// Retry policy never lives at this level: each variant terminates the call
/// it was raised for and the caller decides what to do next.
#[derive(Debug, Error)]
pub enum CommandError {
	/// No correlated response arrived before the deadline.
	#[error("{method} timed out after {}ms", timeout.as_millis())]
	Timeout { method: String, timeout: Duration },

	/// The remote side rejected the command.
	#[error("remote error {code}: {message}{}", data.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
	Remote {
		code: i64,
		message: String,
		data: Option<String>,
	},

	/// The channel dropped before a response arrived.
	#[error("connection closed")]
	ConnectionClosed,

	/// The channel could not be opened or written.
	#[error("transport error: {0}")]
	Transport(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl CommandError {
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}

	pub fn is_remote(&self) -> bool {
		matches!(self, Self::Remote { .. })
	}

	pub fn is_connection_closed(&self) -> bool {
		matches!(self, Self::ConnectionClosed)
	}
}

impl From<ErrorPayload> for CommandError {
	fn from(payload: ErrorPayload) -> Self {
		Self::Remote {
			code: payload.code,
			message: payload.message,
			data: payload.data,
		}
	}
}

impl From<tokio_tungstenite::tungstenite::Error> for CommandError {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		use tokio_tungstenite::tungstenite::Error as WsError;
		match err {
			WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
			other => Self::Transport(other.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_error_renders_data_suffix() {
		let err = CommandError::from(ErrorPayload {
			code: -32000,
			message: "Could not find node with given id".into(),
			data: Some("backendNodeId=7".into()),
		});
		assert!(err.is_remote());
		assert_eq!(err.to_string(), "remote error -32000: Could not find node with given id (backendNodeId=7)");
	}

	#[test]
	fn timeout_renders_method_and_millis() {
		let err = CommandError::Timeout {
			method: "DOM.getOuterHTML".into(),
			timeout: Duration::from_millis(1500),
		};
		assert!(err.is_timeout());
		assert_eq!(err.to_string(), "DOM.getOuterHTML timed out after 1500ms");
	}
}
