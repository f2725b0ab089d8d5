//! Error types for tabwire.

use std::time::Duration;

use tabwire_runtime::CommandError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// A dispatcher-level failure not tied to a particular node.
	#[error(transparent)]
	Command(#[from] CommandError),

	/// A command issued on behalf of a node failed.
	#[error("{origin}: {source}")]
	Node {
		origin: String,
		#[source]
		source: CommandError,
	},

	#[error("no node matched {locator} (from {origin}) within {}ms", timeout.as_millis())]
	NotFound {
		locator: String,
		origin: String,
		timeout: Duration,
	},

	#[error("expected one node for {locator} (from {origin}), found {count}")]
	TooManyMatches { locator: String, origin: String, count: usize },

	#[error("index {index} out of range for {len} nodes from {origin}")]
	IndexOutOfRange { index: isize, len: usize, origin: String },

	#[error("target not found: {0}")]
	TargetNotFound(String),

	/// A scripting call ran but threw.
	#[error("script error on {origin}: {details}")]
	Script { origin: String, details: String },

	/// The node has no box to click.
	#[error("{origin} has no layout")]
	NoLayout { origin: String },

	#[error("{method} response is missing `{field}`")]
	MissingField { method: String, field: &'static str },

	#[error("http error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("config error: {0}")]
	Config(String),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	fn command(&self) -> Option<&CommandError> {
		match self {
			Self::Command(source) | Self::Node { source, .. } => Some(source),
			_ => None,
		}
	}

	/// True for dispatcher timeouts.
	pub fn is_timeout(&self) -> bool {
		self.command().is_some_and(CommandError::is_timeout)
	}

	/// True when the remote side rejected a command, which usually means the
	/// node is gone and must be located again.
	pub fn is_stale(&self) -> bool {
		self.command().is_some_and(CommandError::is_remote)
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}
}
