//! Client configuration.
//!
//! Loaded from a JSON file when one is given, then overridden by
//! `TABWIRE_*` environment variables. Every field has a default, so an empty
//! object is a valid file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where the remote browser listens and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
	pub host: String,
	pub port: u16,
	/// Per-command response deadline.
	pub command_timeout_ms: u64,
	/// Deadline for opening a page WebSocket and for HTTP listing calls.
	pub connect_timeout_ms: u64,
	/// Delay between zero-wait search attempts.
	pub poll_interval_ms: u64,
	/// Default deadline for locator searches.
	pub find_timeout_ms: u64,
	/// Default deadline for a newly opened target to show up in the listing.
	pub open_timeout_ms: u64,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			host: "127.0.0.1".to_string(),
			port: 9100,
			command_timeout_ms: 2000,
			connect_timeout_ms: 5000,
			poll_interval_ms: 100,
			find_timeout_ms: 5000,
			open_timeout_ms: 5000,
		}
	}
}

impl ClientConfig {
	pub fn from_file(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path)?;
		serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
	}

	/// Applies `TABWIRE_HOST`, `TABWIRE_PORT`, `TABWIRE_COMMAND_TIMEOUT_MS`
	/// and `TABWIRE_POLL_INTERVAL_MS` when set.
	pub fn with_env_overrides(self) -> Result<Self> {
		self.with_overrides_from(|key| std::env::var(key).ok())
	}

	fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		if let Some(host) = lookup("TABWIRE_HOST") {
			self.host = host;
		}
		if let Some(port) = lookup("TABWIRE_PORT") {
			self.port = parse_var("TABWIRE_PORT", &port)?;
		}
		if let Some(ms) = lookup("TABWIRE_COMMAND_TIMEOUT_MS") {
			self.command_timeout_ms = parse_var("TABWIRE_COMMAND_TIMEOUT_MS", &ms)?;
		}
		if let Some(ms) = lookup("TABWIRE_POLL_INTERVAL_MS") {
			self.poll_interval_ms = parse_var("TABWIRE_POLL_INTERVAL_MS", &ms)?;
		}
		Ok(self)
	}

	/// `host:port` of the listing endpoint.
	pub fn address(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	pub fn command_timeout(&self) -> Duration {
		Duration::from_millis(self.command_timeout_ms)
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_millis(self.connect_timeout_ms)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn find_timeout(&self) -> Duration {
		Duration::from_millis(self.find_timeout_ms)
	}

	pub fn open_timeout(&self) -> Duration {
		Duration::from_millis(self.open_timeout_ms)
	}
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
	value
		.trim()
		.parse()
		.map_err(|_| Error::Config(format!("{key} has invalid value {value:?}")))
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;
	use std::io::Write;

	use super::*;

	#[test]
	fn empty_file_yields_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "{{}}").unwrap();
		let config = ClientConfig::from_file(file.path()).unwrap();
		assert_eq!(config, ClientConfig::default());
		assert_eq!(config.address(), "127.0.0.1:9100");
	}

	#[test]
	fn partial_file_overrides_named_fields() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"port": 9222, "pollIntervalMs": 50}}"#).unwrap();
		let config = ClientConfig::from_file(file.path()).unwrap();
		assert_eq!(config.port, 9222);
		assert_eq!(config.poll_interval(), Duration::from_millis(50));
		assert_eq!(config.command_timeout(), Duration::from_secs(2));
	}

	#[test]
	fn malformed_file_is_config_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"port": "nope"}}"#).unwrap();
		assert!(matches!(ClientConfig::from_file(file.path()), Err(Error::Config(_))));
	}

	#[test]
	fn env_overrides_apply_and_validate() {
		let vars: HashMap<&str, &str> = [("TABWIRE_HOST", "10.0.0.2"), ("TABWIRE_PORT", "9333")].into();
		let config = ClientConfig::default()
			.with_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
			.unwrap();
		assert_eq!(config.address(), "10.0.0.2:9333");

		let bad = ClientConfig::default().with_overrides_from(|key| (key == "TABWIRE_PORT").then(|| "99999".to_string()));
		assert!(matches!(bad, Err(Error::Config(_))));
	}
}
