//! HTTP listing endpoint documents.

use serde::{Deserialize, Serialize};

/// One entry of the `/json` listing.
///
/// Only entries whose `type` is `page` are browsing targets; workers,
/// iframes and extension backgrounds share the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
	pub id: String,
	#[serde(default)]
	pub url: String,
	#[serde(default)]
	pub title: String,
	#[serde(rename = "type", default)]
	pub kind: String,
	/// Absent while another client holds an exclusive debugging session.
	#[serde(rename = "webSocketDebuggerUrl", default)]
	pub web_socket_debugger_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub devtools_frontend_url: Option<String>,
}

impl TargetDescriptor {
	pub fn is_page(&self) -> bool {
		self.kind == "page"
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn listing_entry_parses_and_filters_pages() {
		let listing: Vec<TargetDescriptor> = serde_json::from_str(
			r#"[
				{"id": "A1", "url": "https://a.com/x", "title": "A", "type": "page",
				 "webSocketDebuggerUrl": "ws://127.0.0.1:9100/devtools/page/A1",
				 "devtoolsFrontendUrl": "/devtools/inspector.html?ws=127.0.0.1:9100/devtools/page/A1"},
				{"id": "W1", "url": "https://a.com/sw.js", "title": "", "type": "service_worker"}
			]"#,
		)
		.unwrap();

		let pages: Vec<_> = listing.iter().filter(|t| t.is_page()).collect();
		assert_eq!(pages.len(), 1);
		assert_eq!(pages[0].id, "A1");
		assert_eq!(pages[0].web_socket_debugger_url.as_deref(), Some("ws://127.0.0.1:9100/devtools/page/A1"));
		assert!(listing[1].web_socket_debugger_url.is_none());
	}
}
