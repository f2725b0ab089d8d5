//! Markup stripping for node text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("COMMENT_RE should compile"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("TAG_RE should compile"));
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"&#([xX][0-9a-fA-F]+|[0-9]+);").expect("NUMERIC_ENTITY_RE should compile"));

/// Text content of an outer-HTML fragment: markup removed, entities decoded,
/// whitespace left as the document has it.
pub(crate) fn text_content(html: &str) -> String {
	let without_comments = COMMENT_RE.replace_all(html, "");
	let without_tags = TAG_RE.replace_all(&without_comments, "");
	decode_entities(&without_tags)
}

fn decode_entities(s: &str) -> String {
	let named = s
		.replace("&lt;", "<")
		.replace("&gt;", ">")
		.replace("&quot;", "\"")
		.replace("&apos;", "'")
		.replace("&nbsp;", "\u{a0}");
	let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &Captures<'_>| {
		let raw = &caps[1];
		let code = match raw.strip_prefix(['x', 'X']) {
			Some(hex) => u32::from_str_radix(hex, 16).ok(),
			None => raw.parse().ok(),
		};
		code.and_then(char::from_u32)
			.map(String::from)
			.unwrap_or_else(|| caps[0].to_string())
	});
	// Last, so "&amp;lt;" stays "&lt;".
	numeric.replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_tags_and_keeps_text_order() {
		let html = r#"<div class="msg"><p>Hello <strong>World</strong>!</p><code>let x = 1;</code></div>"#;
		assert_eq!(text_content(html), "Hello World!let x = 1;");
	}

	#[test]
	fn decodes_entities_once() {
		assert_eq!(text_content("<b>a &lt; b &amp;&amp; c</b>"), "a < b && c");
		assert_eq!(text_content("&amp;lt;"), "&lt;");
		assert_eq!(text_content("&#65;&#x42;&#x1F600;"), "AB\u{1F600}");
	}

	#[test]
	fn drops_comments_and_keeps_whitespace() {
		assert_eq!(text_content("<pre>a\n  b<!-- <i>c</i> --></pre>"), "a\n  b");
	}
}
