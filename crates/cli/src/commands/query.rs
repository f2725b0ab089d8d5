use std::time::Duration;

use tabwire::TargetDirectory;
use tracing::info;

use super::resolve_page;
use crate::cli::QueryArgs;
use crate::error::Result;
use crate::output::{NodeSummary, print_json};

pub(super) async fn run(directory: &TargetDirectory, args: QueryArgs) -> Result<()> {
	let target = resolve_page(directory, &args.page).await?;
	let mut search = target.search(&args.locator);
	if let Some(ms) = args.timeout_ms {
		search = search.timeout(Duration::from_millis(ms));
	}

	let nodes = search.all().await?;
	info!(target = "tabwire", locator = %args.locator, matches = nodes.len(), "query finished");

	let mut summaries = Vec::with_capacity(nodes.len());
	for node in &nodes {
		let mut summary = NodeSummary::from(node);
		if args.html {
			summary.html = Some(node.outer_html().await?);
		}
		if args.text {
			summary.text = Some(node.text_content().await?);
		}
		summaries.push(summary);
	}
	print_json(&summaries)
}
