//! Commands that act on one element.

use std::time::Duration;

use tabwire::TargetDirectory;
use tracing::info;

use super::resolve_page;
use crate::cli::{ClickArgs, SubmitArgs};
use crate::error::{CliError, Result};
use crate::output::{NodeSummary, print_json};

pub(super) async fn click(directory: &TargetDirectory, args: ClickArgs) -> Result<()> {
	let target = resolve_page(directory, &args.page).await?;
	let node = target.search(&args.locator).require_single().await?;
	info!(target = "tabwire", path = %node.path(), strategy = ?args.strategy, "click element");
	node.click_with(args.strategy.into()).await?;
	print_json(&NodeSummary::from(&node))
}

pub(super) async fn submit(directory: &TargetDirectory, args: SubmitArgs) -> Result<()> {
	let target = resolve_page(directory, &args.page).await?;
	let node = target.search(&args.locator).require_single().await?;
	info!(target = "tabwire", path = %node.path(), chars = args.text.chars().count(), "submit input");

	tokio::time::timeout(Duration::from_millis(args.timeout_ms), node.submit_input(&args.text))
		.await
		.map_err(|_| CliError::TimedOut {
			action: "submit",
			ms: args.timeout_ms,
		})??;
	print_json(&NodeSummary::from(&node))
}
